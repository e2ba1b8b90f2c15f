//! Printable disposition sheet (lembar disposisi)
//!
//! Sized for a 15.7 cm × 10.2 cm form. Every interpolated value is HTML-escaped.

use arkla_common::text::escape_html;
use arkla_common::Kategori;
use sqlx::SqlitePool;

use crate::db;
use crate::error::{ApiError, ApiResult};

const MISSING: &str = "-";

/// Values printed on the sheet
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DisposisiData {
    pub nomor_surat: Option<String>,
    pub asal_surat: Option<String>,
    pub tgl_surat: Option<String>,
    pub isi_ringkas: Option<String>,
    pub kode_arsip: Option<String>,
    pub kode_keterangan: Option<String>,
}

/// Gather sheet values for a stored letter
pub async fn load(pool: &SqlitePool, surat_id: &str) -> ApiResult<DisposisiData> {
    let record = db::surat::get(pool, surat_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Surat not found: {}", surat_id)))?;
    let kategori: Kategori = record.kategori.parse()?;

    let details = db::surat::get_details(pool, kategori, surat_id)
        .await?
        .unwrap_or_default();
    let detail = |field: &str| details.get(field).cloned().flatten();

    let kode_keterangan = match record.kode_arsip.as_deref() {
        Some(kode) => db::klasifikasi::keterangan_for(pool, kode).await?,
        None => None,
    };

    Ok(DisposisiData {
        nomor_surat: detail("nomor_surat"),
        asal_surat: detail("asal_surat"),
        tgl_surat: detail(kategori.primary_date_field()),
        isi_ringkas: record.isi_ringkas,
        kode_arsip: record.kode_arsip,
        kode_keterangan,
    })
}

fn cell(value: Option<&str>) -> String {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        Some(v) => escape_html(v),
        None => MISSING.to_string(),
    }
}

/// Full HTML document for the sheet
pub fn render(data: &DisposisiData) -> String {
    let kode = match (data.kode_arsip.as_deref(), data.kode_keterangan.as_deref()) {
        (Some(kode), Some(keterangan)) if !keterangan.trim().is_empty() => {
            format!("{} - {}", cell(Some(kode)), escape_html(keterangan.trim()))
        }
        (kode, _) => cell(kode),
    };

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="UTF-8">
    <title>Lembar Disposisi</title>
    <style>
        @page {{
            size: 15.7cm 10.2cm;
            margin-top: 1.25cm;
            margin-right: 1.1cm;
            margin-bottom: 0.3cm;
            margin-left: 0.65cm;
        }}
        body {{
            font-family: Arial, sans-serif;
            font-size: 10pt;
            margin: 0;
            padding: 0;
        }}
        .container {{
            width: 100%;
            border: 1.5pt solid black;
        }}
        table {{
            width: 100%;
            border-collapse: collapse;
        }}
        td, th {{
            border: 1pt solid black;
            padding: 2mm;
            vertical-align: top;
        }}
        .header {{
            text-align: center;
            font-weight: bold;
            font-size: 11pt;
            background-color: #f0f0f0;
        }}
        .label {{
            font-weight: bold;
            width: 30%;
        }}
        .value {{
            width: 70%;
        }}
        @media print {{
            body {{
                -webkit-print-color-adjust: exact;
                print-color-adjust: exact;
            }}
        }}
    </style>
</head>
<body>
    <div class="container">
        <table>
            <tr>
                <td colspan="2" class="header">LEMBAR DISPOSISI</td>
            </tr>
            <tr>
                <td class="label">Nomor Surat</td>
                <td class="value">{nomor_surat}</td>
            </tr>
            <tr>
                <td class="label">Asal Surat</td>
                <td class="value">{asal_surat}</td>
            </tr>
            <tr>
                <td class="label">Tanggal Surat</td>
                <td class="value">{tgl_surat}</td>
            </tr>
            <tr>
                <td class="label">Isi Ringkas</td>
                <td class="value">{isi_ringkas}</td>
            </tr>
            <tr>
                <td class="label">Kode Arsip</td>
                <td class="value">{kode}</td>
            </tr>
            <tr>
                <td class="label">Disposisi</td>
                <td class="value" style="height: 3cm;"></td>
            </tr>
        </table>
    </div>
</body>
</html>
"#,
        nomor_surat = cell(data.nomor_surat.as_deref()),
        asal_surat = cell(data.asal_surat.as_deref()),
        tgl_surat = cell(data.tgl_surat.as_deref()),
        isi_ringkas = cell(data.isi_ringkas.as_deref()),
        kode = kode,
    )
}
