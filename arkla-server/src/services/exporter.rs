//! Ledger exports (CSV / XLSX) written to `<root>/output/`

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use arkla_common::config::ArchiveLayout;
use arkla_common::kategori::ExportLayout;
use arkla_common::Kategori;
use chrono::{Datelike, Local, NaiveDateTime};
use rust_xlsxwriter::{Format, Workbook};
use sqlx::SqlitePool;
use tokio::io::AsyncWriteExt;
use tracing::info;

use crate::db::surat::{self, ExportFilter};
use crate::error::{ApiError, ApiResult};

pub const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
pub const CSV_CONTENT_TYPE: &str = "text/csv";

/// Output file format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExportFormat {
    #[default]
    Xlsx,
    Csv,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Xlsx => "xlsx",
            ExportFormat::Csv => "csv",
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            ExportFormat::Xlsx => XLSX_CONTENT_TYPE,
            ExportFormat::Csv => CSV_CONTENT_TYPE,
        }
    }
}

impl FromStr for ExportFormat {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "xlsx" => Ok(ExportFormat::Xlsx),
            "csv" => Ok(ExportFormat::Csv),
            _ => Err(ApiError::Validation(
                "Format must be 'xlsx' or 'csv'".to_string(),
            )),
        }
    }
}

/// A written export
#[derive(Debug, Clone)]
pub struct ExportedFile {
    pub filename: String,
    pub path: PathBuf,
    pub format: ExportFormat,
    pub record_count: usize,
    pub bytes: Vec<u8>,
}

/// `Surat_Masuk_Biasa_2025_20250312_101500.xlsx`
pub fn export_filename(title: &str, at: NaiveDateTime, format: ExportFormat) -> String {
    format!(
        "{}_{}_{}.{}",
        title.replace(' ', "_"),
        at.year(),
        at.format("%Y%m%d_%H%M%S"),
        format.extension()
    )
}

/// Write `bytes` into `dir` without replacing an existing file
///
/// A taken `name.ext` moves on to `name_2.ext`, `name_3.ext` and so on.
pub async fn write_new_file(
    dir: &Path,
    filename: &str,
    bytes: &[u8],
) -> std::io::Result<(String, PathBuf)> {
    let (stem, ext) = filename.rsplit_once('.').unwrap_or((filename, ""));
    let mut attempt = 1u32;
    loop {
        let candidate = match (attempt, ext) {
            (1, _) => filename.to_string(),
            (n, "") => format!("{}_{}", stem, n),
            (n, ext) => format!("{}_{}.{}", stem, n, ext),
        };
        let path = dir.join(&candidate);
        let opened = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await;
        match opened {
            Ok(mut file) => {
                file.write_all(bytes).await?;
                file.flush().await?;
                return Ok((candidate, path));
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => attempt += 1,
            Err(e) => return Err(e),
        }
    }
}

type Rows = [Vec<Option<String>>];

fn headers(layout: &ExportLayout) -> impl Iterator<Item = &'static str> {
    layout.columns.iter().map(|(_, header)| *header)
}

/// CSV with a header row; missing cells are empty
pub fn render_csv(layout: &ExportLayout, rows: &Rows) -> ApiResult<Vec<u8>> {
    let csv_error = |e: csv::Error| ApiError::Internal(format!("CSV export failed: {}", e));

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(headers(layout)).map_err(csv_error)?;
    for row in rows {
        writer
            .write_record(row.iter().map(|cell| cell.as_deref().unwrap_or("")))
            .map_err(csv_error)?;
    }

    writer
        .into_inner()
        .map_err(|e| ApiError::Internal(format!("CSV export failed: {}", e)))
}

/// Single-sheet workbook named after the ledger, bold header row
pub fn render_xlsx(layout: &ExportLayout, rows: &Rows) -> ApiResult<Vec<u8>> {
    let xlsx_error =
        |e: rust_xlsxwriter::XlsxError| ApiError::Internal(format!("XLSX export failed: {}", e));

    let mut workbook = Workbook::new();
    let bold = Format::new().set_bold();
    {
        let sheet = workbook.add_worksheet();
        sheet.set_name(layout.title).map_err(xlsx_error)?;

        for (col, header) in headers(layout).enumerate() {
            let col = col as u16;
            sheet
                .write_string_with_format(0, col, header, &bold)
                .map_err(xlsx_error)?;
            sheet
                .set_column_width(col, (header.len() + 4).max(12) as f64)
                .map_err(xlsx_error)?;
        }

        for (idx, row) in rows.iter().enumerate() {
            let row_num = idx as u32 + 1;
            for (col, cell) in row.iter().enumerate() {
                if let Some(value) = cell {
                    sheet
                        .write_string(row_num, col as u16, value)
                        .map_err(xlsx_error)?;
                }
            }
        }
    }

    workbook.save_to_buffer().map_err(xlsx_error)
}

/// Export one category; `None` when no rows match
pub async fn export(
    pool: &SqlitePool,
    archive: &ArchiveLayout,
    kategori: Kategori,
    filter: &ExportFilter,
    format: ExportFormat,
) -> ApiResult<Option<ExportedFile>> {
    let layout = kategori.export_layout();
    let rows = surat::export_rows(pool, kategori, filter).await?;
    if rows.is_empty() {
        info!(kategori = %kategori, "Export matched no records");
        return Ok(None);
    }

    let bytes = match format {
        ExportFormat::Xlsx => render_xlsx(&layout, &rows)?,
        ExportFormat::Csv => render_csv(&layout, &rows)?,
    };

    let output_dir = archive.output_dir();
    tokio::fs::create_dir_all(&output_dir).await?;
    let (filename, path) = write_new_file(
        &output_dir,
        &export_filename(layout.title, Local::now().naive_local(), format),
        &bytes,
    )
    .await?;

    info!(
        kategori = %kategori,
        record_count = rows.len(),
        file_name = %filename,
        "Export completed"
    );

    Ok(Some(ExportedFile {
        filename,
        path,
        format,
        record_count: rows.len(),
        bytes,
    }))
}

/// Reject names that could leave the output folder
pub fn validate_download_name(filename: &str) -> ApiResult<&str> {
    let invalid = filename.trim().is_empty()
        || filename.contains(['/', '\\', '\0'])
        || filename.contains("..");
    if invalid {
        return Err(ApiError::Validation(format!(
            "Invalid filename: {}",
            filename
        )));
    }
    Ok(filename)
}

pub fn content_type_for(filename: &str) -> &'static str {
    if filename.to_lowercase().ends_with(".xlsx") {
        XLSX_CONTENT_TYPE
    } else {
        CSV_CONTENT_TYPE
    }
}

/// Contents of a previously exported file
pub async fn read_export(archive: &ArchiveLayout, filename: &str) -> ApiResult<Vec<u8>> {
    let filename = validate_download_name(filename)?;
    let path = archive.output_dir().join(filename);
    match tokio::fs::read(&path).await {
        Ok(bytes) => Ok(bytes),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(ApiError::NotFound(format!(
            "File not found: {}",
            filename
        ))),
        Err(e) => Err(e.into()),
    }
}
