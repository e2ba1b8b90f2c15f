//! Letter records: the main `surat` row plus one category detail row
//!
//! Table and column names interpolated into SQL come only from [`Kategori`];
//! values are always bound.

use std::collections::BTreeMap;

use arkla_common::{Error, Kategori, Result};
use chrono::Datelike;
use once_cell::sync::Lazy;
use serde::Serialize;
use sqlx::{Row, SqliteExecutor, SqlitePool};
use tracing::{debug, info};

use super::audit::{self, AuditAction};
use crate::pagination::PageRequest;

/// Category field values keyed by column name; `None` stores NULL
pub type FieldValues = BTreeMap<String, Option<String>>;

/// Freshly processed letter, stored unverified
#[derive(Debug, Clone)]
pub struct NewSurat<'a> {
    pub id: &'a str,
    pub kategori: Kategori,
    pub raw_ocr_text: &'a str,
    pub isi_ringkas: &'a str,
    pub overall_confidence: f64,
    pub requires_manual_review: bool,
    pub gemini_tokens_used: i64,
    pub processing_time_ms: i64,
    pub original_filename: Option<&'a str>,
    pub file_hash: Option<&'a str>,
}

/// Main `surat` row
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct SuratRecord {
    pub id: String,
    pub kategori: String,
    pub nomor_urut_display: Option<String>,
    pub kode_arsip: Option<String>,
    pub raw_ocr_text: Option<String>,
    pub isi_ringkas: Option<String>,
    pub overall_confidence: Option<f64>,
    pub requires_manual_review: bool,
    pub gemini_tokens_used: i64,
    pub processing_time_ms: Option<i64>,
    pub original_filename: Option<String>,
    pub file_hash: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub verified_at: Option<String>,
}

/// Row of the archive list
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct SuratListItem {
    pub id: String,
    pub kategori: String,
    pub nomor_urut_display: Option<String>,
    pub nomor_surat: Option<String>,
    pub asal_surat: Option<String>,
    pub tgl_surat: Option<String>,
    pub isi_ringkas: Option<String>,
    pub kode_arsip: Option<String>,
    pub overall_confidence: Option<f64>,
    pub requires_manual_review: bool,
    pub verified_at: Option<String>,
    pub created_at: String,
}

/// Archive list filters (all optional, combined with AND)
#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    pub kategori: Option<Kategori>,
    pub kode: Option<String>,
    /// Inclusive, compared against `DATE(created_at)`
    pub date_from: Option<String>,
    pub date_to: Option<String>,
    /// Substring of `isi_ringkas`
    pub search: Option<String>,
    pub include_unverified: bool,
}

/// Result of a verification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verified {
    pub kategori: Kategori,
    pub nomor_urut_display: String,
}

/// Insert a processed letter and its detail row in one transaction
pub async fn insert_unverified(
    pool: &SqlitePool,
    surat: &NewSurat<'_>,
    fields: &FieldValues,
) -> sqlx::Result<()> {
    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        INSERT INTO surat (id, kategori, raw_ocr_text, isi_ringkas, overall_confidence,
                           requires_manual_review, gemini_tokens_used, processing_time_ms,
                           original_filename, file_hash)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(surat.id)
    .bind(surat.kategori.as_str())
    .bind(surat.raw_ocr_text)
    .bind(surat.isi_ringkas)
    .bind(surat.overall_confidence)
    .bind(surat.requires_manual_review)
    .bind(surat.gemini_tokens_used)
    .bind(surat.processing_time_ms)
    .bind(surat.original_filename)
    .bind(surat.file_hash)
    .execute(&mut *tx)
    .await?;

    upsert_details(&mut *tx, surat.kategori, surat.id, fields).await?;

    tx.commit().await?;

    debug!(
        surat_id = surat.id,
        table = surat.kategori.table_name(),
        "Surat stored (unverified)"
    );
    Ok(())
}

/// Insert or overwrite every detail column of a letter
async fn upsert_details<'e, E>(
    executor: E,
    kategori: Kategori,
    surat_id: &str,
    fields: &FieldValues,
) -> sqlx::Result<()>
where
    E: SqliteExecutor<'e>,
{
    let columns: Vec<&str> = kategori.detail_columns().collect();
    let placeholders = vec!["?"; columns.len() + 1].join(", ");
    let updates: Vec<String> = columns
        .iter()
        .map(|c| format!("{c} = excluded.{c}"))
        .collect();

    let sql = format!(
        "INSERT INTO {table} (surat_id, {columns}) VALUES ({placeholders}) \
         ON CONFLICT(surat_id) DO UPDATE SET {updates}",
        table = kategori.table_name(),
        columns = columns.join(", "),
        updates = updates.join(", "),
    );

    let mut query = sqlx::query(&sql).bind(surat_id);
    for column in &columns {
        query = query.bind(fields.get(*column).cloned().flatten());
    }
    query.execute(executor).await?;
    Ok(())
}

/// Mark a letter verified, storing the corrected fields
///
/// The first verification assigns `nomor_urut_display`
/// (`{n:04}/{KATEGORI}/{year}`, `n` = verified letters in the category + 1);
/// later verifications keep it. `isi_ringkas` of `None` keeps the stored summary.
pub async fn verify(
    pool: &SqlitePool,
    surat_id: &str,
    fields: &FieldValues,
    isi_ringkas: Option<&str>,
    kode_arsip: Option<&str>,
) -> Result<Verified> {
    let mut tx = pool.begin().await?;

    // Touch the row first so the transaction holds the write lock before numbering
    let touched = sqlx::query("UPDATE surat SET updated_at = CURRENT_TIMESTAMP WHERE id = ?")
        .bind(surat_id)
        .execute(&mut *tx)
        .await?;
    if touched.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Surat not found: {}", surat_id)));
    }

    let (kategori_raw, existing_nomor, verified_at): (String, Option<String>, Option<String>) =
        sqlx::query_as("SELECT kategori, nomor_urut_display, verified_at FROM surat WHERE id = ?")
            .bind(surat_id)
            .fetch_one(&mut *tx)
            .await?;
    let kategori: Kategori = kategori_raw.parse()?;

    let nomor_urut_display = match (existing_nomor, verified_at) {
        (Some(nomor), Some(_)) => nomor,
        _ => {
            let verified_count: i64 = sqlx::query_scalar(
                "SELECT COUNT(*) FROM surat WHERE kategori = ? AND verified_at IS NOT NULL",
            )
            .bind(kategori.as_str())
            .fetch_one(&mut *tx)
            .await?;
            format_nomor_urut(verified_count + 1, kategori, chrono::Local::now().year())
        }
    };

    sqlx::query(
        r#"
        UPDATE surat SET
            nomor_urut_display = ?,
            kode_arsip = ?,
            isi_ringkas = COALESCE(?, isi_ringkas),
            verified_at = CURRENT_TIMESTAMP,
            updated_at = CURRENT_TIMESTAMP
        WHERE id = ?
        "#,
    )
    .bind(&nomor_urut_display)
    .bind(kode_arsip)
    .bind(isi_ringkas)
    .bind(surat_id)
    .execute(&mut *tx)
    .await?;

    upsert_details(&mut *tx, kategori, surat_id, fields).await?;

    if kategori.is_audited() {
        audit::record(&mut *tx, surat_id, AuditAction::Verify).await?;
    }

    tx.commit().await?;

    info!(surat_id, kategori = %kategori, nomor_urut_display = %nomor_urut_display, "Surat verified");

    Ok(Verified {
        kategori,
        nomor_urut_display,
    })
}

/// Display number, e.g. `0007/UNDANGAN/2025`
pub fn format_nomor_urut(n: i64, kategori: Kategori, year: i32) -> String {
    format!("{:04}/{}/{}", n, kategori.as_str().to_uppercase(), year)
}

/// Main row by id
pub async fn get(pool: &SqlitePool, surat_id: &str) -> sqlx::Result<Option<SuratRecord>> {
    sqlx::query_as::<_, SuratRecord>(
        r#"
        SELECT id, kategori, nomor_urut_display, kode_arsip, raw_ocr_text, isi_ringkas,
               overall_confidence, requires_manual_review, gemini_tokens_used,
               processing_time_ms, original_filename, file_hash,
               created_at, updated_at, verified_at
        FROM surat WHERE id = ?
        "#,
    )
    .bind(surat_id)
    .fetch_optional(pool)
    .await
}

/// Detail row of a letter, every column of its category
pub async fn get_details(
    pool: &SqlitePool,
    kategori: Kategori,
    surat_id: &str,
) -> sqlx::Result<Option<FieldValues>> {
    let columns: Vec<&str> = kategori.detail_columns().collect();
    let sql = format!(
        "SELECT {} FROM {} WHERE surat_id = ?",
        columns.join(", "),
        kategori.table_name()
    );

    let row = sqlx::query(&sql)
        .bind(surat_id)
        .fetch_optional(pool)
        .await?;

    row.map(|row| {
        columns
            .iter()
            .enumerate()
            .map(|(idx, column)| Ok((column.to_string(), row.try_get::<Option<String>, _>(idx)?)))
            .collect::<sqlx::Result<FieldValues>>()
    })
    .transpose()
}

/// `SELECT ... FROM surat s LEFT JOIN <every detail table>` with per-category
/// columns folded into `nomor_surat`, `asal_surat` and `tgl_surat`
static LIST_SELECT: Lazy<String> = Lazy::new(|| {
    let mut joins = String::new();
    let mut nomor = Vec::new();
    let mut asal = Vec::new();
    let mut tgl = Vec::new();

    for (idx, kategori) in Kategori::ALL.iter().enumerate() {
        let alias = format!("d{}", idx);
        joins.push_str(&format!(
            " LEFT JOIN {table} {alias} ON {alias}.surat_id = s.id AND s.kategori = '{kategori}'",
            table = kategori.table_name(),
        ));
        if kategori.has_field("nomor_surat") {
            nomor.push(format!("{}.nomor_surat", alias));
        }
        if kategori.has_field("asal_surat") {
            asal.push(format!("{}.asal_surat", alias));
        }
        tgl.push(format!("{}.{}", alias, kategori.primary_date_field()));
    }

    format!(
        "SELECT s.id, s.kategori, s.nomor_urut_display, \
         {nomor} AS nomor_surat, {asal} AS asal_surat, {tgl} AS tgl_surat, \
         s.isi_ringkas, s.kode_arsip, s.overall_confidence, s.requires_manual_review, \
         s.verified_at, s.created_at \
         FROM surat s{joins}",
        nomor = coalesce(&nomor),
        asal = coalesce(&asal),
        tgl = coalesce(&tgl),
    )
});

fn coalesce(columns: &[String]) -> String {
    match columns.len() {
        0 => "NULL".to_string(),
        1 => columns[0].clone(),
        _ => format!("COALESCE({})", columns.join(", ")),
    }
}

/// Paginated archive list, newest first
pub async fn list(
    pool: &SqlitePool,
    filter: &ListFilter,
    page: PageRequest,
) -> sqlx::Result<(Vec<SuratListItem>, i64)> {
    let mut clauses: Vec<&str> = Vec::new();
    let mut params: Vec<String> = Vec::new();

    if !filter.include_unverified {
        clauses.push("s.verified_at IS NOT NULL");
    }
    if let Some(kategori) = filter.kategori {
        clauses.push("s.kategori = ?");
        params.push(kategori.as_str().to_string());
    }
    if let Some(kode) = &filter.kode {
        clauses.push("s.kode_arsip = ?");
        params.push(kode.clone());
    }
    if let Some(date_from) = &filter.date_from {
        clauses.push("DATE(s.created_at) >= ?");
        params.push(date_from.clone());
    }
    if let Some(date_to) = &filter.date_to {
        clauses.push("DATE(s.created_at) <= ?");
        params.push(date_to.clone());
    }
    if let Some(search) = &filter.search {
        clauses.push("s.isi_ringkas LIKE ?");
        params.push(format!("%{}%", search));
    }

    let where_sql = if clauses.is_empty() {
        "1=1".to_string()
    } else {
        clauses.join(" AND ")
    };

    let count_sql = format!("SELECT COUNT(*) FROM surat s WHERE {}", where_sql);
    let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
    for param in &params {
        count_query = count_query.bind(param);
    }
    let total = count_query.fetch_one(pool).await?;

    let data_sql = format!(
        "{} WHERE {} ORDER BY s.created_at DESC, s.rowid DESC LIMIT ? OFFSET ?",
        LIST_SELECT.as_str(),
        where_sql
    );
    let mut data_query = sqlx::query_as::<_, SuratListItem>(&data_sql);
    for param in &params {
        data_query = data_query.bind(param);
    }
    let items = data_query
        .bind(i64::from(page.limit))
        .bind(page.offset())
        .fetch_all(pool)
        .await?;

    Ok((items, total))
}

/// Delete a letter and its detail row; returns the category it had
pub async fn delete(pool: &SqlitePool, surat_id: &str) -> Result<Kategori> {
    let mut tx = pool.begin().await?;

    let kategori_raw: Option<String> = sqlx::query_scalar("SELECT kategori FROM surat WHERE id = ?")
        .bind(surat_id)
        .fetch_optional(&mut *tx)
        .await?;
    let kategori: Kategori = kategori_raw
        .ok_or_else(|| Error::NotFound(format!("Surat not found: {}", surat_id)))?
        .parse()?;

    let sql = format!("DELETE FROM {} WHERE surat_id = ?", kategori.table_name());
    sqlx::query(&sql).bind(surat_id).execute(&mut *tx).await?;
    sqlx::query("DELETE FROM surat WHERE id = ?")
        .bind(surat_id)
        .execute(&mut *tx)
        .await?;

    if kategori.is_audited() {
        audit::record(&mut *tx, surat_id, AuditAction::Delete).await?;
    }

    tx.commit().await?;

    info!(surat_id, kategori = %kategori, "Surat deleted");
    Ok(kategori)
}

/// Export filters
#[derive(Debug, Clone, Default)]
pub struct ExportFilter {
    pub date_from: Option<String>,
    pub date_to: Option<String>,
    pub verified_only: bool,
}

/// Rows for a category export, cells in export-layout column order
pub async fn export_rows(
    pool: &SqlitePool,
    kategori: Kategori,
    filter: &ExportFilter,
) -> sqlx::Result<Vec<Vec<Option<String>>>> {
    let layout = kategori.export_layout();
    let select: Vec<String> = layout
        .columns
        .iter()
        .map(|(column, _)| {
            if *column == arkla_common::kategori::ISI_RINGKAS {
                "s.isi_ringkas".to_string()
            } else {
                format!("d.{}", column)
            }
        })
        .collect();

    let mut clauses = vec!["s.kategori = ?"];
    let mut params = vec![kategori.as_str().to_string()];
    if filter.verified_only {
        clauses.push("s.verified_at IS NOT NULL");
    }
    if let Some(date_from) = &filter.date_from {
        clauses.push("DATE(s.created_at) >= ?");
        params.push(date_from.clone());
    }
    if let Some(date_to) = &filter.date_to {
        clauses.push("DATE(s.created_at) <= ?");
        params.push(date_to.clone());
    }

    let sql = format!(
        "SELECT {select} FROM surat s LEFT JOIN {table} d ON d.surat_id = s.id \
         WHERE {where_sql} \
         ORDER BY CAST(d.nomor_urut AS INTEGER), d.nomor_urut, s.created_at, s.rowid",
        select = select.join(", "),
        table = kategori.table_name(),
        where_sql = clauses.join(" AND "),
    );

    let mut query = sqlx::query(&sql);
    for param in &params {
        query = query.bind(param);
    }
    let rows = query.fetch_all(pool).await?;

    rows.iter()
        .map(|row| {
            (0..layout.columns.len())
                .map(|idx| row.try_get::<Option<String>, _>(idx))
                .collect()
        })
        .collect()
}
