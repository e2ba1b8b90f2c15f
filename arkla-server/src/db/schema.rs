//! Table definitions
//!
//! Detail tables are generated from the category field lists so the stored
//! columns can never drift from what extraction and export expect. Dates are
//! kept as `YYYY-MM-DD` TEXT.

use arkla_common::{Kategori, Result};
use sqlx::SqlitePool;
use tracing::debug;

/// Create every table and index (idempotent)
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    create_ref_klasifikasi_table(pool).await?;
    create_surat_table(pool).await?;
    for kategori in Kategori::ALL {
        create_detail_table(pool, kategori).await?;
    }
    create_audit_log_table(pool).await?;
    create_api_usage_table(pool).await?;
    create_indexes(pool).await?;
    Ok(())
}

async fn create_ref_klasifikasi_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS ref_klasifikasi (
            kode TEXT PRIMARY KEY,
            indeks TEXT,
            keterangan TEXT,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Main letter table; `verified_at` NULL means not yet verified
async fn create_surat_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS surat (
            id TEXT PRIMARY KEY,
            kategori TEXT NOT NULL,
            nomor_urut_display TEXT,
            kode_arsip TEXT,
            raw_ocr_text TEXT,
            isi_ringkas TEXT,
            overall_confidence REAL,
            requires_manual_review INTEGER NOT NULL DEFAULT 0,
            gemini_tokens_used INTEGER NOT NULL DEFAULT 0,
            processing_time_ms INTEGER,
            original_filename TEXT,
            file_hash TEXT,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            verified_at TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// DDL for one category's detail table
pub fn detail_table_ddl(kategori: Kategori) -> String {
    let columns: Vec<String> = kategori
        .detail_columns()
        .map(|column| format!("    {} TEXT", column))
        .collect();

    format!(
        "CREATE TABLE IF NOT EXISTS {table} (\n    surat_id TEXT PRIMARY KEY,\n{columns},\n    FOREIGN KEY (surat_id) REFERENCES surat(id) ON DELETE CASCADE\n)",
        table = kategori.table_name(),
        columns = columns.join(",\n"),
    )
}

async fn create_detail_table(pool: &SqlitePool, kategori: Kategori) -> Result<()> {
    let ddl = detail_table_ddl(kategori);
    debug!(table = kategori.table_name(), "Ensuring detail table");
    sqlx::query(&ddl).execute(pool).await?;
    Ok(())
}

/// Audit trail for confidential letters; rows outlive the letter they describe
async fn create_audit_log_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS audit_log (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            surat_id TEXT NOT NULL,
            action TEXT NOT NULL,
            details TEXT,
            timestamp TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// One row per successful Gemini call
async fn create_api_usage_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS api_usage (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            surat_id TEXT,
            operation TEXT NOT NULL,
            input_tokens INTEGER NOT NULL DEFAULT 0,
            output_tokens INTEGER NOT NULL DEFAULT 0,
            estimated_cost_usd REAL NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_indexes(pool: &SqlitePool) -> Result<()> {
    for statement in [
        "CREATE INDEX IF NOT EXISTS idx_surat_kategori ON surat(kategori)",
        "CREATE INDEX IF NOT EXISTS idx_surat_kode_arsip ON surat(kode_arsip)",
        "CREATE INDEX IF NOT EXISTS idx_surat_created_at ON surat(created_at)",
        "CREATE INDEX IF NOT EXISTS idx_audit_surat_id ON audit_log(surat_id)",
        "CREATE INDEX IF NOT EXISTS idx_api_usage_created_at ON api_usage(created_at)",
    ] {
        sqlx::query(statement).execute(pool).await?;
    }
    Ok(())
}
