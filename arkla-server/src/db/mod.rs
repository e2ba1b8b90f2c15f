//! Database access layer
//!
//! One SQLite file under the root folder. Every connection runs with foreign
//! keys on, WAL journaling and a 5 s busy timeout.

use std::path::Path;
use std::time::Duration;

use arkla_common::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::info;

pub mod audit;
pub mod klasifikasi;
pub mod schema;
pub mod surat;
pub mod usage;

/// Open (creating if missing) the archive database and ensure the schema exists
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_millis(5000));

    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .connect_with(options)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    // Idempotent - safe on every start
    schema::create_schema(&pool).await?;

    Ok(pool)
}

/// Connectivity check used by the health endpoints
pub async fn ping(pool: &SqlitePool) -> bool {
    sqlx::query_scalar::<_, i64>("SELECT 1")
        .fetch_one(pool)
        .await
        .is_ok()
}


#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_init_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("arkla.db");

        let pool = init_database(&path).await.unwrap();
        assert!(ping(&pool).await);
        pool.close().await;

        let pool = init_database(&path).await.unwrap();
        let tables: Vec<String> = sqlx::query_scalar(
            "SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name",
        )
        .fetch_all(&pool)
        .await
        .unwrap();

        for expected in [
            "api_usage",
            "audit_log",
            "ref_klasifikasi",
            "surat",
            "surat_keluar",
            "surat_keluar_sekwan",
            "surat_masuk_biasa",
            "surat_masuk_penting",
            "surat_rahasia",
            "surat_undangan",
        ] {
            assert!(tables.iter().any(|t| t == expected), "missing {}", expected);
        }
    }

    #[tokio::test]
    async fn test_foreign_keys_enabled() {
        let (pool, _dir) = test_support::temp_pool().await;
        let enabled: i64 = sqlx::query_scalar("PRAGMA foreign_keys")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(enabled, 1);
    }
}
