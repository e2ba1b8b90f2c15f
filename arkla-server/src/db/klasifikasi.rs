//! Kode Arsip master data (`ref_klasifikasi`)

use serde::Serialize;
use sqlx::SqlitePool;

use crate::pagination::PageRequest;

/// One classification code
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct KodeKlasifikasi {
    pub kode: String,
    pub indeks: Option<String>,
    pub keterangan: Option<String>,
}

/// How an import treats existing rows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportMode {
    /// Wipe the table first
    Replace,
    /// Keep existing rows, updating codes present in the import
    Append,
}

impl std::str::FromStr for ImportMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "replace" => Ok(ImportMode::Replace),
            "append" => Ok(ImportMode::Append),
            other => Err(format!("Action must be 'replace' or 'append' (got '{}')", other)),
        }
    }
}

/// Rows added and updated by an import
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportCounts {
    pub added: u64,
    pub updated: u64,
}

/// Import rows in one transaction
///
/// In replace mode a code repeated within the same import keeps its first row.
pub async fn import(
    pool: &SqlitePool,
    mode: ImportMode,
    rows: &[KodeKlasifikasi],
) -> sqlx::Result<ImportCounts> {
    let mut tx = pool.begin().await?;
    let mut counts = ImportCounts::default();

    if mode == ImportMode::Replace {
        sqlx::query("DELETE FROM ref_klasifikasi")
            .execute(&mut *tx)
            .await?;
    }

    for row in rows {
        let exists: Option<i64> = sqlx::query_scalar("SELECT 1 FROM ref_klasifikasi WHERE kode = ?")
            .bind(&row.kode)
            .fetch_optional(&mut *tx)
            .await?;

        match (exists.is_some(), mode) {
            (true, ImportMode::Append) => {
                sqlx::query("UPDATE ref_klasifikasi SET indeks = ?, keterangan = ? WHERE kode = ?")
                    .bind(&row.indeks)
                    .bind(&row.keterangan)
                    .bind(&row.kode)
                    .execute(&mut *tx)
                    .await?;
                counts.updated += 1;
            }
            (true, ImportMode::Replace) => {}
            (false, _) => {
                sqlx::query("INSERT INTO ref_klasifikasi (kode, indeks, keterangan) VALUES (?, ?, ?)")
                    .bind(&row.kode)
                    .bind(&row.indeks)
                    .bind(&row.keterangan)
                    .execute(&mut *tx)
                    .await?;
                counts.added += 1;
            }
        }
    }

    tx.commit().await?;
    Ok(counts)
}

/// Paginated list, optionally filtered by a substring of `kode` or `keterangan`
pub async fn list(
    pool: &SqlitePool,
    search: Option<&str>,
    page: PageRequest,
) -> sqlx::Result<(Vec<KodeKlasifikasi>, i64)> {
    let pattern = search.map(|s| format!("%{}%", s));

    let total: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM ref_klasifikasi WHERE (?1 IS NULL OR kode LIKE ?1 OR keterangan LIKE ?1)",
    )
    .bind(&pattern)
    .fetch_one(pool)
    .await?;

    let rows = sqlx::query_as::<_, KodeKlasifikasi>(
        r#"
        SELECT kode, indeks, keterangan
        FROM ref_klasifikasi
        WHERE (?1 IS NULL OR kode LIKE ?1 OR keterangan LIKE ?1)
        ORDER BY kode
        LIMIT ?2 OFFSET ?3
        "#,
    )
    .bind(&pattern)
    .bind(i64::from(page.limit))
    .bind(page.offset())
    .fetch_all(pool)
    .await?;

    Ok((rows, total))
}

/// Every code (for keyword matching)
pub async fn all(pool: &SqlitePool) -> sqlx::Result<Vec<KodeKlasifikasi>> {
    sqlx::query_as::<_, KodeKlasifikasi>(
        "SELECT kode, indeks, keterangan FROM ref_klasifikasi ORDER BY kode",
    )
    .fetch_all(pool)
    .await
}

/// Description of one code, if the code exists and has one
pub async fn keterangan_for(pool: &SqlitePool, kode: &str) -> sqlx::Result<Option<String>> {
    let row: Option<Option<String>> =
        sqlx::query_scalar("SELECT keterangan FROM ref_klasifikasi WHERE kode = ?")
            .bind(kode)
            .fetch_optional(pool)
            .await?;
    Ok(row.flatten())
}
