//! Audit trail for confidential (rahasia) letters

use sqlx::{Sqlite, SqliteExecutor};

/// Audited action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditAction {
    Verify,
    Delete,
}

impl AuditAction {
    pub fn as_str(self) -> &'static str {
        match self {
            AuditAction::Verify => "VERIFY",
            AuditAction::Delete => "DELETE",
        }
    }

    fn default_details(self) -> &'static str {
        match self {
            AuditAction::Verify => "Surat verified and saved",
            AuditAction::Delete => "Surat deleted",
        }
    }
}

/// Audit log row
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AuditEntry {
    pub id: i64,
    pub surat_id: String,
    pub action: String,
    pub details: Option<String>,
    pub timestamp: String,
}

/// Append an entry (usually inside the caller's transaction)
pub async fn record<'e, E>(executor: E, surat_id: &str, action: AuditAction) -> sqlx::Result<()>
where
    E: SqliteExecutor<'e>,
{
    sqlx::query("INSERT INTO audit_log (surat_id, action, details) VALUES (?, ?, ?)")
        .bind(surat_id)
        .bind(action.as_str())
        .bind(action.default_details())
        .execute(executor)
        .await?;
    Ok(())
}

/// Entries for one surat, oldest first
pub async fn entries_for<'e, E>(executor: E, surat_id: &str) -> sqlx::Result<Vec<AuditEntry>>
where
    E: SqliteExecutor<'e>,
{
    sqlx::query_as::<Sqlite, AuditEntry>(
        "SELECT id, surat_id, action, details, timestamp FROM audit_log WHERE surat_id = ? ORDER BY id",
    )
    .bind(surat_id)
    .fetch_all(executor)
    .await
}
