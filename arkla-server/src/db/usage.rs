//! Gemini API usage ledger and daily budget

use sqlx::SqlitePool;

use crate::services::gemini_client::TokenUsage;

/// Record one successful Gemini call
pub async fn record(
    pool: &SqlitePool,
    surat_id: &str,
    operation: &str,
    usage: &TokenUsage,
) -> sqlx::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO api_usage (surat_id, operation, input_tokens, output_tokens, estimated_cost_usd)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(surat_id)
    .bind(operation)
    .bind(usage.input_tokens)
    .bind(usage.output_tokens)
    .bind(usage.cost_usd())
    .execute(pool)
    .await?;
    Ok(())
}

/// Estimated spend recorded today (UTC)
pub async fn daily_cost(pool: &SqlitePool) -> sqlx::Result<f64> {
    sqlx::query_scalar(
        "SELECT COALESCE(SUM(estimated_cost_usd), 0.0) FROM api_usage WHERE DATE(created_at) = DATE('now')",
    )
    .fetch_one(pool)
    .await
}
