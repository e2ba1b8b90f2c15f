//! Disposition sheet endpoints

use axum::{
    extract::{Path, State},
    response::Html,
    routing::get,
    Json, Router,
};
use serde::Serialize;

use crate::error::ApiResult;
use crate::services::disposisi;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct PreviewResponse {
    pub status: &'static str,
    pub html: String,
}

async fn render_for(state: &AppState, surat_id: &str) -> ApiResult<String> {
    disposisi::load(&state.db, surat_id)
        .await
        .map(|data| disposisi::render(&data))
        .map_err(|e| e.for_surat(surat_id))
}

/// GET /preview-disposisi/:id
pub async fn preview_disposisi(
    State(state): State<AppState>,
    Path(surat_id): Path<String>,
) -> ApiResult<Json<PreviewResponse>> {
    let html = render_for(&state, &surat_id).await?;
    Ok(Json(PreviewResponse {
        status: "success",
        html,
    }))
}

/// GET /disposisi/:id
///
/// The sheet itself, ready for the browser's print dialog.
pub async fn print_disposisi(
    State(state): State<AppState>,
    Path(surat_id): Path<String>,
) -> ApiResult<Html<String>> {
    render_for(&state, &surat_id).await.map(Html)
}

/// Build disposition routes
pub fn disposisi_routes() -> Router<AppState> {
    Router::new()
        .route("/preview-disposisi/:id", get(preview_disposisi))
        .route("/disposisi/:id", get(print_disposisi))
}
