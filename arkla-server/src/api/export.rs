//! Ledger export and download endpoints
//!
//! `POST /export` (JSON body) and `GET /export` (query string) take the same
//! parameters. A non-empty export is returned as an attachment and also kept
//! under `<root>/output/` for `GET /download/:filename`.

use arkla_common::Kategori;
use axum::{
    extract::{rejection::JsonRejection, rejection::QueryRejection, Path, Query, State},
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::params::{flag_or, Flag};
use crate::api::surat::filter_date;
use crate::db::surat::ExportFilter;
use crate::error::{ApiError, ApiResult};
use crate::services::exporter::{self, ExportFormat};
use crate::AppState;

/// Export parameters
#[derive(Debug, Default, Deserialize)]
pub struct ExportRequest {
    pub kategori: Option<String>,
    pub date_from: Option<String>,
    pub date_to: Option<String>,
    pub format: Option<String>,
    /// Restrict the export to verified letters
    pub verified_only: Option<Flag>,
}

#[derive(Debug, Serialize)]
pub struct EmptyExportResponse {
    pub status: &'static str,
    pub message: &'static str,
    pub record_count: usize,
}

fn attachment(content_type: &'static str, filename: &str, bytes: Vec<u8>) -> Response {
    let disposition = HeaderValue::from_str(&format!("attachment; filename=\"{}\"", filename))
        .unwrap_or_else(|_| HeaderValue::from_static("attachment"));
    (
        [
            (header::CONTENT_TYPE, HeaderValue::from_static(content_type)),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response()
}

async fn run_export(state: &AppState, request: ExportRequest) -> ApiResult<Response> {
    let kategori: Kategori = request
        .kategori
        .as_deref()
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .ok_or_else(|| ApiError::Validation("kategori is required".to_string()))?
        .parse()?;

    let format = match request.format.as_deref().map(str::trim) {
        None | Some("") => ExportFormat::default(),
        Some(raw) => raw.parse()?,
    };

    let filter = ExportFilter {
        date_from: filter_date("date_from", request.date_from)?,
        date_to: filter_date("date_to", request.date_to)?,
        verified_only: flag_or(
            request.verified_only.as_ref(),
            "verified_only",
            false,
        )?,
    };

    match exporter::export(&state.db, &state.layout, kategori, &filter, format).await? {
        Some(file) => Ok(attachment(
            file.format.content_type(),
            &file.filename,
            file.bytes,
        )),
        None => Ok(Json(EmptyExportResponse {
            status: "success",
            message: "No data found for the specified criteria",
            record_count: 0,
        })
        .into_response()),
    }
}

/// POST /export
pub async fn export_post(
    State(state): State<AppState>,
    body: Result<Json<ExportRequest>, JsonRejection>,
) -> ApiResult<Response> {
    let Json(request) = body?;
    run_export(&state, request).await
}

/// GET /export
pub async fn export_get(
    State(state): State<AppState>,
    query: Result<Query<ExportRequest>, QueryRejection>,
) -> ApiResult<Response> {
    let Query(request) = query?;
    run_export(&state, request).await
}

/// GET /download/:filename
pub async fn download(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> ApiResult<Response> {
    let bytes = exporter::read_export(&state.layout, &filename).await?;
    Ok(attachment(
        exporter::content_type_for(&filename),
        &filename,
        bytes,
    ))
}

/// Build export routes
pub fn export_routes() -> Router<AppState> {
    Router::new()
        .route("/export", get(export_get).post(export_post))
        .route("/download/:filename", get(download))
}
