//! Letter upload endpoint
//!
//! `POST /process-surat` takes a multipart form with `file`, `category_id`
//! and an optional `use_optimized` flag (default `true`).

use axum::{
    extract::{multipart::MultipartRejection, Multipart, State},
    routing::post,
    Json, Router,
};
use tracing::debug;

use crate::api::params::parse_form_bool;
use crate::error::{ApiError, ApiResult};
use crate::models::ProcessResponse;
use crate::services::processor::{process_surat, ProcessRequest};
use crate::AppState;

/// Collect the form fields into a processing request
async fn read_form(mut multipart: Multipart) -> ApiResult<ProcessRequest> {
    let mut file: Option<(String, Vec<u8>)> = None;
    let mut category_id: Option<String> = None;
    let mut use_optimized = true;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let bytes = field.bytes().await?;
                file = Some((filename, bytes.to_vec()));
            }
            "category_id" => category_id = Some(field.text().await?.trim().to_string()),
            "use_optimized" => use_optimized = parse_form_bool("use_optimized", &field.text().await?)?,
            other => debug!("Ignoring form field: {}", other),
        }
    }

    let (filename, bytes) =
        file.ok_or_else(|| ApiError::InvalidFile("No file uploaded (field 'file')".to_string()))?;
    let category_id = category_id
        .filter(|c| !c.is_empty())
        .ok_or_else(|| ApiError::Validation("category_id is required".to_string()))?;

    Ok(ProcessRequest {
        category_id,
        filename,
        bytes,
        use_optimized,
    })
}

/// POST /process-surat
///
/// Runs OCR, summarization and field extraction; the letter is stored
/// unverified and must be confirmed through `POST /verify`.
pub async fn process(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Json<ProcessResponse>> {
    let request = read_form(multipart?).await?;
    let response = process_surat(&state, request).await?;
    Ok(Json(response))
}

/// Build processing routes
pub fn process_routes() -> Router<AppState> {
    Router::new().route("/process-surat", post(process))
}
