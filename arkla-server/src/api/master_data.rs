//! Kode Arsip master data endpoints
//!
//! `POST /import-master-data?action=replace|append` loads a CSV with a
//! required `kode` column and optional `indeks` / `keterangan` columns.

use arkla_common::api::types::PaginationMeta;
use axum::{
    extract::{
        multipart::MultipartRejection, rejection::QueryRejection, Multipart, Query, State,
    },
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::db::klasifikasi::{self, ImportMode, KodeKlasifikasi};
use crate::error::{ApiError, ApiResult};
use crate::pagination::PageRequest;
use crate::AppState;

const DEFAULT_LIMIT: u32 = 50;
const MAX_LIMIT: u32 = 500;

#[derive(Debug, Default, Deserialize)]
pub struct ImportQuery {
    pub action: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ImportResponse {
    pub status: &'static str,
    pub added: u64,
    pub updated: u64,
    pub timestamp: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct KodeListQuery {
    pub search: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct KodeListResponse {
    pub status: &'static str,
    pub data: Vec<KodeKlasifikasi>,
    pub pagination: PaginationMeta,
}

/// UTF-8 (BOM stripped), falling back to Latin-1
fn decode_csv(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) => text.trim_start_matches('\u{feff}').to_string(),
        Err(_) => bytes.iter().map(|&b| b as char).collect(),
    }
}

/// Rows of a master data CSV; rows without a `kode` are skipped
pub fn parse_master_csv(bytes: &[u8]) -> ApiResult<Vec<KodeKlasifikasi>> {
    let text = decode_csv(bytes);
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| ApiError::InvalidFile(format!("Could not parse CSV file: {}", e)))?
        .iter()
        .map(|h| h.trim().to_lowercase())
        .collect();
    let position = |name: &str| headers.iter().position(|h| h == name);

    let kode_idx = position("kode")
        .ok_or_else(|| ApiError::Validation("Missing required column: kode".to_string()))?;
    let indeks_idx = position("indeks");
    let keterangan_idx = position("keterangan");

    let mut rows = Vec::new();
    for record in reader.records() {
        let record =
            record.map_err(|e| ApiError::InvalidFile(format!("Could not parse CSV file: {}", e)))?;
        let cell = |idx: Option<usize>| {
            idx.and_then(|i| record.get(i))
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(String::from)
        };

        if let Some(kode) = cell(Some(kode_idx)) {
            rows.push(KodeKlasifikasi {
                kode,
                indeks: cell(indeks_idx),
                keterangan: cell(keterangan_idx),
            });
        }
    }

    Ok(rows)
}

/// POST /import-master-data
pub async fn import_master_data(
    State(state): State<AppState>,
    query: Result<Query<ImportQuery>, QueryRejection>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Json<ImportResponse>> {
    let Query(query) = query?;
    let mode: ImportMode = query
        .action
        .as_deref()
        .unwrap_or("replace")
        .parse()
        .map_err(ApiError::Validation)?;

    let mut multipart = multipart?;
    let mut upload: Option<(String, Vec<u8>)> = None;
    while let Some(field) = multipart.next_field().await? {
        if field.name() == Some("file") {
            let filename = field.file_name().unwrap_or_default().to_string();
            upload = Some((filename, field.bytes().await?.to_vec()));
        }
    }

    let (filename, bytes) =
        upload.ok_or_else(|| ApiError::InvalidFile("No file uploaded (field 'file')".to_string()))?;
    if !filename.to_lowercase().ends_with(".csv") {
        return Err(ApiError::InvalidFile("File must be CSV format".to_string()));
    }

    let rows = parse_master_csv(&bytes)?;
    let counts = klasifikasi::import(&state.db, mode, &rows).await?;

    info!(
        added = counts.added,
        updated = counts.updated,
        action = ?mode,
        "Master data import completed"
    );

    Ok(Json(ImportResponse {
        status: "success",
        added: counts.added,
        updated: counts.updated,
        timestamp: Utc::now().to_rfc3339(),
    }))
}

/// GET /master-data/kode-klasifikasi
pub async fn list_kode_klasifikasi(
    State(state): State<AppState>,
    query: Result<Query<KodeListQuery>, QueryRejection>,
) -> ApiResult<Json<KodeListResponse>> {
    let Query(query) = query?;
    let page = PageRequest::from_query(query.page, query.limit, DEFAULT_LIMIT, MAX_LIMIT)?;
    let search = query
        .search
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty());

    let (data, total) = klasifikasi::list(&state.db, search, page).await?;

    Ok(Json(KodeListResponse {
        status: "success",
        data,
        pagination: page.meta(total),
    }))
}

/// Build master data routes
pub fn master_data_routes() -> Router<AppState> {
    Router::new()
        .route("/import-master-data", post(import_master_data))
        .route("/master-data/kode-klasifikasi", get(list_kode_klasifikasi))
}
