//! Verification and archive endpoints
//!
//! - `POST /verify` stores the operator-corrected fields and assigns the
//!   display number
//! - `GET /surat` lists the archive, `GET /surat/:id` shows one letter
//! - `DELETE /surat/:id` removes a letter and its uploads

use arkla_common::api::types::PaginationMeta;
use arkla_common::dates::normalize_date;
use arkla_common::kategori::{is_date_field, ISI_RINGKAS};
use arkla_common::Kategori;
use axum::{
    extract::{rejection::JsonRejection, rejection::QueryRejection, Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::info;

use crate::api::params::{flag_or, Flag};
use crate::db::surat::{self as store, FieldValues, ListFilter, SuratListItem, SuratRecord};
use crate::error::{ApiError, ApiResult};
use crate::pagination::PageRequest;
use crate::services::auto_filler::json_text;
use crate::services::upload;
use crate::AppState;

const DEFAULT_LIMIT: u32 = 20;
const MAX_LIMIT: u32 = 100;

/// POST /verify body
#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    pub surat_id: String,
    #[serde(default)]
    pub extracted_data: Map<String, Value>,
    #[serde(default)]
    pub kode_arsip: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    pub status: &'static str,
    pub surat_id: String,
    pub nomor_urut_display: String,
    pub message: &'static str,
}

/// GET /surat query
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub kategori: Option<String>,
    pub kode: Option<String>,
    pub date_from: Option<String>,
    pub date_to: Option<String>,
    pub search: Option<String>,
    pub include_unverified: Option<Flag>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct ListResponse {
    pub status: &'static str,
    pub data: Vec<SuratListItem>,
    pub pagination: PaginationMeta,
}

/// Main row plus its category detail columns
#[derive(Debug, Serialize)]
pub struct SuratDetail {
    #[serde(flatten)]
    pub record: SuratRecord,
    pub details: Option<FieldValues>,
}

#[derive(Debug, Serialize)]
pub struct DetailResponse {
    pub status: &'static str,
    pub data: SuratDetail,
}

#[derive(Debug, Serialize)]
pub struct DeletedId {
    pub id: String,
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub status: &'static str,
    pub message: &'static str,
    pub data: DeletedId,
}

/// Category columns out of the edited form; absent or blank values clear the column
///
/// Dates are normalized to `YYYY-MM-DD` when recognizable, otherwise kept as typed.
fn field_values(kategori: Kategori, extracted: &Map<String, Value>) -> FieldValues {
    kategori
        .detail_columns()
        .map(|column| {
            let value = extracted.get(column).and_then(json_text).map(|text| {
                if is_date_field(column) {
                    normalize_date(&text).unwrap_or(text)
                } else {
                    text
                }
            });
            (column.to_string(), value)
        })
        .collect()
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Filter date must be a recognizable date; returned as `YYYY-MM-DD`
pub(crate) fn filter_date(name: &str, value: Option<String>) -> ApiResult<Option<String>> {
    match non_blank(value) {
        None => Ok(None),
        Some(raw) => normalize_date(&raw).map(Some).ok_or_else(|| {
            ApiError::Validation(format!("{} must be a date in YYYY-MM-DD format (got '{}')", name, raw))
        }),
    }
}

/// POST /verify
pub async fn verify_surat(
    State(state): State<AppState>,
    body: Result<Json<VerifyRequest>, JsonRejection>,
) -> ApiResult<Json<VerifyResponse>> {
    let Json(VerifyRequest {
        surat_id,
        extracted_data,
        kode_arsip,
    }) = body?;
    let surat_id = surat_id.trim().to_string();
    if surat_id.is_empty() {
        return Err(ApiError::Validation("surat_id is required".to_string()));
    }

    info!(
        surat_id = %surat_id,
        fields = extracted_data.len(),
        "Verifying surat"
    );

    let result = async {
        let record = store::get(&state.db, &surat_id)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("Surat not found: {}", surat_id)))?;
        let kategori: Kategori = record.kategori.parse()?;

        let fields = field_values(kategori, &extracted_data);
        let isi_ringkas = extracted_data.get(ISI_RINGKAS).and_then(json_text);
        let kode_arsip = non_blank(kode_arsip);

        let verified = store::verify(
            &state.db,
            &surat_id,
            &fields,
            isi_ringkas.as_deref(),
            kode_arsip.as_deref(),
        )
        .await?;
        Ok::<_, ApiError>(verified)
    }
    .await
    .map_err(|e| e.for_surat(surat_id.as_str()))?;

    Ok(Json(VerifyResponse {
        status: "success",
        surat_id,
        nomor_urut_display: result.nomor_urut_display,
        message: "Surat berhasil disimpan",
    }))
}

/// GET /surat
pub async fn list_surat(
    State(state): State<AppState>,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> ApiResult<Json<ListResponse>> {
    let Query(query) = query?;
    let page = PageRequest::from_query(query.page, query.limit, DEFAULT_LIMIT, MAX_LIMIT)?;

    let kategori = non_blank(query.kategori)
        .map(|k| k.parse::<Kategori>())
        .transpose()?;

    let filter = ListFilter {
        kategori,
        kode: non_blank(query.kode),
        date_from: filter_date("date_from", query.date_from)?,
        date_to: filter_date("date_to", query.date_to)?,
        search: non_blank(query.search),
        include_unverified: flag_or(
            query.include_unverified.as_ref(),
            "include_unverified",
            false,
        )?,
    };

    let (data, total) = store::list(&state.db, &filter, page).await?;

    Ok(Json(ListResponse {
        status: "success",
        data,
        pagination: page.meta(total),
    }))
}

/// GET /surat/:id
pub async fn get_surat(
    State(state): State<AppState>,
    Path(surat_id): Path<String>,
) -> ApiResult<Json<DetailResponse>> {
    let result = async {
        let record = store::get(&state.db, &surat_id)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("Surat not found: {}", surat_id)))?;
        let kategori: Kategori = record.kategori.parse()?;
        let details = store::get_details(&state.db, kategori, &surat_id).await?;
        Ok::<_, ApiError>(SuratDetail { record, details })
    }
    .await
    .map_err(|e| e.for_surat(surat_id.as_str()))?;

    Ok(Json(DetailResponse {
        status: "success",
        data: result,
    }))
}

/// DELETE /surat/:id
pub async fn delete_surat(
    State(state): State<AppState>,
    Path(surat_id): Path<String>,
) -> ApiResult<Json<DeleteResponse>> {
    store::delete(&state.db, &surat_id)
        .await
        .map_err(|e| ApiError::from(e).for_surat(surat_id.as_str()))?;

    upload::remove_uploads(&state.layout, &surat_id).await;

    Ok(Json(DeleteResponse {
        status: "success",
        message: "Surat berhasil dihapus",
        data: DeletedId { id: surat_id },
    }))
}

/// Build verification and archive routes
pub fn surat_routes() -> Router<AppState> {
    Router::new()
        .route("/verify", post(verify_surat))
        .route("/surat", get(list_surat))
        .route("/surat/:id", get(get_surat).delete(delete_surat))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_field_values_normalizes_dates() {
        let extracted = json!({
            "nomor_surat": " 005/12/2025 ",
            "tgl_surat_masuk": "12 Maret 2025",
            "tgl_penyelesaian": "segera",
            "lampiran": 2,
            "keterangan": "",
            "isi_ringkas": "Rapat",
            "unknown": "x"
        });
        let values = field_values(Kategori::Undangan, extracted.as_object().unwrap());

        assert_eq!(values["nomor_surat"].as_deref(), Some("005/12/2025"));
        assert_eq!(values["tgl_surat_masuk"].as_deref(), Some("2025-03-12"));
        assert_eq!(values["tgl_penyelesaian"].as_deref(), Some("segera"));
        assert_eq!(values["lampiran"].as_deref(), Some("2"));
        assert_eq!(values["keterangan"], None);
        assert_eq!(values["asal_surat"], None);
        assert!(!values.contains_key("isi_ringkas"));
        assert!(!values.contains_key("unknown"));
        assert_eq!(values.len(), Kategori::Undangan.detail_columns().count());
    }

    #[test]
    fn test_filter_date() {
        assert_eq!(filter_date("date_from", None).unwrap(), None);
        assert_eq!(filter_date("date_from", Some("  ".into())).unwrap(), None);
        assert_eq!(
            filter_date("date_from", Some("01/02/2025".into())).unwrap().as_deref(),
            Some("2025-02-01")
        );
        assert!(matches!(
            filter_date("date_to", Some("kemarin".into())),
            Err(ApiError::Validation(_))
        ));
    }
}
