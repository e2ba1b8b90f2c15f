//! Error types for arkla-server
//!
//! Every failure leaves the service as an [`ErrorBody`] carrying a stable
//! [`ErrorCode`]; the HTTP status is derived from the code.

use std::sync::atomic::{AtomicBool, Ordering};

use arkla_common::api::types::{ErrorBody, ErrorCode, ErrorDetails};
use axum::{
    extract::multipart::{MultipartError, MultipartRejection},
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;
use tracing::error;

/// Generic message shown instead of internal details in production
const PRODUCTION_MESSAGE: &str = "Terjadi kesalahan server. Silakan coba lagi.";

static HIDE_INTERNAL_DETAILS: AtomicBool = AtomicBool::new(false);

/// Suppress internal error details in response bodies (production mode)
pub fn set_hide_internal_details(hide: bool) {
    HIDE_INTERNAL_DETAILS.store(hide, Ordering::Relaxed);
}

fn hide_internal_details() -> bool {
    HIDE_INTERNAL_DETAILS.load(Ordering::Relaxed)
}

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Unknown letter category (400)
    #[error("{0}")]
    InvalidCategory(String),

    /// Missing or unsupported upload (400)
    #[error("{0}")]
    InvalidFile(String),

    /// Upload exceeds the configured size (400)
    #[error("{0}")]
    FileTooLarge(String),

    /// Invalid request parameter or body (400)
    #[error("{0}")]
    Validation(String),

    /// Resource not found (404)
    #[error("{0}")]
    NotFound(String),

    /// OCR / extraction failed after retries (422)
    #[error("{message}")]
    OcrFailed { message: String, details: ErrorDetails },

    /// OCR returned no text (422)
    #[error("{0}")]
    NoTextExtracted(String),

    /// Gemini key missing or rejected (500)
    #[error("{0}")]
    GeminiConfig(String),

    /// Gemini rate limit or daily budget hit (429)
    #[error("{message}")]
    GeminiRateLimit {
        message: String,
        retry_after_seconds: u64,
    },

    /// Unexpected Gemini failure (500)
    #[error("{0}")]
    GeminiApi(String),

    /// Database error (500)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// IO error (500)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// arkla-common error
    #[error("{0}")]
    Common(#[from] arkla_common::Error),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),

    /// Error attributed to a specific surat
    #[error("{source}")]
    ForSurat {
        surat_id: String,
        #[source]
        source: Box<ApiError>,
    },
}

impl ApiError {
    /// Attach the surat id the error belongs to
    pub fn for_surat(self, surat_id: impl Into<String>) -> Self {
        match self {
            ApiError::ForSurat { .. } => self,
            other => ApiError::ForSurat {
                surat_id: surat_id.into(),
                source: Box::new(other),
            },
        }
    }

    /// Error code reported to the client
    pub fn code(&self) -> ErrorCode {
        match self {
            ApiError::InvalidCategory(_) => ErrorCode::InvalidCategory,
            ApiError::InvalidFile(_) => ErrorCode::InvalidFile,
            ApiError::FileTooLarge(_) => ErrorCode::FileTooLarge,
            ApiError::Validation(_) => ErrorCode::ValidationError,
            ApiError::NotFound(_) => ErrorCode::NotFound,
            ApiError::OcrFailed { .. } => ErrorCode::OcrFailed,
            ApiError::NoTextExtracted(_) => ErrorCode::NoTextExtracted,
            ApiError::GeminiConfig(_) => ErrorCode::GeminiConfigError,
            ApiError::GeminiRateLimit { .. } => ErrorCode::GeminiRateLimit,
            ApiError::GeminiApi(_) => ErrorCode::GeminiApiError,
            ApiError::Database(_) => ErrorCode::DatabaseError,
            ApiError::Io(_) | ApiError::Internal(_) => ErrorCode::InternalServerError,
            ApiError::Common(err) => match err {
                arkla_common::Error::Database(_) => ErrorCode::DatabaseError,
                arkla_common::Error::NotFound(_) => ErrorCode::NotFound,
                arkla_common::Error::InvalidKategori(_) => ErrorCode::InvalidCategory,
                arkla_common::Error::InvalidInput(_) => ErrorCode::ValidationError,
                arkla_common::Error::Io(_)
                | arkla_common::Error::Config(_)
                | arkla_common::Error::Internal(_) => ErrorCode::InternalServerError,
            },
            ApiError::ForSurat { source, .. } => source.code(),
        }
    }

    fn details(&self) -> ErrorDetails {
        match self {
            ApiError::OcrFailed { details, .. } => details.clone(),
            ApiError::GeminiRateLimit {
                retry_after_seconds,
                ..
            } => ErrorDetails {
                retry_after_seconds: Some(*retry_after_seconds),
                suggestion: Some("Tunggu beberapa saat lalu coba lagi".to_string()),
                ..Default::default()
            },
            ApiError::ForSurat { source, .. } => source.details(),
            _ => ErrorDetails::default(),
        }
    }

    fn surat_id(&self) -> Option<&str> {
        match self {
            ApiError::ForSurat { surat_id, .. } => Some(surat_id),
            _ => None,
        }
    }

    fn message(&self) -> String {
        match self {
            ApiError::Common(arkla_common::Error::InvalidKategori(raw)) => format!(
                "Invalid kategori '{}'. Must be one of: {}",
                raw,
                arkla_common::Kategori::valid_values()
            ),
            ApiError::Common(arkla_common::Error::NotFound(what)) => what.clone(),
            ApiError::Common(arkla_common::Error::InvalidInput(msg)) => msg.clone(),
            ApiError::ForSurat { source, .. } => source.message(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let code = self.code();
        let status =
            StatusCode::from_u16(code.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if code.is_internal() {
            error!(code = %code, surat_id = ?self.surat_id(), "Request failed: {}", self);
        }

        let (message, details) = if code.is_internal() && hide_internal_details() {
            let mut details = self.details();
            details.detail = None;
            (PRODUCTION_MESSAGE.to_string(), details)
        } else {
            (self.message(), self.details())
        };

        let mut body = ErrorBody::new(code, message).with_details(details);
        if let Some(surat_id) = self.surat_id() {
            body = body.with_surat_id(surat_id);
        }

        (status, Json(body)).into_response()
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::FileTooLarge("File too large".to_string())
        } else {
            ApiError::InvalidFile(format!("Malformed upload: {}", err.body_text()))
        }
    }
}

impl From<MultipartRejection> for ApiError {
    fn from(err: MultipartRejection) -> Self {
        ApiError::InvalidFile(format!("Expected multipart/form-data: {}", err.body_text()))
    }
}

impl From<JsonRejection> for ApiError {
    fn from(err: JsonRejection) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::FileTooLarge("Request body too large".to_string())
        } else {
            ApiError::Validation(err.body_text())
        }
    }
}

impl From<QueryRejection> for ApiError {
    fn from(err: QueryRejection) -> Self {
        ApiError::Validation(err.body_text())
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn body_json(err: ApiError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_not_found_body() {
        let (status, json) = body_json(ApiError::NotFound("Surat not found: x".into())).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["status"], "error");
        assert_eq!(json["code"], "NOT_FOUND");
        assert_eq!(json["message"], "Surat not found: x");
        assert!(json.get("details").is_none());
    }

    #[tokio::test]
    async fn test_rate_limit_carries_retry_after() {
        let err = ApiError::GeminiRateLimit {
            message: "limit".into(),
            retry_after_seconds: 60,
        }
        .for_surat("abc");
        let (status, json) = body_json(err).await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(json["code"], "GEMINI_RATE_LIMIT");
        assert_eq!(json["surat_id"], "abc");
        assert_eq!(json["details"]["retry_after_seconds"], 60);
    }

    #[tokio::test]
    async fn test_common_errors_map_to_codes() {
        let (status, json) =
            body_json(ApiError::from(arkla_common::Error::InvalidKategori("x".into()))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["code"], "INVALID_CATEGORY");
        assert!(json["message"].as_str().unwrap().contains("masuk_biasa"));

        let (status, json) =
            body_json(ApiError::from(arkla_common::Error::InvalidInput("bad".into()))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["code"], "VALIDATION_ERROR");
    }

    #[test]
    fn test_for_surat_does_not_nest() {
        let err = ApiError::NoTextExtracted("none".into())
            .for_surat("a")
            .for_surat("b");
        assert_eq!(err.surat_id(), Some("a"));
        assert_eq!(err.code(), ErrorCode::NoTextExtracted);
    }
}
