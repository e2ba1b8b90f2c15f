//! Shared API request/response types
//!
//! Every error body the service returns has the shape
//! `{status: "error", code, message, surat_id?, details?, timestamp}`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ========================================
// Error Codes
// ========================================

/// Machine-readable error code carried in every error body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    InvalidCategory,
    InvalidFile,
    FileTooLarge,
    OcrFailed,
    NoTextExtracted,
    GeminiApiError,
    GeminiRateLimit,
    GeminiConfigError,
    DatabaseError,
    NotFound,
    ValidationError,
    InternalServerError,
    UnknownError,
}

impl ErrorCode {
    /// HTTP status code the error is reported with
    pub const fn http_status(self) -> u16 {
        match self {
            ErrorCode::InvalidCategory
            | ErrorCode::InvalidFile
            | ErrorCode::FileTooLarge
            | ErrorCode::ValidationError => 400,
            ErrorCode::NotFound => 404,
            ErrorCode::OcrFailed | ErrorCode::NoTextExtracted => 422,
            ErrorCode::GeminiRateLimit => 429,
            ErrorCode::GeminiConfigError
            | ErrorCode::GeminiApiError
            | ErrorCode::DatabaseError
            | ErrorCode::InternalServerError
            | ErrorCode::UnknownError => 500,
        }
    }

    /// Wire representation (e.g. `GEMINI_RATE_LIMIT`)
    pub const fn as_str(self) -> &'static str {
        match self {
            ErrorCode::InvalidCategory => "INVALID_CATEGORY",
            ErrorCode::InvalidFile => "INVALID_FILE",
            ErrorCode::FileTooLarge => "FILE_TOO_LARGE",
            ErrorCode::OcrFailed => "OCR_FAILED",
            ErrorCode::NoTextExtracted => "NO_TEXT_EXTRACTED",
            ErrorCode::GeminiApiError => "GEMINI_API_ERROR",
            ErrorCode::GeminiRateLimit => "GEMINI_RATE_LIMIT",
            ErrorCode::GeminiConfigError => "GEMINI_CONFIG_ERROR",
            ErrorCode::DatabaseError => "DATABASE_ERROR",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::ValidationError => "VALIDATION_ERROR",
            ErrorCode::InternalServerError => "INTERNAL_SERVER_ERROR",
            ErrorCode::UnknownError => "UNKNOWN_ERROR",
        }
    }

    /// Whether the code describes a server-side fault (details may be hidden in production)
    pub const fn is_internal(self) -> bool {
        self.http_status() >= 500
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ========================================
// Error Response Types
// ========================================

/// Optional structured context attached to an error
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorDetails {
    /// Pipeline step that failed (`ocr`, `summarize`, `auto_fill`, `database`, ...)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step_failed: Option<String>,

    /// Short classification of the underlying failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,

    /// Seconds the client should wait before retrying (rate limits)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_seconds: Option<u64>,

    /// Hint for the operator or user
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,

    /// Underlying error text (suppressed in production for internal errors)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ErrorDetails {
    /// Whether no field is set
    pub fn is_empty(&self) -> bool {
        self == &ErrorDetails::default()
    }
}

/// Error response body
///
/// # Examples
///
/// ```
/// use arkla_common::api::types::{ErrorBody, ErrorCode};
///
/// let body = ErrorBody::new(ErrorCode::NotFound, "Surat tidak ditemukan");
/// assert_eq!(body.status, "error");
/// assert_eq!(body.code, ErrorCode::NotFound);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Always `"error"`
    pub status: String,

    pub code: ErrorCode,

    /// Human-readable message (Indonesian for user-facing failures)
    pub message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub surat_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<ErrorDetails>,

    pub timestamp: DateTime<Utc>,
}

impl ErrorBody {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            code,
            message: message.into(),
            surat_id: None,
            details: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_surat_id(mut self, surat_id: impl Into<String>) -> Self {
        self.surat_id = Some(surat_id.into());
        self
    }

    /// Attach details; empty details are dropped
    pub fn with_details(mut self, details: ErrorDetails) -> Self {
        self.details = if details.is_empty() { None } else { Some(details) };
        self
    }
}

// ========================================
// Pagination
// ========================================

/// Pagination metadata attached to list responses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationMeta {
    pub page: u32,
    pub limit: u32,
    pub total: i64,
    pub total_pages: u32,
}

impl PaginationMeta {
    /// Build metadata; `total_pages = ceil(total / limit)`
    pub fn new(page: u32, limit: u32, total: i64) -> Self {
        let limit_i = i64::from(limit.max(1));
        let total_pages = ((total.max(0) + limit_i - 1) / limit_i) as u32;
        Self {
            page,
            limit,
            total,
            total_pages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_serializes_screaming_snake() {
        let json = serde_json::to_string(&ErrorCode::GeminiRateLimit).unwrap();
        assert_eq!(json, "\"GEMINI_RATE_LIMIT\"");
        let json = serde_json::to_string(&ErrorCode::NoTextExtracted).unwrap();
        assert_eq!(json, "\"NO_TEXT_EXTRACTED\"");
    }

    #[test]
    fn test_as_str_matches_serde() {
        let codes = [
            ErrorCode::InvalidCategory,
            ErrorCode::InvalidFile,
            ErrorCode::FileTooLarge,
            ErrorCode::OcrFailed,
            ErrorCode::NoTextExtracted,
            ErrorCode::GeminiApiError,
            ErrorCode::GeminiRateLimit,
            ErrorCode::GeminiConfigError,
            ErrorCode::DatabaseError,
            ErrorCode::NotFound,
            ErrorCode::ValidationError,
            ErrorCode::InternalServerError,
            ErrorCode::UnknownError,
        ];
        for code in codes {
            let json = serde_json::to_string(&code).unwrap();
            assert_eq!(json, format!("\"{}\"", code.as_str()));
        }
    }

    #[test]
    fn test_http_status_mapping() {
        assert_eq!(ErrorCode::InvalidCategory.http_status(), 400);
        assert_eq!(ErrorCode::FileTooLarge.http_status(), 400);
        assert_eq!(ErrorCode::NotFound.http_status(), 404);
        assert_eq!(ErrorCode::OcrFailed.http_status(), 422);
        assert_eq!(ErrorCode::NoTextExtracted.http_status(), 422);
        assert_eq!(ErrorCode::GeminiRateLimit.http_status(), 429);
        assert_eq!(ErrorCode::GeminiConfigError.http_status(), 500);
        assert_eq!(ErrorCode::DatabaseError.http_status(), 500);
    }

    #[test]
    fn test_error_body_omits_empty_optionals() {
        let body = ErrorBody::new(ErrorCode::NotFound, "missing").with_details(ErrorDetails::default());
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["status"], "error");
        assert_eq!(value["code"], "NOT_FOUND");
        assert!(value.get("details").is_none());
        assert!(value.get("surat_id").is_none());
        assert!(value["timestamp"].is_string());
    }

    #[test]
    fn test_error_body_with_retry_after() {
        let body = ErrorBody::new(ErrorCode::GeminiRateLimit, "slow down")
            .with_surat_id("abc")
            .with_details(ErrorDetails {
                retry_after_seconds: Some(60),
                ..Default::default()
            });
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["surat_id"], "abc");
        assert_eq!(value["details"]["retry_after_seconds"], 60);
        assert!(value["details"].get("suggestion").is_none());
    }

    #[test]
    fn test_pagination_meta_total_pages() {
        assert_eq!(PaginationMeta::new(1, 20, 0).total_pages, 0);
        assert_eq!(PaginationMeta::new(1, 20, 20).total_pages, 1);
        assert_eq!(PaginationMeta::new(1, 20, 21).total_pages, 2);
        assert_eq!(PaginationMeta::new(3, 10, 95).total_pages, 10);
    }
}
