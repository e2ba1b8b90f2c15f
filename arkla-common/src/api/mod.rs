//! API vocabulary shared by the ARKLA service and its tests
//!
//! Contains ONLY plain types (no HTTP framework dependencies). The server
//! wraps these in axum responses.

pub mod types;

pub use types::{ErrorBody, ErrorCode, ErrorDetails, PaginationMeta};
