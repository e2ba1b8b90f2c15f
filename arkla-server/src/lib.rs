//! arkla-server library - ARKLA archive backend
//!
//! Letters are uploaded, sent to Gemini for OCR and field extraction, verified
//! by a human and stored per category. The binary in `main.rs` only wires
//! configuration, logging and the listener; everything reachable over HTTP
//! lives here so integration tests can drive the router directly.

use std::sync::Arc;
use std::time::Instant;

use arkla_common::config::{ArchiveLayout, ArklaConfig};
use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue};
use axum::Router;
use sqlx::SqlitePool;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

pub mod api;
pub mod db;
pub mod error;
pub mod models;
pub mod pagination;
pub mod services;

use services::gemini_client::GeminiClient;

/// Multipart framing allowance on top of the configured file size
const MULTIPART_OVERHEAD: usize = 1024 * 1024;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Gemini REST client (one shared reqwest client)
    pub gemini: Arc<GeminiClient>,
    /// Immutable service configuration
    pub config: Arc<ArklaConfig>,
    /// Root folder layout (uploads, exports)
    pub layout: Arc<ArchiveLayout>,
    /// Server start, for uptime reporting
    pub startup_time: Instant,
}

impl AppState {
    /// Create new application state
    pub fn new(
        db: SqlitePool,
        gemini: GeminiClient,
        config: ArklaConfig,
        layout: ArchiveLayout,
    ) -> Self {
        Self {
            db,
            gemini: Arc::new(gemini),
            config: Arc::new(config),
            layout: Arc::new(layout),
            startup_time: Instant::now(),
        }
    }
}

/// Build application router
///
/// Public service info and health at the root, the REST surface under `/api/v1`.
pub fn build_router(state: AppState) -> Router {
    let body_limit = state.config.max_file_size.saturating_add(MULTIPART_OVERHEAD);
    let cors = cors_layer(&state.config.cors_origins);

    let v1 = Router::new()
        .merge(api::process_routes())
        .merge(api::surat_routes())
        .merge(api::disposisi_routes())
        .merge(api::export_routes())
        .merge(api::master_data_routes())
        .merge(api::health_routes());

    Router::new()
        .merge(api::root_routes())
        .merge(api::health_routes())
        .nest("/api/v1", v1)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// CORS policy; `"*"` allows any origin (without credentials)
fn cors_layer(origins: &[String]) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers([header::CONTENT_DISPOSITION]);

    if origins.is_empty() || origins.iter().any(|o| o == "*") {
        return base.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    base.allow_origin(AllowOrigin::list(allowed))
}
