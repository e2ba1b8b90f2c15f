//! Service info and health check endpoints

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::{db, AppState};

/// GET / response
#[derive(Debug, Serialize)]
pub struct ServiceInfo {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// "healthy", or "degraded" when the database is unreachable
    pub status: &'static str,
    pub gemini_configured: bool,
    /// "connected" or "disconnected"
    pub database: &'static str,
    pub version: &'static str,
    pub model: String,
    /// Seconds since service started
    pub uptime_seconds: u64,
}

/// GET /
pub async fn service_info() -> Json<ServiceInfo> {
    Json(ServiceInfo {
        status: "healthy",
        service: "ARKLA Backend",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// GET /health
///
/// Liveness plus configuration: Gemini key present, database reachable.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let database_ok = db::ping(&state.db).await;

    Json(HealthResponse {
        status: if database_ok { "healthy" } else { "degraded" },
        gemini_configured: state.gemini.is_configured(),
        database: if database_ok { "connected" } else { "disconnected" },
        version: env!("CARGO_PKG_VERSION"),
        model: state.gemini.model().to_string(),
        uptime_seconds: state.startup_time.elapsed().as_secs(),
    })
}

/// Build the `/` route
pub fn root_routes() -> Router<AppState> {
    Router::new().route("/", get(service_info))
}

/// Build health check routes
pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
