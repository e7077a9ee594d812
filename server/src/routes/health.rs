//! Health check endpoint.

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::AppState;

/// Health check response.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub pipelines: usize,
    pub source_configured: bool,
    pub destination_configured: bool,
}

/// Create health routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/", get(root))
}

/// Health check handler.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        pipelines: state.pipelines.len(),
        source_configured: state.ctx.source.is_some(),
        destination_configured: state.ctx.destination.is_some(),
    })
}

/// Root handler.
async fn root() -> &'static str {
    "Hostsync Server"
}
