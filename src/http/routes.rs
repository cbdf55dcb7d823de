//! HTTP routing configuration for all API endpoints.

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::http::handlers::*;
use crate::http::state::AppState;

/// Path Prometheus-compatible agents post remote write payloads to.
pub const REMOTE_WRITE_PATH: &str = "/api/v1/prom/remote/write";

/// Build the Axum router with all API endpoints.
///
/// # Parameters
///
/// - `state` - Application state containing configuration and dependencies
///
/// # Returns
///
/// Returns configured Axum `Router` with the write, health and metrics endpoints.
/// Write bodies are capped at the largest compressed size the decoder accepts.
pub fn build_router(state: AppState) -> Router {
    let body_limit = state.ingest.decoder.max_body_bytes();
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        // Remote Write API
        .route(REMOTE_WRITE_PATH, post(remote_write))
        .route("/api/v1/write", post(remote_write))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}
