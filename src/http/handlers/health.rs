//! Health and readiness handlers.

use axum::{extract::State, http::StatusCode};

use crate::http::state::AppState;

/// Health check endpoint.
///
/// # Returns
///
/// Returns "ok" if the server is healthy.
pub async fn healthz() -> &'static str {
    "ok"
}

/// Readiness endpoint.
///
/// # Returns
///
/// Returns "ok" while accepting writes, or 503 once shutdown has begun.
pub async fn readyz(State(state): State<AppState>) -> (StatusCode, &'static str) {
    if state.shutdown.is_cancelled() {
        (StatusCode::SERVICE_UNAVAILABLE, "shutting down")
    } else {
        (StatusCode::OK, "ok")
    }
}
