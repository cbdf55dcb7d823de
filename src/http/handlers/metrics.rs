//! Prometheus exposition of the gateway's own metrics.

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};

use crate::http::state::AppState;

const OPENMETRICS_CONTENT_TYPE: &str = "application/openmetrics-text; version=1.0.0; charset=utf-8";

/// Render the Prometheus reporter's registry.
///
/// # Returns
///
/// Returns the OpenMetrics text, or 404 when no Prometheus reporter is configured.
pub async fn metrics(State(state): State<AppState>) -> Response {
    match &state.observability.prometheus {
        Some(reporter) => {
            ([(header::CONTENT_TYPE, OPENMETRICS_CONTENT_TYPE)], reporter.encode()).into_response()
        }
        None => (StatusCode::NOT_FOUND, "metrics reporter not configured").into_response(),
    }
}
