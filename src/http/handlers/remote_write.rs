//! Remote Write Protocol implementation.
//!
//! Decodes snappy-compressed protobuf payloads, canonicalizes the series and
//! hands the batch to the configured [`DownsamplerAndWriter`]. Every request
//! ends in exactly one metric observation, whatever its outcome.
//!
//! [`DownsamplerAndWriter`]: crate::ingest::DownsamplerAndWriter

use std::time::{Duration, Instant};

use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use tracing::{debug, error, warn};

use crate::canonicalize::canonicalize;
use crate::error::{GatewayError, ParseError};
use crate::http::state::AppState;
use crate::http::types::ErrorResponse;
use crate::ingest::WriteContext;
use crate::wire::WireDecoder;

/// Header carrying the tenant the batch is written for.
pub const TENANT_HEADER: &str = "x-scope-orgid";

/// Header overriding the write deadline, in humantime syntax (`250ms`, `5s`).
pub const TIMEOUT_HEADER: &str = "x-write-timeout";

/// Handle remote write requests from Prometheus or compatible agents.
///
/// # Parameters
///
/// - `state` - Application state with the writer, decoder and metrics
/// - `headers` - HTTP headers, checked for encoding, tenant and deadline
/// - `body` - Request body containing snappy-compressed protobuf; a body over
///   the router's limit arrives as a rejection and is counted as a parse error
///
/// # Returns
///
/// Returns HTTP 204 on success. Failures return 400 (bad payload), 500 (write
/// failed) or 504 (write cancelled) with a JSON body carrying the cause.
pub async fn remote_write(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    let started = Instant::now();
    let result = handle_remote_write_impl(&state, &headers, body).await;
    let elapsed = started.elapsed();

    state.observability.metrics.observe(result.as_ref().map(|_| ()), elapsed);

    match result {
        Ok(series) => {
            debug!(series, ?elapsed, "remote write accepted");
            http_code_no_content()
        }
        Err(err) => error_response(&err),
    }
}

/// Internal implementation of remote write handling.
///
/// # Returns
///
/// Returns the number of series written.
async fn handle_remote_write_impl(
    state: &AppState,
    headers: &HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Result<usize, GatewayError> {
    check_content_encoding(headers)?;
    let timeout = write_timeout(headers)?.unwrap_or(state.ingest.timeout);
    let tenant = tenant(headers);

    let body = body.map_err(|rejection| body_error(&rejection, &state.ingest.decoder))?;
    let raw = state.ingest.decoder.decode(&body)?;
    let batch = canonicalize(raw, &state.ingest.tag_options, tenant)?;

    debug!(
        series = batch.len(),
        samples = batch.sample_count(),
        tenant = batch.tenant().unwrap_or(""),
        ?timeout,
        "received remote write request"
    );

    let ctx = WriteContext::new(state.shutdown.child_token()).with_timeout(timeout);
    state.ingest.writer.write_batch(&ctx, &batch).await?;
    Ok(batch.len())
}

/// Accept a missing encoding or snappy, reject anything else.
fn check_content_encoding(headers: &HeaderMap) -> Result<(), ParseError> {
    let Some(value) = headers.get(header::CONTENT_ENCODING) else {
        return Ok(());
    };
    let encoding = value.to_str().map_err(|e| ParseError::InvalidHeader {
        name: "content-encoding",
        reason: e.to_string(),
    })?;
    if encoding.trim().eq_ignore_ascii_case("snappy") {
        Ok(())
    } else {
        Err(ParseError::InvalidHeader {
            name: "content-encoding",
            reason: format!("unsupported encoding {encoding:?}, expected snappy"),
        })
    }
}

fn write_timeout(headers: &HeaderMap) -> Result<Option<Duration>, ParseError> {
    let Some(value) = headers.get(TIMEOUT_HEADER) else {
        return Ok(None);
    };
    let invalid = |reason: String| ParseError::InvalidHeader { name: TIMEOUT_HEADER, reason };

    let raw = value.to_str().map_err(|e| invalid(e.to_string()))?;
    let timeout = humantime::parse_duration(raw.trim()).map_err(|e| invalid(e.to_string()))?;
    if timeout.is_zero() {
        return Err(invalid("timeout must be positive".to_string()));
    }
    Ok(Some(timeout))
}

fn body_error(rejection: &BytesRejection, decoder: &WireDecoder) -> ParseError {
    if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ParseError::BodyTooLarge { limit: decoder.max_body_bytes() }
    } else {
        ParseError::ReadBody(rejection.body_text())
    }
}

/// Tenant from the request headers; absent, empty or non-ASCII means none.
fn tenant(headers: &HeaderMap) -> Option<String> {
    headers
        .get(TENANT_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn error_response(err: &GatewayError) -> Response {
    let status = err.status();
    if status.is_server_error() {
        error!(cause = err.cause(), status = status.as_u16(), "remote write failed: {err}");
    } else {
        warn!(cause = err.cause(), "rejected remote write request: {err}");
    }

    (status, Json(ErrorResponse::new(err.error_type(), err.to_string()))).into_response()
}

fn http_code_no_content() -> Response {
    StatusCode::NO_CONTENT.into_response()
}
