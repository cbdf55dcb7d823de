//! End-to-end tests of the remote write endpoint through the HTTP router.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use axum::http::{header, HeaderName, HeaderValue, StatusCode};
use axum_test::TestServer;
use bytes::Bytes;
use tokio_util::sync::CancellationToken;

use promwrite_gateway::error::WriteBatchError;
use promwrite_gateway::fixtures::{generate_write_request, generate_write_request_body, wait_until};
use promwrite_gateway::http::{build_router, AppState, REMOTE_WRITE_PATH};
use promwrite_gateway::ingest::{BoxError, Downsampler, FanoutWriter, WriteContext, WriteTarget};
use promwrite_gateway::metrics::{DebuggingReporter, PrometheusReporter, Scope};
use promwrite_gateway::models::WriteBatch;
use promwrite_gateway::storage::{MemoryStorage, SeriesStore};
use promwrite_gateway::wire::WireDecoder;
use promwrite_gateway::DownsamplerAndWriter;

const FLUSH_INTERVAL: Duration = Duration::from_millis(10);
const WAIT: Duration = Duration::from_secs(5);

/// Coordinator that records batches instead of writing them.
#[derive(Default)]
struct RecordingWriter {
    batches: Mutex<Vec<WriteBatch>>,
}

#[async_trait]
impl DownsamplerAndWriter for RecordingWriter {
    async fn write_batch(
        &self,
        _ctx: &WriteContext,
        batch: &WriteBatch,
    ) -> Result<(), WriteBatchError> {
        self.batches.lock().expect("lock").push(batch.clone());
        Ok(())
    }
}

/// Target that fails or stalls on every write.
struct BrokenTarget {
    name: &'static str,
    error: Option<&'static str>,
    delay: Duration,
}

#[async_trait]
impl WriteTarget for BrokenTarget {
    fn name(&self) -> &str {
        self.name
    }

    async fn write_batch(&self, _ctx: &WriteContext, _batch: &WriteBatch) -> Result<(), BoxError> {
        tokio::time::sleep(self.delay).await;
        match self.error {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }
}

fn server(state: AppState) -> TestServer {
    TestServer::new(build_router(state)).expect("test server")
}

fn body() -> Bytes {
    generate_write_request_body(&generate_write_request()).expect("encodable")
}

/// The fixture payload reaches the coordinator as two canonical series.
#[tokio::test]
async fn test_prom_write_parsing() {
    let writer = Arc::new(RecordingWriter::default());
    let state = AppState::builder().with_writer(writer.clone()).build().expect("valid state");

    let response = server(state).post(REMOTE_WRITE_PATH).bytes(body()).await;
    assert_eq!(response.status_code(), StatusCode::NO_CONTENT);

    let batches = writer.batches.lock().expect("lock");
    assert_eq!(batches.len(), 1);
    let series = batches[0].series();
    assert_eq!(series.len(), 2);
    assert_eq!(series[0].name(), "first");
    assert_eq!(series[0].tags().get("foo"), Some("bar"));
    assert_eq!(series[1].name(), "second");
    assert_eq!(series[1].samples().len(), 2);
}

/// An empty body is rejected and counted as a parse error.
#[tokio::test]
async fn test_empty_body_counts_error() {
    let reporter = Arc::new(DebuggingReporter::new());
    let (scope, closer) = Scope::root(reporter.clone(), FLUSH_INTERVAL);
    let state = AppState::builder()
        .with_writer(Arc::new(RecordingWriter::default()))
        .with_scope(scope)
        .build()
        .expect("valid state");

    let response = server(state).post(REMOTE_WRITE_PATH).await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    let json = response.json::<serde_json::Value>();
    assert_eq!(json["errorType"], "bad_data");
    assert_eq!(json["error"], "empty request body");

    assert!(wait_until(|| reporter.counter_total("write.errors") == 1, WAIT).await);
    assert_eq!(reporter.counter("write.errors", &[("cause", "parse")]), 1);
    closer.close().await;
}

/// A failing target surfaces as a 500 carrying its cause.
#[tokio::test]
async fn test_write_error() {
    let reporter = Arc::new(DebuggingReporter::new());
    let (scope, closer) = Scope::root(reporter.clone(), FLUSH_INTERVAL);
    let writer = FanoutWriter::builder()
        .with_target(Arc::new(MemoryStorage::new()))
        .with_target(Arc::new(BrokenTarget {
            name: "broken",
            error: Some("an error"),
            delay: Duration::ZERO,
        }))
        .with_scope(scope.clone())
        .build()
        .expect("valid writer");
    let state = AppState::builder()
        .with_writer(Arc::new(writer))
        .with_scope(scope)
        .build()
        .expect("valid state");

    let response = server(state).post(REMOTE_WRITE_PATH).bytes(body()).await;
    assert_eq!(response.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(response.text().contains("an error"));

    let counted = wait_until(
        || {
            reporter.counter("write.errors", &[("cause", "write")]) == 1
                && reporter.counter("write.target.errors", &[("target", "broken")]) == 1
                && reporter.counter("write.target.success", &[("target", "raw")]) == 1
        },
        WAIT,
    )
    .await;
    assert!(counted, "request and per-target errors counted");
    closer.close().await;
}

/// A deadline shorter than the slowest target ends the request with 504.
#[tokio::test]
async fn test_write_deadline() {
    let writer = FanoutWriter::builder()
        .with_target(Arc::new(BrokenTarget { name: "stalled", error: None, delay: WAIT }))
        .build()
        .expect("valid writer");
    let state = AppState::builder().with_writer(Arc::new(writer)).build().expect("valid state");

    let response = server(state)
        .post(REMOTE_WRITE_PATH)
        .add_header(HeaderName::from_static("x-write-timeout"), HeaderValue::from_static("50ms"))
        .bytes(body())
        .await;

    assert_eq!(response.status_code(), StatusCode::GATEWAY_TIMEOUT);
    let json = response.json::<serde_json::Value>();
    assert_eq!(json["errorType"], "timeout");
    assert!(json["error"].as_str().expect("message").contains("deadline"));
}

/// Shutting down while a target stalls ends the in-flight request with 504.
#[tokio::test]
async fn test_shutdown_cancels_in_flight_write() {
    let reporter = Arc::new(DebuggingReporter::new());
    let (scope, closer) = Scope::root(reporter.clone(), FLUSH_INTERVAL);
    let shutdown = CancellationToken::new();
    let writer = FanoutWriter::builder()
        .with_target(Arc::new(BrokenTarget { name: "stalled", error: None, delay: WAIT }))
        .build()
        .expect("valid writer");
    let state = AppState::builder()
        .with_writer(Arc::new(writer))
        .with_scope(scope)
        .with_shutdown(shutdown.clone())
        .build()
        .expect("valid state");

    let trigger = shutdown.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let started = Instant::now();
    let response = server(state).post(REMOTE_WRITE_PATH).bytes(body()).await;
    assert!(started.elapsed() < WAIT, "returned before the stalled target finished");

    assert_eq!(response.status_code(), StatusCode::GATEWAY_TIMEOUT);
    let json = response.json::<serde_json::Value>();
    assert_eq!(json["errorType"], "timeout");
    assert_eq!(json["error"], "write cancelled before all 1 targets completed");

    let counted =
        wait_until(|| reporter.counter("write.errors", &[("cause", "cancelled")]) == 1, WAIT).await;
    assert!(counted, "cancelled write counted");
    closer.close().await;
}

#[tokio::test]
async fn test_readyz_after_shutdown() {
    let shutdown = CancellationToken::new();
    let state = AppState::builder()
        .with_writer(Arc::new(RecordingWriter::default()))
        .with_shutdown(shutdown.clone())
        .build()
        .expect("valid state");
    let server = server(state);

    assert_eq!(server.get("/readyz").await.status_code(), StatusCode::OK);

    shutdown.cancel();
    let response = server.get("/readyz").await;
    assert_eq!(response.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(response.text(), "shutting down");
    assert_eq!(server.get("/healthz").await.status_code(), StatusCode::OK);
}

/// Bodies over the decoder's compressed limit are rejected and counted as parse errors.
#[tokio::test]
async fn test_oversized_body() {
    let reporter = Arc::new(DebuggingReporter::new());
    let (scope, closer) = Scope::root(reporter.clone(), FLUSH_INTERVAL);
    let writer = Arc::new(RecordingWriter::default());
    let decoder = WireDecoder::new(64);
    let state = AppState::builder()
        .with_writer(writer.clone())
        .with_decoder(decoder)
        .with_scope(scope)
        .build()
        .expect("valid state");

    let oversized = Bytes::from(vec![0u8; decoder.max_body_bytes() * 4]);
    let response = server(state).post(REMOTE_WRITE_PATH).bytes(oversized).await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    let json = response.json::<serde_json::Value>();
    assert_eq!(json["errorType"], "bad_data");
    assert_eq!(
        json["error"],
        format!("request body exceeds limit of {} bytes", decoder.max_body_bytes())
    );
    assert!(writer.batches.lock().expect("lock").is_empty());

    let counted =
        wait_until(|| reporter.counter("write.errors", &[("cause", "parse")]) == 1, WAIT).await;
    assert!(counted, "oversized body counted");
    closer.close().await;
}

#[tokio::test]
async fn test_invalid_headers() {
    let state = AppState::builder()
        .with_writer(Arc::new(RecordingWriter::default()))
        .build()
        .expect("valid state");
    let server = server(state);

    let response = server
        .post(REMOTE_WRITE_PATH)
        .add_header(header::CONTENT_ENCODING, HeaderValue::from_static("gzip"))
        .bytes(body())
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);

    let response = server
        .post(REMOTE_WRITE_PATH)
        .add_header(HeaderName::from_static("x-write-timeout"), HeaderValue::from_static("soon"))
        .bytes(body())
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    assert!(response.text().contains("x-write-timeout"));
}

/// Accepted writes land in both the raw and the downsampled store.
#[tokio::test]
async fn test_write_reaches_stores() {
    let raw = Arc::new(MemoryStorage::new());
    let rollup = Arc::new(MemoryStorage::named("rollup"));
    let downsampler = Downsampler::new(Duration::from_secs(60), rollup.clone()).expect("valid");
    let writer = FanoutWriter::builder()
        .with_target(raw.clone())
        .with_target(Arc::new(downsampler))
        .build()
        .expect("valid writer");
    let state = AppState::builder().with_writer(Arc::new(writer)).build().expect("valid state");

    let response = server(state)
        .post("/api/v1/write")
        .add_header(header::CONTENT_ENCODING, HeaderValue::from_static("snappy"))
        .add_header(HeaderName::from_static("x-scope-orgid"), HeaderValue::from_static("team-a"))
        .bytes(body())
        .await;
    assert_eq!(response.status_code(), StatusCode::NO_CONTENT);

    assert_eq!(raw.len(), 2);
    let stored = raw
        .series()
        .into_iter()
        .find(|s| s.tags.get("__name__") == Some("first"))
        .expect("raw series stored");
    assert_eq!(stored.tenant.as_deref(), Some("team-a"));
    assert_eq!(stored.tags.id(), r#"__name__="first",biz="baz",foo="bar""#);
    assert_eq!(stored.samples.len(), 2);
    assert!(raw.get(Some("team-a"), &stored.tags).is_some());
    assert!(raw.get(None, &stored.tags).is_none());

    // Both fixture samples fall into the same minute.
    let downsampled = rollup.series();
    assert_eq!(downsampled.len(), 2);
    assert!(downsampled.iter().all(|s| s.samples.len() == 1));
}

#[tokio::test]
async fn test_health_and_metrics() {
    let prometheus = Arc::new(PrometheusReporter::new());
    let scope = Scope::detached(prometheus.clone());
    let state = AppState::builder()
        .with_writer(Arc::new(RecordingWriter::default()))
        .with_scope(scope.clone())
        .with_prometheus(prometheus)
        .build()
        .expect("valid state");
    let server = server(state);

    let response = server.get("/healthz").await;
    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(response.text(), "ok");
    assert_eq!(server.get("/readyz").await.status_code(), StatusCode::OK);

    server.post(REMOTE_WRITE_PATH).bytes(body()).await;
    scope.flush();

    let response = server.get("/metrics").await;
    assert_eq!(response.status_code(), StatusCode::OK);
    assert!(response.text().contains(r#"gateway_counter_total{metric="write.success"} 1"#));
}

#[tokio::test]
async fn test_metrics_not_configured() {
    let state = AppState::builder()
        .with_writer(Arc::new(RecordingWriter::default()))
        .build()
        .expect("valid state");

    let response = server(state).get("/metrics").await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
}
