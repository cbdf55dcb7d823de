//! Application state and configuration for the HTTP server.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::config::DEFAULT_WRITE_TIMEOUT;
use crate::ingest::DownsamplerAndWriter;
use crate::metrics::{PromWriteMetrics, PrometheusReporter, Scope};
use crate::models::TagOptions;
use crate::wire::WireDecoder;

/// Write path configuration and dependencies.
///
/// Everything here is read-only and shared by all in-flight requests.
#[derive(Clone)]
pub struct IngestConfig {
    /// Coordinator every batch is written through
    pub writer: Arc<dyn DownsamplerAndWriter>,
    /// Payload decoder with its size limit
    pub decoder: WireDecoder,
    /// Tag naming options for canonicalization
    pub tag_options: Arc<TagOptions>,
    /// Deadline for requests that do not carry their own
    pub timeout: Duration,
}

/// Metrics recorded and exposed by the handlers.
#[derive(Clone, Default)]
pub struct ObservabilityConfig {
    /// Per-request write metrics
    pub metrics: PromWriteMetrics,
    /// Registry rendered at `/metrics`, if any
    pub prometheus: Option<Arc<PrometheusReporter>>,
}

/// Application state shared across all HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    /// Write path configuration
    pub ingest: IngestConfig,
    /// Metrics configuration
    pub observability: ObservabilityConfig,
    /// Cancelled on shutdown; every write context derives from it
    pub shutdown: CancellationToken,
}

impl AppState {
    /// Get a builder for configuring application state step by step.
    ///
    /// # Returns
    ///
    /// Returns an `AppStateBuilder` for fluent configuration.
    pub fn builder() -> AppStateBuilder {
        AppStateBuilder::new()
    }
}

/// Builder for constructing AppState with fluent interface.
#[derive(Default)]
pub struct AppStateBuilder {
    writer: Option<Arc<dyn DownsamplerAndWriter>>,
    decoder: Option<WireDecoder>,
    tag_options: Option<TagOptions>,
    timeout: Option<Duration>,
    scope: Option<Scope>,
    prometheus: Option<Arc<PrometheusReporter>>,
    shutdown: Option<CancellationToken>,
}

impl AppStateBuilder {
    /// Create a new builder with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the write coordinator.
    ///
    /// # Parameters
    ///
    /// - `writer` - Implementation of the write contract batches go through
    ///
    /// # Returns
    ///
    /// Returns the builder for method chaining.
    pub fn with_writer(mut self, writer: Arc<dyn DownsamplerAndWriter>) -> Self {
        self.writer = Some(writer);
        self
    }

    /// Set the payload decoder.
    pub fn with_decoder(mut self, decoder: WireDecoder) -> Self {
        self.decoder = Some(decoder);
        self
    }

    /// Set the tag naming options.
    pub fn with_tag_options(mut self, tag_options: TagOptions) -> Self {
        self.tag_options = Some(tag_options);
        self
    }

    /// Set the default write deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the metrics scope request metrics are recorded in.
    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.scope = Some(scope);
        self
    }

    /// Expose `reporter` at `/metrics`.
    pub fn with_prometheus(mut self, reporter: Arc<PrometheusReporter>) -> Self {
        self.prometheus = Some(reporter);
        self
    }

    /// Set the shutdown token.
    pub fn with_shutdown(mut self, shutdown: CancellationToken) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Build the final AppState with validation.
    ///
    /// # Errors
    ///
    /// Returns error if no writer is provided, the tag options are invalid or
    /// the timeout is zero.
    pub fn build(self) -> io::Result<AppState> {
        let writer = self.writer.ok_or(io::Error::new(
            io::ErrorKind::InvalidInput,
            "Writer is required for AppState",
        ))?;

        let tag_options = self.tag_options.unwrap_or_default();
        tag_options
            .validate()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

        let timeout = self.timeout.unwrap_or(DEFAULT_WRITE_TIMEOUT);
        if timeout.is_zero() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "Write timeout must be positive",
            ));
        }

        let scope = self.scope.unwrap_or_else(Scope::noop);
        let ingest = IngestConfig {
            writer,
            decoder: self.decoder.unwrap_or_default(),
            tag_options: Arc::new(tag_options),
            timeout,
        };
        let observability = ObservabilityConfig {
            metrics: PromWriteMetrics::new(&scope),
            prometheus: self.prometheus,
        };

        Ok(AppState { ingest, observability, shutdown: self.shutdown.unwrap_or_default() })
    }
}
