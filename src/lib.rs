//! # Prometheus Remote Write Gateway
//!
//! A library for accepting Prometheus remote write traffic and fanning it out
//! to downstream write targets.
//!
//! This library provides components for:
//! - **Wire Decoding**: Snappy-compressed protobuf payloads into raw series
//! - **Canonicalization**: Validated, sorted tag sets under configurable tag options
//! - **Write Coordination**: Concurrent fan-out to write targets with deadlines and cancellation
//! - **Metrics**: Buffered counters and timers flushed to pluggable reporters
//! - **HTTP Handling**: An axum router mapping every outcome to a status code and a metric
//!
//! # Examples
//!
//! ```no_run
//! use std::sync::Arc;
//! use promwrite_gateway::{http::build_router, FanoutWriter, MemoryStorage};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! // Write every batch into an in-memory store
//! let writer = FanoutWriter::builder()
//!     .with_target(Arc::new(MemoryStorage::new()))
//!     .build()?;
//!
//! // Build HTTP router with state
//! let state = promwrite_gateway::http::AppState::builder()
//!     .with_writer(Arc::new(writer))
//!     .build()?;
//! let app = build_router(state);
//! # Ok(())
//! # }
//! ```

pub mod canonicalize;
pub mod config;
pub mod error;
pub mod fixtures;
pub mod http;
pub mod ingest;
pub mod metrics;
pub mod models;
pub mod storage;
pub mod wire;

// Re-export commonly used types for convenience
pub use canonicalize::canonicalize;
pub use config::GatewayConfig;
pub use error::{GatewayError, ParseError, ValidationError, WriteBatchError, WriteError};
pub use ingest::{DownsamplerAndWriter, Downsampler, FanoutWriter, WriteContext, WriteTarget};
pub use metrics::{PromWriteMetrics, Scope, StatsReporter};
pub use models::{CanonicalSeries, Label, RawSeries, Sample, TagOptions, Tags, WriteBatch};
pub use storage::{MemoryStorage, SeriesStore};
pub use wire::WireDecoder;
