//! Error taxonomy for the write path.
//!
//! Every failure is classified before it reaches the HTTP layer: the handler
//! only picks a status code and a metric label from the class, it never
//! re-interprets the cause text.

use std::fmt;
use std::time::Duration;

use axum::http::StatusCode;
use thiserror::Error;

/// The remote write payload could not be turned into raw series.
#[derive(Debug, Error)]
pub enum ParseError {
    /// Request body was empty.
    #[error("empty request body")]
    EmptyBody,
    /// Snappy block decompression failed.
    #[error("snappy decompression failed: {0}")]
    Decompress(#[from] snap::Error),
    /// Declared decompressed size is above the configured limit.
    #[error("decompressed payload of {size} bytes exceeds limit of {limit} bytes")]
    TooLarge { size: usize, limit: usize },
    /// The compressed body itself is above the limit and was not read in full.
    #[error("request body exceeds limit of {limit} bytes")]
    BodyTooLarge { limit: usize },
    /// The request body could not be read.
    #[error("failed to read request body: {0}")]
    ReadBody(String),
    /// Protobuf decoding failed.
    #[error("protobuf decode failed: {0}")]
    Decode(#[from] prost::DecodeError),
    /// The write request decoded fine but carried no series.
    #[error("write request contains no series")]
    NoSeries,
    /// A request header carried an unusable value.
    #[error("invalid header {name}: {reason}")]
    InvalidHeader { name: &'static str, reason: String },
}

/// A series is structurally valid protobuf but semantically unusable.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("series {series}: missing metric name label {name:?}")]
    MissingMetricName { series: usize, name: String },
    #[error("series {series}: duplicate label {label:?}")]
    DuplicateLabel { series: usize, label: String },
    #[error("series {series}: empty label name")]
    EmptyLabelName { series: usize },
    #[error("series {series}: no samples")]
    NoSamples { series: usize },
    #[error("series {series}: bucket label {label:?} has non-numeric value {value:?}")]
    InvalidBucket { series: usize, label: String, value: String },
}

/// A single write target's failure, cause text preserved verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetFailure {
    pub target: String,
    pub cause: String,
}

/// One or more write targets failed.
///
/// Joined: every failing target is listed, so the message contains each cause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteError {
    failures: Vec<TargetFailure>,
    attempted: usize,
}

impl WriteError {
    /// Build from the failed outcomes of a fan-out over `attempted` targets.
    pub fn new(failures: Vec<TargetFailure>, attempted: usize) -> Self {
        Self { failures, attempted }
    }

    /// Failing targets in registration order.
    pub fn failures(&self) -> &[TargetFailure] {
        &self.failures
    }

    /// Number of targets the batch was dispatched to.
    pub const fn attempted(&self) -> usize {
        self.attempted
    }

    /// `true` when no target accepted the batch.
    pub fn all_failed(&self) -> bool {
        self.failures.len() >= self.attempted
    }
}

impl fmt::Display for WriteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} of {} write targets failed: ", self.failures.len(), self.attempted)?;
        for (i, failure) in self.failures.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}: {}", failure.target, failure.cause)?;
        }
        Ok(())
    }
}

impl std::error::Error for WriteError {}

/// Why a write context stopped waiting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    Cancelled,
    DeadlineExceeded(Duration),
}

/// The write context fired before every target completed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CancellationError {
    pub reason: CancelReason,
    pub targets: usize,
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cancelled => f.write_str("cancelled"),
            Self::DeadlineExceeded(timeout) => {
                write!(f, "deadline of {} exceeded", humantime::format_duration(*timeout))
            }
        }
    }
}

impl fmt::Display for CancellationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "write {} before all {} targets completed", self.reason, self.targets)
    }
}

impl std::error::Error for CancellationError {}

/// Error returned by the `DownsamplerAndWriter` contract.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WriteBatchError {
    #[error(transparent)]
    Write(#[from] WriteError),
    #[error(transparent)]
    Cancelled(#[from] CancellationError),
}

/// Every classified failure a remote write request can end in.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Write(#[from] WriteError),
    #[error(transparent)]
    Cancelled(#[from] CancellationError),
}

impl From<WriteBatchError> for GatewayError {
    fn from(err: WriteBatchError) -> Self {
        match err {
            WriteBatchError::Write(e) => Self::Write(e),
            WriteBatchError::Cancelled(e) => Self::Cancelled(e),
        }
    }
}

impl GatewayError {
    /// HTTP status for this failure class.
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Parse(_) | Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Write(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Cancelled(_) => StatusCode::GATEWAY_TIMEOUT,
        }
    }

    /// Prometheus API `errorType` for the JSON error body.
    pub const fn error_type(&self) -> &'static str {
        match self {
            Self::Parse(_) | Self::Validation(_) => "bad_data",
            Self::Write(_) => "internal",
            Self::Cancelled(_) => "timeout",
        }
    }

    /// Value of the `cause` tag on the `write.errors` counter.
    pub const fn cause(&self) -> &'static str {
        match self {
            Self::Parse(_) => "parse",
            Self::Validation(_) => "validation",
            Self::Write(_) => "write",
            Self::Cancelled(_) => "cancelled",
        }
    }
}

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("yaml: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}
