//! Write coordination: the contract between the request handler and the
//! downstream write targets.
//!
//! The handler only sees [`DownsamplerAndWriter`]. [`FanoutWriter`] implements
//! it by dispatching each batch concurrently to a set of [`WriteTarget`]s
//! (typically a [`Downsampler`] and a raw store) and joining their outcomes.
//!
//! Partially failed batches are not rolled back: targets that succeeded keep
//! what they committed, so retrying a failed batch may write some series twice.

pub mod downsample;
pub mod fanout;

pub use downsample::Downsampler;
pub use fanout::{FanoutWriter, FanoutWriterBuilder, WriteOutcome};

use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::{CancelReason, WriteBatchError};
use crate::models::WriteBatch;

/// Error type write targets report failures with.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Cancellation and deadline shared by every target of one write.
#[derive(Debug, Clone)]
pub struct WriteContext {
    token: CancellationToken,
    deadline: Option<(Instant, Duration)>,
}

impl Default for WriteContext {
    fn default() -> Self {
        Self::new(CancellationToken::new())
    }
}

impl WriteContext {
    /// Context cancelled through `token`, without a deadline.
    pub fn new(token: CancellationToken) -> Self {
        Self { token, deadline: None }
    }

    /// Add a deadline `timeout` from now.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Some((Instant::now() + timeout, timeout));
        self
    }

    pub const fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Time left before the deadline, if one is set.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline.map(|(at, _)| at.saturating_duration_since(Instant::now()))
    }

    /// Why the context is done, or `None` while it is still live.
    pub fn check(&self) -> Option<CancelReason> {
        if self.token.is_cancelled() {
            return Some(CancelReason::Cancelled);
        }
        match self.deadline {
            Some((at, timeout)) if Instant::now() >= at => {
                Some(CancelReason::DeadlineExceeded(timeout))
            }
            _ => None,
        }
    }

    /// Resolve once the context is cancelled or its deadline passes.
    pub async fn done(&self) -> CancelReason {
        match self.deadline {
            Some((at, timeout)) => tokio::select! {
                () = self.token.cancelled() => CancelReason::Cancelled,
                () = tokio::time::sleep_until(at) => CancelReason::DeadlineExceeded(timeout),
            },
            None => {
                self.token.cancelled().await;
                CancelReason::Cancelled
            }
        }
    }
}

/// A downstream component that accepts write batches.
#[async_trait]
pub trait WriteTarget: Send + Sync {
    /// Name used in error messages, logs and metric tags.
    fn name(&self) -> &str;

    /// Write `batch`, giving up early if `ctx` is done.
    ///
    /// # Errors
    ///
    /// Returns the target's failure; its text is surfaced to the client.
    async fn write_batch(&self, ctx: &WriteContext, batch: &WriteBatch) -> Result<(), BoxError>;
}

/// Write contract consumed by the request handler.
#[async_trait]
pub trait DownsamplerAndWriter: Send + Sync {
    /// Write `batch` to every configured target.
    ///
    /// # Errors
    ///
    /// Returns `WriteBatchError::Write` if any target failed and
    /// `WriteBatchError::Cancelled` if `ctx` fired first.
    async fn write_batch(&self, ctx: &WriteContext, batch: &WriteBatch)
        -> Result<(), WriteBatchError>;
}
