//! Concurrent fan-out of a write batch to several targets.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use fnv::FnvHashSet;
use futures::future::join_all;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::error::{CancellationError, ConfigError, TargetFailure, WriteBatchError, WriteError};
use crate::ingest::{DownsamplerAndWriter, WriteContext, WriteTarget};
use crate::metrics::{Counter, Scope, Timer};
use crate::models::WriteBatch;

/// Result of one target's attempt at a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteOutcome {
    pub target: String,
    pub elapsed: Duration,
    pub result: Result<(), String>,
}

/// Join per-target outcomes: any failure fails the write, listing every cause.
///
/// # Errors
///
/// Returns a `WriteError` naming each failed target in the order given.
pub fn aggregate(outcomes: Vec<WriteOutcome>) -> Result<(), WriteError> {
    let attempted = outcomes.len();
    let failures: Vec<TargetFailure> = outcomes
        .into_iter()
        .filter_map(|o| o.result.err().map(|cause| TargetFailure { target: o.target, cause }))
        .collect();

    if failures.is_empty() {
        Ok(())
    } else {
        Err(WriteError::new(failures, attempted))
    }
}

struct TargetMetrics {
    success: Counter,
    errors: Counter,
    latency: Timer,
}

impl TargetMetrics {
    fn new(scope: &Scope, target: &str) -> Self {
        let scope = scope.sub_scope("write.target").tagged(&[("target", target)]);
        Self {
            success: scope.counter("success"),
            errors: scope.counter("errors"),
            latency: scope.timer("latency"),
        }
    }
}

/// Dispatches every batch to all registered targets concurrently.
///
/// At most `max_concurrency` targets are in flight at once. The first
/// registered targets start first and outcomes are reported in registration
/// order.
pub struct FanoutWriter {
    targets: Vec<(Arc<dyn WriteTarget>, TargetMetrics)>,
    max_concurrency: usize,
}

impl FanoutWriter {
    /// Get a builder for registering targets.
    pub fn builder() -> FanoutWriterBuilder {
        FanoutWriterBuilder::default()
    }

    /// Names of the registered targets in registration order.
    pub fn target_names(&self) -> Vec<&str> {
        self.targets.iter().map(|(t, _)| t.name()).collect()
    }

    pub const fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    async fn dispatch(&self, ctx: &WriteContext, batch: &WriteBatch) -> Vec<WriteOutcome> {
        let permits = Semaphore::new(self.max_concurrency);
        join_all(
            self.targets
                .iter()
                .map(|(target, metrics)| write_one(&permits, target.as_ref(), metrics, ctx, batch)),
        )
        .await
    }
}

async fn write_one(
    permits: &Semaphore,
    target: &dyn WriteTarget,
    metrics: &TargetMetrics,
    ctx: &WriteContext,
    batch: &WriteBatch,
) -> WriteOutcome {
    // Never closed, so acquisition only waits.
    let _permit = permits.acquire().await.ok();

    let started = Instant::now();
    let result = target.write_batch(ctx, batch).await;
    let elapsed = started.elapsed();
    metrics.latency.record(elapsed);

    let result = match result {
        Ok(()) => {
            metrics.success.increment(1);
            debug!(target_name = target.name(), ?elapsed, "write target succeeded");
            Ok(())
        }
        Err(e) => {
            metrics.errors.increment(1);
            warn!(target_name = target.name(), error = %e, "write target failed");
            Err(e.to_string())
        }
    };
    WriteOutcome { target: target.name().to_string(), elapsed, result }
}

#[async_trait]
impl DownsamplerAndWriter for FanoutWriter {
    async fn write_batch(
        &self,
        ctx: &WriteContext,
        batch: &WriteBatch,
    ) -> Result<(), WriteBatchError> {
        let targets = self.targets.len();
        if let Some(reason) = ctx.check() {
            return Err(CancellationError { reason, targets }.into());
        }

        debug!(
            targets,
            series = batch.len(),
            samples = batch.sample_count(),
            tenant = batch.tenant(),
            "dispatching write batch"
        );

        // Targets still running when the context fires are dropped.
        let outcomes = tokio::select! {
            biased;
            outcomes = self.dispatch(ctx, batch) => outcomes,
            reason = ctx.done() => {
                warn!(targets, %reason, "write context done before targets completed");
                return Err(CancellationError { reason, targets }.into());
            }
        };

        Ok(aggregate(outcomes)?)
    }
}

/// Builder for [`FanoutWriter`].
#[derive(Default)]
pub struct FanoutWriterBuilder {
    targets: Vec<Arc<dyn WriteTarget>>,
    max_concurrency: Option<usize>,
    scope: Option<Scope>,
}

impl FanoutWriterBuilder {
    /// Register a write target. Registration order is error-reporting order.
    pub fn with_target(mut self, target: Arc<dyn WriteTarget>) -> Self {
        self.targets.push(target);
        self
    }

    /// Limit how many targets a single batch writes to at once.
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = Some(max_concurrency);
        self
    }

    /// Scope for per-target metrics.
    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.scope = Some(scope);
        self
    }

    /// Build the writer.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if no target is registered, two targets
    /// share a name, or the concurrency limit is zero. A limit above the
    /// number of targets is lowered to it.
    pub fn build(self) -> Result<FanoutWriter, ConfigError> {
        if self.targets.is_empty() {
            return Err(ConfigError::Invalid("at least one write target is required".into()));
        }

        let mut names = FnvHashSet::default();
        for target in &self.targets {
            if !names.insert(target.name()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate write target name {:?}",
                    target.name()
                )));
            }
        }

        let max_concurrency =
            self.max_concurrency.unwrap_or(self.targets.len()).min(self.targets.len());
        if max_concurrency == 0 {
            return Err(ConfigError::Invalid("max concurrency must be at least 1".into()));
        }

        let scope = self.scope.unwrap_or_else(Scope::noop);
        let targets = self
            .targets
            .into_iter()
            .map(|target| {
                let metrics = TargetMetrics::new(&scope, target.name());
                (target, metrics)
            })
            .collect();

        Ok(FanoutWriter { targets, max_concurrency })
    }
}
