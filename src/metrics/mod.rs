//! Metric scopes with buffered counters and pluggable reporters.
//!
//! A root [`Scope`] owns a background task that periodically flushes counter
//! deltas to a [`StatsReporter`]. Counters live in a `metrics-util` atomic
//! registry keyed by [`Key`]; increments never block the request path, so a
//! reporter only sees them after the next flush. Callers that need to observe
//! a counter must poll with a bounded timeout (see
//! [`crate::fixtures::wait_until`]).

pub mod prometheus;
pub mod reporter;
pub mod write;

pub use ::metrics::{Counter, Key};
pub use prometheus::PrometheusReporter;
pub use reporter::{DebuggingReporter, FanoutReporter, TracingReporter};
pub use write::PromWriteMetrics;

use std::collections::BTreeMap;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use ::metrics::Label;
use metrics_util::registry::{AtomicStorage, Registry};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Default interval between counter flushes.
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(1);

/// Backend capability a scope reports into.
pub trait StatsReporter: Send + Sync {
    /// Report a counter increase since the last flush.
    fn report_counter(&self, key: &Key, delta: u64);

    /// Report one timer observation.
    fn report_timer(&self, key: &Key, elapsed: Duration);

    /// Called after every scope flush.
    fn flush(&self) {}
}

struct Counters {
    reporter: Option<Arc<dyn StatsReporter>>,
    registry: Registry<Key, AtomicStorage>,
}

impl Counters {
    fn new(reporter: Option<Arc<dyn StatsReporter>>) -> Self {
        Self { reporter, registry: Registry::atomic() }
    }

    fn counter(&self, key: &Key) -> Counter {
        Counter::from_arc(self.registry.get_or_create_counter(key, Arc::clone))
    }

    fn flush(&self) {
        let Some(reporter) = &self.reporter else {
            return;
        };
        self.registry.visit_counters(|key, value| {
            let delta = value.swap(0, Ordering::AcqRel);
            if delta > 0 {
                reporter.report_counter(key, delta);
            }
        });
        reporter.flush();
    }
}

/// A named, tagged view onto a metrics registry.
///
/// Cloning is cheap; sub-scopes and tagged scopes share the root's registry.
#[derive(Clone)]
pub struct Scope {
    counters: Arc<Counters>,
    prefix: String,
    tags: BTreeMap<String, String>,
}

impl std::fmt::Debug for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scope").field("prefix", &self.prefix).field("tags", &self.tags).finish()
    }
}

impl Scope {
    /// Create a root scope flushing to `reporter` every `interval`.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Returns
    ///
    /// Returns the scope and a closer that stops the flush task after a final
    /// flush.
    pub fn root(reporter: Arc<dyn StatsReporter>, interval: Duration) -> (Self, ScopeCloser) {
        let scope = Self::detached(reporter);
        let token = CancellationToken::new();

        let counters = scope.counters.clone();
        let stop = token.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    () = stop.cancelled() => break,
                    _ = ticker.tick() => counters.flush(),
                }
            }
            counters.flush();
        });

        (scope, ScopeCloser { token, handle: Some(handle) })
    }

    /// Create a root scope without a flush task; call [`Scope::flush`] manually.
    pub fn detached(reporter: Arc<dyn StatsReporter>) -> Self {
        Self::with_counters(Counters::new(Some(reporter)))
    }

    /// A scope that records into counters nobody reads.
    pub fn noop() -> Self {
        Self::with_counters(Counters::new(None))
    }

    fn with_counters(counters: Counters) -> Self {
        Self { counters: Arc::new(counters), prefix: String::new(), tags: BTreeMap::new() }
    }

    /// Child scope whose metric names are prefixed with `name.`.
    pub fn sub_scope(&self, name: &str) -> Self {
        Self { prefix: self.full_name(name), ..self.clone() }
    }

    /// Child scope with extra tags merged over this scope's tags.
    pub fn tagged(&self, tags: &[(&str, &str)]) -> Self {
        let mut merged = self.tags.clone();
        merged.extend(tags.iter().map(|(k, v)| ((*k).to_string(), (*v).to_string())));
        Self { tags: merged, ..self.clone() }
    }

    /// Counter called `name` in this scope.
    pub fn counter(&self, name: &str) -> Counter {
        self.counters.counter(&self.key(name))
    }

    /// Timer called `name` in this scope.
    pub fn timer(&self, name: &str) -> Timer {
        Timer { reporter: self.counters.reporter.clone(), key: self.key(name) }
    }

    /// Push all pending counter deltas to the reporter now.
    pub fn flush(&self) {
        self.counters.flush();
    }

    /// Registry key of `name`: full dotted name plus this scope's tags, sorted by tag name.
    fn key(&self, name: &str) -> Key {
        let labels: Vec<Label> =
            self.tags.iter().map(|(k, v)| Label::new(k.clone(), v.clone())).collect();
        Key::from_parts(self.full_name(name), labels)
    }

    fn full_name(&self, name: &str) -> String {
        if self.prefix.is_empty() {
            name.to_string()
        } else {
            format!("{}.{name}", self.prefix)
        }
    }
}

/// Stops a root scope's flush task.
pub struct ScopeCloser {
    token: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl ScopeCloser {
    /// Stop the flush task and wait for its final flush.
    pub async fn close(mut self) {
        self.token.cancel();
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "metrics flush task failed");
            }
        }
    }
}

impl Drop for ScopeCloser {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// Duration recorder; observations are reported immediately.
#[derive(Clone)]
pub struct Timer {
    reporter: Option<Arc<dyn StatsReporter>>,
    key: Key,
}

impl Timer {
    pub fn record(&self, elapsed: Duration) {
        if let Some(reporter) = &self.reporter {
            reporter.report_timer(&self.key, elapsed);
        }
    }
}
