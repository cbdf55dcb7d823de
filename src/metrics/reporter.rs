//! In-process reporters: one for tests, one that logs through `tracing`.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use ::metrics::{Level, Metadata, Recorder};
use fnv::FnvHashMap;
use metrics_util::debugging::{DebugValue, DebuggingRecorder, Snapshotter};
use metrics_util::MetricKind;

use crate::metrics::{Key, StatsReporter};

/// Reporter recording into a `metrics-util` [`DebuggingRecorder`] for assertions.
///
/// Counter readings are cumulative. Snapshots drain histogram samples, so
/// timer observations are retained here as they are read.
pub struct DebuggingReporter {
    recorder: DebuggingRecorder,
    snapshotter: Snapshotter,
    timers: Mutex<FnvHashMap<Key, usize>>,
}

impl Default for DebuggingReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl DebuggingReporter {
    pub fn new() -> Self {
        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();
        Self { recorder, snapshotter, timers: Mutex::default() }
    }

    /// Total of the counter `name` reported with exactly `tags`.
    pub fn counter(&self, name: &str, tags: &[(&str, &str)]) -> u64 {
        self.read()
            .into_iter()
            .filter(|(key, _)| matches(key, name, tags))
            .map(|(_, value)| value)
            .sum()
    }

    /// Total of the counter `name` over all tag sets.
    pub fn counter_total(&self, name: &str) -> u64 {
        self.read().into_iter().filter(|(key, _)| key.name() == name).map(|(_, v)| v).sum()
    }

    /// Observations of the timer `name` over all tag sets.
    pub fn timer_count(&self, name: &str) -> usize {
        self.read();
        self.timers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|(key, _)| key.name() == name)
            .map(|(_, n)| n)
            .sum()
    }

    /// Take a snapshot: return counter values and fold drained timer samples into the totals.
    fn read(&self) -> Vec<(Key, u64)> {
        let mut counters = Vec::new();
        let mut timers = self.timers.lock().unwrap_or_else(PoisonError::into_inner);
        for (composite, _, _, value) in self.snapshotter.snapshot().into_vec() {
            let (kind, key) = composite.into_parts();
            match (kind, value) {
                (MetricKind::Counter, DebugValue::Counter(v)) => counters.push((key, v)),
                (MetricKind::Histogram, DebugValue::Histogram(samples)) => {
                    *timers.entry(key).or_insert(0) += samples.len();
                }
                _ => {}
            }
        }
        counters
    }
}

fn matches(key: &Key, name: &str, tags: &[(&str, &str)]) -> bool {
    let mut expected: Vec<(&str, &str)> = tags.to_vec();
    expected.sort_unstable();
    let actual: Vec<(&str, &str)> = key.labels().map(|l| (l.key(), l.value())).collect();
    key.name() == name && actual == expected
}

fn metadata() -> Metadata<'static> {
    Metadata::new(module_path!(), Level::INFO, Some(module_path!()))
}

impl StatsReporter for DebuggingReporter {
    fn report_counter(&self, key: &Key, delta: u64) {
        self.recorder.register_counter(key, &metadata()).increment(delta);
    }

    fn report_timer(&self, key: &Key, elapsed: Duration) {
        self.recorder.register_histogram(key, &metadata()).record(elapsed.as_secs_f64());
    }
}

/// Reporter that emits every counter flush and timer as a `tracing` event.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl StatsReporter for TracingReporter {
    fn report_counter(&self, key: &Key, delta: u64) {
        let tags: Vec<_> = key.labels().collect();
        tracing::debug!(target: "metrics", metric = key.name(), ?tags, delta, "counter");
    }

    fn report_timer(&self, key: &Key, elapsed: Duration) {
        let tags: Vec<_> = key.labels().collect();
        tracing::debug!(target: "metrics", metric = key.name(), ?tags, ?elapsed, "timer");
    }
}

/// Forwards to several reporters.
pub struct FanoutReporter {
    reporters: Vec<Arc<dyn StatsReporter>>,
}

impl FanoutReporter {
    pub fn new(reporters: Vec<Arc<dyn StatsReporter>>) -> Self {
        Self { reporters }
    }
}

impl StatsReporter for FanoutReporter {
    fn report_counter(&self, key: &Key, delta: u64) {
        for reporter in &self.reporters {
            reporter.report_counter(key, delta);
        }
    }

    fn report_timer(&self, key: &Key, elapsed: Duration) {
        for reporter in &self.reporters {
            reporter.report_timer(key, elapsed);
        }
    }

    fn flush(&self) {
        for reporter in &self.reporters {
            reporter.flush();
        }
    }
}
