//! Reporter backed by a `prometheus-client` registry.
//!
//! Scope metric names contain dots, which Prometheus does not allow, so every
//! counter lands in one family keyed by a `metric` label carrying the scope
//! name, followed by the scope tags. Timers go to a histogram family the same
//! way.

use std::time::Duration;

use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::histogram::{exponential_buckets, Histogram};
use prometheus_client::registry::Registry;

use crate::metrics::{Key, StatsReporter};

type LabelSet = Vec<(String, String)>;

/// Reporter exposing scope metrics in the Prometheus text format.
#[derive(Debug)]
pub struct PrometheusReporter {
    registry: Registry,
    counters: Family<LabelSet, Counter>,
    timers: Family<LabelSet, Histogram>,
}

impl Default for PrometheusReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl PrometheusReporter {
    /// Create a reporter with its own registry.
    pub fn new() -> Self {
        let mut registry = Registry::default();

        let counters = Family::<LabelSet, Counter>::default();
        registry.register("gateway_counter", "Gateway scope counters", counters.clone());

        // Buckets from 1ms to ~32s
        let timers = Family::<LabelSet, Histogram>::new_with_constructor(|| {
            Histogram::new(exponential_buckets(0.001, 2.0, 16))
        });
        registry.register("gateway_timer_seconds", "Gateway scope timers", timers.clone());

        Self { registry, counters, timers }
    }

    /// Render all metrics in the text exposition format.
    pub fn encode(&self) -> String {
        let mut buffer = String::new();
        if let Err(e) = prometheus_client::encoding::text::encode(&mut buffer, &self.registry) {
            tracing::warn!(error = %e, "failed to encode prometheus metrics");
        }
        buffer
    }

    fn labels(key: &Key) -> LabelSet {
        std::iter::once(("metric".to_string(), key.name().to_string()))
            .chain(key.labels().map(|l| (l.key().to_string(), l.value().to_string())))
            .collect()
    }
}

impl StatsReporter for PrometheusReporter {
    fn report_counter(&self, key: &Key, delta: u64) {
        self.counters.get_or_create(&Self::labels(key)).inc_by(delta);
    }

    fn report_timer(&self, key: &Key, elapsed: Duration) {
        self.timers.get_or_create(&Self::labels(key)).observe(elapsed.as_secs_f64());
    }
}

#[cfg(test)]
mod tests {
    use ::metrics::Label;

    use super::*;

    #[test]
    fn test_encode_counters_and_timers() {
        let reporter = PrometheusReporter::new();
        let errors = Key::from_parts("write.errors", vec![Label::new("cause", "parse")]);

        reporter.report_counter(&errors, 2);
        reporter.report_timer(&Key::from_name("write.latency"), Duration::from_millis(10));

        let encoded = reporter.encode();
        assert!(encoded.contains("# HELP gateway_counter"));
        assert!(encoded.contains(r#"gateway_counter_total{metric="write.errors",cause="parse"} 2"#));
        assert!(encoded.contains(r#"gateway_timer_seconds_count{metric="write.latency"} 1"#));
    }
}
