//! Request-level metrics for the remote write endpoint.

use std::time::Duration;

use crate::error::GatewayError;
use crate::metrics::{Counter, Scope, Timer};

/// Counters and timers observed once per remote write request.
///
/// `write.success` and `write.errors` (tagged by `cause`) count requests;
/// `write.latency` (tagged by `outcome`) times them.
#[derive(Clone)]
pub struct PromWriteMetrics {
    success: Counter,
    parse_errors: Counter,
    validation_errors: Counter,
    write_errors: Counter,
    cancelled_errors: Counter,
    success_latency: Timer,
    error_latency: Timer,
}

impl PromWriteMetrics {
    /// Register the write metrics under `scope`.
    pub fn new(scope: &Scope) -> Self {
        let scope = scope.sub_scope("write");
        let errors = |cause: &str| scope.tagged(&[("cause", cause)]).counter("errors");
        Self {
            success: scope.counter("success"),
            parse_errors: errors("parse"),
            validation_errors: errors("validation"),
            write_errors: errors("write"),
            cancelled_errors: errors("cancelled"),
            success_latency: scope.tagged(&[("outcome", "success")]).timer("latency"),
            error_latency: scope.tagged(&[("outcome", "error")]).timer("latency"),
        }
    }

    /// Record one finished request: exactly one counter and one latency sample.
    pub fn observe(&self, outcome: Result<(), &GatewayError>, elapsed: Duration) {
        match outcome {
            Ok(()) => {
                self.success.increment(1);
                self.success_latency.record(elapsed);
            }
            Err(err) => {
                self.errors(err).increment(1);
                self.error_latency.record(elapsed);
            }
        }
    }

    fn errors(&self, err: &GatewayError) -> &Counter {
        match err {
            GatewayError::Parse(_) => &self.parse_errors,
            GatewayError::Validation(_) => &self.validation_errors,
            GatewayError::Write(_) => &self.write_errors,
            GatewayError::Cancelled(_) => &self.cancelled_errors,
        }
    }
}

impl Default for PromWriteMetrics {
    fn default() -> Self {
        Self::new(&Scope::noop())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::error::{CancelReason, CancellationError, ParseError, ValidationError, WriteError};
    use crate::metrics::DebuggingReporter;

    #[test]
    fn test_observe_success_and_errors() {
        let reporter = Arc::new(DebuggingReporter::new());
        let scope = Scope::detached(reporter.clone());
        let metrics = PromWriteMetrics::new(&scope);

        metrics.observe(Ok(()), Duration::from_millis(2));
        metrics.observe(Err(&ParseError::EmptyBody.into()), Duration::from_millis(1));
        metrics.observe(Err(&WriteError::new(vec![], 1).into()), Duration::from_millis(4));
        scope.flush();

        assert_eq!(reporter.counter_total("write.success"), 1);
        assert_eq!(reporter.counter_total("write.errors"), 2);
        assert_eq!(reporter.counter("write.errors", &[("cause", "parse")]), 1);
        assert_eq!(reporter.counter("write.errors", &[("cause", "write")]), 1);
        assert_eq!(reporter.timer_count("write.latency"), 3);
    }

    /// Every error variant lands on the counter tagged with its own cause.
    #[test]
    fn test_error_counter_matches_cause() {
        let reporter = Arc::new(DebuggingReporter::new());
        let scope = Scope::detached(reporter.clone());
        let metrics = PromWriteMetrics::new(&scope);

        let errors: Vec<GatewayError> = vec![
            ParseError::EmptyBody.into(),
            ValidationError::MissingMetricName { series: 0, name: "__name__".into() }.into(),
            WriteError::new(vec![], 1).into(),
            CancellationError { reason: CancelReason::Cancelled, targets: 1 }.into(),
        ];
        for err in &errors {
            metrics.observe(Err(err), Duration::ZERO);
        }
        scope.flush();

        for err in &errors {
            assert_eq!(reporter.counter("write.errors", &[("cause", err.cause())]), 1, "{err}");
        }
        assert_eq!(reporter.counter_total("write.errors"), 4);
    }
}
