//! Request fixtures and polling helpers for tests and local tooling.

use std::time::Duration;

use bytes::Bytes;

use crate::wire::{encode_write_request, ProtoLabel, ProtoSample, TimeSeries, WriteRequest};

/// Interval between checks in [`wait_until`].
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Build a two-series remote write request.
///
/// # Returns
///
/// Returns a request with series `first{foo="bar",biz="baz"}` and
/// `second{foo="qux",bar="baz"}`, two samples each.
pub fn generate_write_request() -> WriteRequest {
    let now_ms = 1_640_995_200_000;
    WriteRequest {
        timeseries: vec![
            TimeSeries {
                labels: labels(&[("__name__", "first"), ("foo", "bar"), ("biz", "baz")]),
                samples: samples(&[(now_ms, 1.0), (now_ms + 15_000, 2.0)]),
            },
            TimeSeries {
                labels: labels(&[("__name__", "second"), ("foo", "qux"), ("bar", "baz")]),
                samples: samples(&[(now_ms, 3.0), (now_ms + 15_000, 4.0)]),
            },
        ],
    }
}

/// Snappy-compressed protobuf body of `request`.
///
/// # Errors
///
/// Returns `snap::Error` if the request is too large to compress.
pub fn generate_write_request_body(request: &WriteRequest) -> Result<Bytes, snap::Error> {
    encode_write_request(request)
}

/// Poll `condition` until it holds or `timeout` elapses.
///
/// # Returns
///
/// Returns `true` if the condition held before the timeout.
pub async fn wait_until(mut condition: impl FnMut() -> bool, timeout: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

fn labels(pairs: &[(&str, &str)]) -> Vec<ProtoLabel> {
    pairs
        .iter()
        .map(|(name, value)| ProtoLabel { name: (*name).to_string(), value: (*value).to_string() })
        .collect()
}

fn samples(points: &[(i64, f64)]) -> Vec<ProtoSample> {
    points.iter().map(|(timestamp, value)| ProtoSample { value: *value, timestamp: *timestamp }).collect()
}
