//! Conversion of raw wire series into canonical tagged series.

use fnv::FnvHashSet;

use crate::error::ValidationError;
use crate::models::{CanonicalSeries, Label, RawSeries, TagOptions, Tags, WriteBatch};

/// Validate raw series and build the request's write batch.
///
/// # Parameters
///
/// - `raw` - Series in wire order
/// - `opts` - Tag naming options
/// - `tenant` - Tenant the request was routed for
///
/// # Returns
///
/// Returns a batch with one canonical series per raw series, in the same
/// order, each with its samples untouched.
///
/// # Errors
///
/// Returns a `ValidationError` for the first series with an empty or
/// duplicated label name, no metric name, a bucket bound that is not a
/// number, or no samples.
pub fn canonicalize(
    raw: Vec<RawSeries>,
    opts: &TagOptions,
    tenant: Option<String>,
) -> Result<WriteBatch, ValidationError> {
    let series = raw
        .into_iter()
        .enumerate()
        .map(|(index, series)| canonicalize_series(index, series, opts))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(WriteBatch::new(series, tenant))
}

fn canonicalize_series(
    index: usize,
    series: RawSeries,
    opts: &TagOptions,
) -> Result<CanonicalSeries, ValidationError> {
    let mut seen = FnvHashSet::default();
    let mut tags = Vec::with_capacity(series.labels.len());
    let mut name = None;

    for label in series.labels {
        if label.name.is_empty() {
            return Err(ValidationError::EmptyLabelName { series: index });
        }

        let key = opts.rewrite_key(&label.name);
        if !seen.insert(key.to_string()) {
            return Err(ValidationError::DuplicateLabel { series: index, label: key.to_string() });
        }

        // An empty value is the same as an absent label.
        if label.value.is_empty() && !opts.allow_tag_value_empty {
            continue;
        }

        if key == opts.metric_name {
            name = Some(label.value.clone());
        } else if key == opts.bucket_name && label.value.parse::<f64>().is_err() {
            return Err(ValidationError::InvalidBucket {
                series: index,
                label: key.to_string(),
                value: label.value,
            });
        }
        tags.push(Label::new(key, label.value));
    }

    let name = name.filter(|n| !n.is_empty()).ok_or_else(|| {
        ValidationError::MissingMetricName { series: index, name: opts.metric_name.clone() }
    })?;

    if series.samples.is_empty() {
        return Err(ValidationError::NoSamples { series: index });
    }

    Ok(CanonicalSeries::new(name, Tags::from_unique(tags), series.samples))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Sample;

    fn raw(labels: &[(&str, &str)], samples: &[(i64, f64)]) -> RawSeries {
        RawSeries::new(
            labels.iter().map(|(k, v)| Label::new(*k, *v)).collect(),
            samples.iter().map(|(t, v)| Sample::new(*t, *v)).collect(),
        )
    }

    /// Series count and sample order survive canonicalization.
    #[test]
    fn test_canonicalize_preserves_count_and_order() {
        let input = vec![
            raw(&[("__name__", "first"), ("foo", "bar")], &[(3, 1.0), (1, 2.0), (2, 3.0)]),
            raw(&[("foo", "qux"), ("__name__", "second")], &[(5, 4.0)]),
        ];

        let batch = canonicalize(input, &TagOptions::new(), None).expect("valid series");

        assert_eq!(batch.len(), 2);
        assert_eq!(batch.series()[0].name(), "first");
        assert_eq!(
            batch.series()[0].samples(),
            &[Sample::new(3, 1.0), Sample::new(1, 2.0), Sample::new(2, 3.0)]
        );
        assert_eq!(batch.series()[1].name(), "second");
        assert_eq!(batch.series()[1].tags().get("foo"), Some("qux"));
        assert_eq!(batch.tenant(), None);
    }

    #[test]
    fn test_canonicalize_missing_metric_name() {
        let input = vec![
            raw(&[("__name__", "ok")], &[(1, 1.0)]),
            raw(&[("job", "api")], &[(1, 1.0)]),
        ];

        let err = canonicalize(input, &TagOptions::new(), None).expect_err("no name");
        assert_eq!(
            err,
            ValidationError::MissingMetricName { series: 1, name: "__name__".to_string() }
        );
    }

    /// An empty metric name value counts as missing.
    #[test]
    fn test_canonicalize_empty_metric_name() {
        let input = vec![raw(&[("__name__", ""), ("job", "api")], &[(1, 1.0)])];
        let err = canonicalize(input, &TagOptions::new(), None).expect_err("empty name");
        assert!(matches!(err, ValidationError::MissingMetricName { series: 0, .. }));
    }

    #[test]
    fn test_canonicalize_duplicate_label() {
        let input = vec![raw(&[("__name__", "up"), ("job", "a"), ("job", "b")], &[(1, 1.0)])];
        let err = canonicalize(input, &TagOptions::new(), None).expect_err("duplicate");
        assert_eq!(err, ValidationError::DuplicateLabel { series: 0, label: "job".to_string() });
    }

    #[test]
    fn test_canonicalize_no_samples() {
        let input = vec![raw(&[("__name__", "up")], &[])];
        let err = canonicalize(input, &TagOptions::new(), None).expect_err("no samples");
        assert_eq!(err, ValidationError::NoSamples { series: 0 });
    }

    #[test]
    fn test_canonicalize_empty_label_name() {
        let input = vec![raw(&[("__name__", "up"), ("", "x")], &[(1, 1.0)])];
        let err = canonicalize(input, &TagOptions::new(), None).expect_err("empty label name");
        assert_eq!(err, ValidationError::EmptyLabelName { series: 0 });
    }

    #[test]
    fn test_canonicalize_custom_metric_name() {
        let opts = TagOptions::new().with_metric_name("name");
        let input = vec![raw(&[("name", "cpu"), ("__name__", "ignored")], &[(1, 1.0)])];

        let batch = canonicalize(input, &opts, Some("tenant-a".to_string())).expect("valid");
        assert_eq!(batch.series()[0].name(), "cpu");
        assert_eq!(batch.tenant(), Some("tenant-a"));
    }

    /// Rewrites apply before duplicate detection.
    #[test]
    fn test_canonicalize_rewrites() {
        let opts = TagOptions::new().with_rewrite("instance", "host");
        let ok = vec![raw(&[("__name__", "up"), ("instance", "h1")], &[(1, 1.0)])];
        let batch = canonicalize(ok, &opts, None).expect("valid");
        assert_eq!(batch.series()[0].tags().get("host"), Some("h1"));
        assert_eq!(batch.series()[0].tags().get("instance"), None);

        let clash = vec![raw(&[("__name__", "up"), ("instance", "h1"), ("host", "h2")], &[(1, 1.0)])];
        let err = canonicalize(clash, &opts, None).expect_err("rewritten duplicate");
        assert_eq!(err, ValidationError::DuplicateLabel { series: 0, label: "host".to_string() });
    }

    #[test]
    fn test_canonicalize_empty_values() {
        let input = || vec![raw(&[("__name__", "up"), ("zone", "")], &[(1, 1.0)])];

        let dropped = canonicalize(input(), &TagOptions::new(), None).expect("valid");
        assert_eq!(dropped.series()[0].tags().len(), 1);

        let opts = TagOptions::new().with_allow_tag_value_empty(true);
        let kept = canonicalize(input(), &opts, None).expect("valid");
        assert_eq!(kept.series()[0].tags().get("zone"), Some(""));
    }

    /// Bucket bounds must parse as floats; `+Inf` is a valid bound.
    #[test]
    fn test_canonicalize_bucket_bounds() {
        let bucket = |le: &str| vec![raw(&[("__name__", "latency_bucket"), ("le", le)], &[(1, 1.0)])];
        let opts = TagOptions::new();

        for le in ["0.005", "1", "+Inf", "1e3"] {
            let batch = canonicalize(bucket(le), &opts, None).expect("numeric bound");
            assert_eq!(batch.series()[0].tags().get("le"), Some(le));
        }

        let err = canonicalize(bucket("fast"), &opts, None).expect_err("non-numeric bound");
        assert_eq!(
            err,
            ValidationError::InvalidBucket {
                series: 0,
                label: "le".to_string(),
                value: "fast".to_string()
            }
        );
    }

    /// The bucket key is configurable and rewrites apply before the check.
    #[test]
    fn test_canonicalize_custom_bucket_name() {
        let opts = TagOptions::new().with_bucket_name("bound").with_rewrite("upper", "bound");

        let le_is_plain = vec![raw(&[("__name__", "m"), ("le", "fast")], &[(1, 1.0)])];
        assert!(canonicalize(le_is_plain, &opts, None).is_ok());

        let rewritten = vec![raw(&[("__name__", "m"), ("upper", "fast")], &[(1, 1.0)])];
        let err = canonicalize(rewritten, &opts, None).expect_err("rewritten bound");
        assert!(matches!(err, ValidationError::InvalidBucket { series: 0, .. }));
    }

    /// Same input, same batch.
    #[test]
    fn test_canonicalize_deterministic() {
        let input = || vec![raw(&[("b", "2"), ("__name__", "m"), ("a", "1")], &[(1, 1.0)])];
        let opts = TagOptions::new();
        assert_eq!(
            canonicalize(input(), &opts, None).expect("valid"),
            canonicalize(input(), &opts, None).expect("valid")
        );
    }
}
