//! Series data model shared by the decoder, canonicalizer and write targets.
//!
//! Raw series come straight off the wire; canonical series have passed
//! validation under [`TagOptions`] and carry a normalized tag set.

pub mod tag_options;

pub use tag_options::{TagOptions, TagRewrite};

use std::fmt::Write as _;

/// A metric label representing a name=value pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Label {
    pub name: String,
    pub value: String,
}

impl Label {
    /// Create a new label with the given name and value.
    ///
    /// # Parameters
    ///
    /// - `name` - Label name
    /// - `value` - Label value
    ///
    /// # Returns
    ///
    /// Returns a new `Label` instance.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self { name: name.into(), value: value.into() }
    }
}

/// A single metric sample with timestamp and value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    /// Milliseconds since Unix epoch
    pub timestamp: i64,
    pub value: f64,
}

impl Sample {
    /// Create a new sample with the given timestamp (milliseconds) and value.
    pub const fn new(timestamp: i64, value: f64) -> Self {
        Self { timestamp, value }
    }
}

/// A series exactly as it arrived in the remote write payload.
///
/// Label and sample order are those of the wire message; nothing is
/// validated yet.
#[derive(Debug, Clone, PartialEq)]
pub struct RawSeries {
    pub labels: Vec<Label>,
    pub samples: Vec<Sample>,
}

impl RawSeries {
    pub const fn new(labels: Vec<Label>, samples: Vec<Sample>) -> Self {
        Self { labels, samples }
    }
}

/// Normalized tag set of a canonical series, sorted by tag name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Tags {
    tags: Vec<Label>,
}

impl Tags {
    /// Build a tag set from labels with unique names, sorting them by name.
    pub(crate) fn from_unique(mut tags: Vec<Label>) -> Self {
        tags.sort_unstable_by(|a, b| a.name.cmp(&b.name));
        Self { tags }
    }

    /// Value of the tag called `name`, if present.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.tags
            .binary_search_by(|t| t.name.as_str().cmp(name))
            .ok()
            .map(|i| self.tags[i].value.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Label> {
        self.tags.iter()
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    /// Stable textual identity, e.g. `__name__="up",job="api"`.
    pub fn id(&self) -> String {
        let mut id = String::new();
        for (i, tag) in self.tags.iter().enumerate() {
            if i > 0 {
                id.push(',');
            }
            // Writing into a String cannot fail.
            let _ = write!(id, "{}={:?}", tag.name, tag.value);
        }
        id
    }
}

/// A validated series ready to be written.
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalSeries {
    name: String,
    tags: Tags,
    samples: Vec<Sample>,
}

impl CanonicalSeries {
    pub(crate) fn new(name: String, tags: Tags, samples: Vec<Sample>) -> Self {
        Self { name, tags, samples }
    }

    /// Metric name, taken from the label named by [`TagOptions::metric_name`].
    pub fn name(&self) -> &str {
        &self.name
    }

    pub const fn tags(&self) -> &Tags {
        &self.tags
    }

    /// Samples in the order they were received.
    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }
}

/// All canonical series of one remote write request.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteBatch {
    series: Vec<CanonicalSeries>,
    tenant: Option<String>,
}

impl WriteBatch {
    pub(crate) fn new(series: Vec<CanonicalSeries>, tenant: Option<String>) -> Self {
        Self { series, tenant }
    }

    pub fn series(&self) -> &[CanonicalSeries] {
        &self.series
    }

    /// Tenant the request was routed for, if any.
    pub fn tenant(&self) -> Option<&str> {
        self.tenant.as_deref()
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    /// Total number of samples across all series.
    pub fn sample_count(&self) -> usize {
        self.series.iter().map(|s| s.samples.len()).sum()
    }
}
