//! Options controlling how label keys map to reserved tag concepts.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Default label key holding the metric name.
pub const DEFAULT_METRIC_NAME: &str = "__name__";

/// Default label key holding a histogram bucket's upper bound.
pub const DEFAULT_BUCKET_NAME: &str = "le";

/// Rename a label key during canonicalization.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct TagRewrite {
    pub from: String,
    pub to: String,
}

/// Tag naming options, shared read-only by all in-flight requests.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct TagOptions {
    /// Label key naming the metric
    pub metric_name: String,
    /// Label key naming a histogram bucket bound; its values must parse as floats
    pub bucket_name: String,
    /// Keep labels whose value is the empty string
    pub allow_tag_value_empty: bool,
    /// Key rewrites, applied in order before validation
    pub rewrites: Vec<TagRewrite>,
}

impl Default for TagOptions {
    fn default() -> Self {
        Self {
            metric_name: DEFAULT_METRIC_NAME.to_string(),
            bucket_name: DEFAULT_BUCKET_NAME.to_string(),
            allow_tag_value_empty: false,
            rewrites: Vec::new(),
        }
    }
}

impl TagOptions {
    /// Create options with the Prometheus defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the metric name label key.
    pub fn with_metric_name(mut self, name: impl Into<String>) -> Self {
        self.metric_name = name.into();
        self
    }

    /// Set the histogram bucket label key.
    pub fn with_bucket_name(mut self, name: impl Into<String>) -> Self {
        self.bucket_name = name.into();
        self
    }

    /// Append a key rewrite rule.
    pub fn with_rewrite(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.rewrites.push(TagRewrite { from: from.into(), to: to.into() });
        self
    }

    /// Keep or drop labels with empty values.
    pub fn with_allow_tag_value_empty(mut self, allow: bool) -> Self {
        self.allow_tag_value_empty = allow;
        self
    }

    /// Check the options are usable.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if a reserved name or a rewrite key is empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.metric_name.is_empty() {
            return Err(ConfigError::Invalid("metric name tag must not be empty".to_string()));
        }
        if self.bucket_name.is_empty() {
            return Err(ConfigError::Invalid("bucket name tag must not be empty".to_string()));
        }
        if self.metric_name == self.bucket_name {
            return Err(ConfigError::Invalid(format!(
                "metric name and bucket name tags are both {:?}",
                self.metric_name
            )));
        }
        for rewrite in &self.rewrites {
            if rewrite.from.is_empty() || rewrite.to.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "tag rewrite {:?} -> {:?} has an empty key",
                    rewrite.from, rewrite.to
                )));
            }
        }
        Ok(())
    }

    /// Key a label ends up under after rewrites.
    pub(crate) fn rewrite_key<'a>(&'a self, key: &'a str) -> &'a str {
        self.rewrites.iter().fold(key, |key, r| if key == r.from { r.to.as_str() } else { key })
    }
}
