//! Series stores backing the built-in write targets.
//!
//! The gateway only talks to stores through [`crate::ingest::WriteTarget`];
//! this module provides the in-memory raw retention store and the
//! [`SeriesStore`] seam the downsampler writes through.

pub mod memory;

pub use memory::MemoryStorage;

use crate::models::{Sample, Tags};

/// Storage abstraction for appending samples to series.
pub trait SeriesStore: Send + Sync {
    /// Append samples to the series identified by `tenant` and `tags`.
    ///
    /// # Parameters
    ///
    /// - `tenant` - Tenant the series belongs to
    /// - `tags` - Canonical tag set identifying the series
    /// - `samples` - Samples to merge; a sample at an existing timestamp replaces it
    fn append(&self, tenant: Option<&str>, tags: &Tags, samples: &[Sample]);

    /// Snapshot of every stored series.
    fn series(&self) -> Vec<StoredSeries>;
}

/// A series as held by a store, with samples sorted by timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredSeries {
    pub tenant: Option<String>,
    pub tags: Tags,
    pub samples: Vec<Sample>,
}

impl StoredSeries {
    /// Create an empty stored series.
    pub fn new(tenant: Option<&str>, tags: Tags) -> Self {
        Self { tenant: tenant.map(str::to_string), tags, samples: Vec::new() }
    }

    /// Add a sample, maintaining sorted order by timestamp.
    ///
    /// # Parameters
    ///
    /// - `sample` - Sample to add, will replace existing sample at same timestamp
    pub fn add_sample(&mut self, sample: Sample) {
        match self.samples.binary_search_by_key(&sample.timestamp, |s| s.timestamp) {
            Ok(pos) => self.samples[pos] = sample,
            Err(pos) => self.samples.insert(pos, sample),
        }
    }
}
