//! In-memory raw retention store.
//!
//! Keeps every sample it is given, keyed by tenant and canonical tag set.
//! Useful as a development target and as the raw store in tests.

use std::hash::{Hash, Hasher};
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use fnv::{FnvHashMap, FnvHasher};

use crate::ingest::{BoxError, WriteContext, WriteTarget};
use crate::models::{Sample, Tags, WriteBatch};
use crate::storage::{SeriesStore, StoredSeries};

/// Default target name of the raw store.
pub const RAW_TARGET_NAME: &str = "raw";

/// In-memory storage for time series data.
pub struct MemoryStorage {
    name: String,
    /// Map from series fingerprint to time series
    series: RwLock<FnvHashMap<u64, StoredSeries>>,
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStorage {
    /// Create a new empty store named [`RAW_TARGET_NAME`].
    pub fn new() -> Self {
        Self::named(RAW_TARGET_NAME)
    }

    /// Create a new empty store with the given target name.
    pub fn named(name: impl Into<String>) -> Self {
        Self { name: name.into(), series: RwLock::new(FnvHashMap::default()) }
    }

    /// Number of distinct series stored.
    pub fn len(&self) -> usize {
        self.series.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Look up one series by tenant and tag set.
    pub fn get(&self, tenant: Option<&str>, tags: &Tags) -> Option<StoredSeries> {
        let fp = Self::fingerprint(tenant, tags);
        self.series.read().unwrap_or_else(PoisonError::into_inner).get(&fp).cloned()
    }

    /// Generate fingerprint for a tenant and tag set
    fn fingerprint(tenant: Option<&str>, tags: &Tags) -> u64 {
        let mut hasher = FnvHasher::default();
        tenant.hash(&mut hasher);
        tags.hash(&mut hasher);
        hasher.finish()
    }

    fn append_locked(
        series: &mut FnvHashMap<u64, StoredSeries>,
        tenant: Option<&str>,
        tags: &Tags,
        samples: &[Sample],
    ) {
        let stored = series
            .entry(Self::fingerprint(tenant, tags))
            .or_insert_with(|| StoredSeries::new(tenant, tags.clone()));
        for sample in samples {
            stored.add_sample(*sample);
        }
    }
}

impl SeriesStore for MemoryStorage {
    fn append(&self, tenant: Option<&str>, tags: &Tags, samples: &[Sample]) {
        let mut series = self.series.write().unwrap_or_else(PoisonError::into_inner);
        Self::append_locked(&mut series, tenant, tags, samples);
    }

    fn series(&self) -> Vec<StoredSeries> {
        self.series.read().unwrap_or_else(PoisonError::into_inner).values().cloned().collect()
    }
}

#[async_trait]
impl WriteTarget for MemoryStorage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn write_batch(&self, ctx: &WriteContext, batch: &WriteBatch) -> Result<(), BoxError> {
        if let Some(reason) = ctx.check() {
            return Err(format!("raw write abandoned: {reason}").into());
        }

        // One lock for the whole batch so a batch is never half visible.
        let mut series = self.series.write().unwrap_or_else(PoisonError::into_inner);
        for s in batch.series() {
            Self::append_locked(&mut series, batch.tenant(), s.tags(), s.samples());
        }
        Ok(())
    }
}
