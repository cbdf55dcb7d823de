//! Downsampling write target.
//!
//! Aligns every sample to the start of its resolution window and appends it
//! to a [`SeriesStore`]; a later sample in the same window replaces the
//! earlier one, so each window keeps the last value written.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::ConfigError;
use crate::ingest::{BoxError, WriteContext, WriteTarget};
use crate::models::{Sample, WriteBatch};
use crate::storage::SeriesStore;

/// Default target name of the downsampler.
pub const DOWNSAMPLER_TARGET_NAME: &str = "downsampler";

/// Writes window-aligned samples into its own store.
pub struct Downsampler {
    name: String,
    resolution_ms: i64,
    store: Arc<dyn SeriesStore>,
}

impl Downsampler {
    /// Create a downsampler writing at `resolution` into `store`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if the resolution is below one millisecond.
    pub fn new(resolution: Duration, store: Arc<dyn SeriesStore>) -> Result<Self, ConfigError> {
        let resolution_ms = i64::try_from(resolution.as_millis())
            .map_err(|_| ConfigError::Invalid(format!("resolution {resolution:?} is too large")))?;
        if resolution_ms < 1 {
            return Err(ConfigError::Invalid(format!(
                "downsample resolution must be at least 1ms, got {resolution:?}"
            )));
        }
        Ok(Self { name: DOWNSAMPLER_TARGET_NAME.to_string(), resolution_ms, store })
    }

    /// Rename the target.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn resolution(&self) -> Duration {
        Duration::from_millis(self.resolution_ms.unsigned_abs())
    }

    /// Start of the window holding `sample`, or `None` when that window begins
    /// before `i64::MIN`.
    fn align(&self, sample: &Sample) -> Option<Sample> {
        let timestamp =
            sample.timestamp.checked_sub(sample.timestamp.rem_euclid(self.resolution_ms))?;
        Some(Sample::new(timestamp, sample.value))
    }
}

#[async_trait]
impl WriteTarget for Downsampler {
    fn name(&self) -> &str {
        &self.name
    }

    async fn write_batch(&self, ctx: &WriteContext, batch: &WriteBatch) -> Result<(), BoxError> {
        let mut aligned = Vec::with_capacity(batch.series().len());
        for series in batch.series() {
            let samples = series
                .samples()
                .iter()
                .map(|s| {
                    self.align(s).ok_or_else(|| {
                        format!(
                            "sample timestamp {} of {} has no {}ms window",
                            s.timestamp,
                            series.name(),
                            self.resolution_ms
                        )
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            aligned.push((series.tags(), samples));
        }

        for (tags, samples) in aligned {
            if let Some(reason) = ctx.check() {
                return Err(format!("downsampling abandoned: {reason}").into());
            }
            self.store.append(batch.tenant(), tags, &samples);
        }
        Ok(())
    }
}
