//! Gateway configuration loaded from YAML.
//!
//! ```yaml
//! tag_options:
//!   metric_name: __name__
//!   rewrites:
//!     - { from: instance, to: host }
//! write:
//!   timeout: 30s
//!   max_concurrency: 2
//! targets:
//!   downsample:
//!     resolution: 1m
//! metrics:
//!   flush_interval: 1s
//! ```
//!
//! Every section is optional; durations use humantime syntax.

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Deserializer};

use crate::error::ConfigError;
use crate::ingest::{Downsampler, FanoutWriter};
use crate::metrics::{Scope, DEFAULT_FLUSH_INTERVAL};
use crate::models::TagOptions;
use crate::storage::MemoryStorage;
use crate::wire::{WireDecoder, DEFAULT_MAX_DECODED_BYTES};

/// Default deadline for a single write.
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(30);

/// Default downsampling resolution.
pub const DEFAULT_DOWNSAMPLE_RESOLUTION: Duration = Duration::from_secs(60);

/// Top-level gateway configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GatewayConfig {
    pub tag_options: TagOptions,
    pub write: WriteConfig,
    pub targets: TargetsConfig,
    pub metrics: MetricsConfig,
}

/// Write path settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WriteConfig {
    /// Deadline applied when the request does not carry one
    #[serde(deserialize_with = "deserialize_duration")]
    pub timeout: Duration,
    /// Targets written concurrently per request; all of them when unset
    pub max_concurrency: Option<usize>,
    /// Limit on a request's decompressed size
    pub max_decoded_bytes: usize,
}

impl Default for WriteConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_WRITE_TIMEOUT,
            max_concurrency: None,
            max_decoded_bytes: DEFAULT_MAX_DECODED_BYTES,
        }
    }
}

/// Which built-in write targets are enabled.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TargetsConfig {
    pub raw: RawTargetConfig,
    pub downsample: DownsampleTargetConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RawTargetConfig {
    pub enabled: bool,
}

impl Default for RawTargetConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DownsampleTargetConfig {
    pub enabled: bool,
    #[serde(deserialize_with = "deserialize_duration")]
    pub resolution: Duration,
}

impl Default for DownsampleTargetConfig {
    fn default() -> Self {
        Self { enabled: true, resolution: DEFAULT_DOWNSAMPLE_RESOLUTION }
    }
}

/// Metrics scope settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MetricsConfig {
    #[serde(deserialize_with = "deserialize_duration")]
    pub flush_interval: Duration,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { flush_interval: DEFAULT_FLUSH_INTERVAL }
    }
}

impl GatewayConfig {
    /// Load and validate configuration from a YAML file.
    ///
    /// # Parameters
    ///
    /// - `path` - Path to the YAML file
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file cannot be read or parsed, or fails validation.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let txt = fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&txt)?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` describing the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.tag_options.validate()?;

        if !self.targets.raw.enabled && !self.targets.downsample.enabled {
            return Err(ConfigError::Invalid("no write targets enabled".to_string()));
        }
        if self.write.timeout.is_zero() {
            return Err(ConfigError::Invalid("write timeout must be positive".to_string()));
        }
        if self.write.max_concurrency == Some(0) {
            return Err(ConfigError::Invalid("max_concurrency must be at least 1".to_string()));
        }
        if self.write.max_decoded_bytes == 0 {
            return Err(ConfigError::Invalid("max_decoded_bytes must be positive".to_string()));
        }
        if self.metrics.flush_interval.is_zero() {
            return Err(ConfigError::Invalid("metrics flush interval must be positive".to_string()));
        }
        Ok(())
    }

    /// Decoder honoring the configured size limit.
    pub fn decoder(&self) -> WireDecoder {
        WireDecoder::new(self.write.max_decoded_bytes)
    }

    /// Assemble the fan-out writer over the enabled in-memory targets.
    ///
    /// # Parameters
    ///
    /// - `scope` - Scope per-target metrics are recorded in
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if no target is enabled or a target setting is invalid.
    pub fn build_writer(&self, scope: &Scope) -> Result<FanoutWriter, ConfigError> {
        let mut builder = FanoutWriter::builder().with_scope(scope.clone());

        if self.targets.raw.enabled {
            builder = builder.with_target(Arc::new(MemoryStorage::new()));
        }
        if self.targets.downsample.enabled {
            let store = Arc::new(MemoryStorage::named("downsampled"));
            let downsampler = Downsampler::new(self.targets.downsample.resolution, store)?;
            builder = builder.with_target(Arc::new(downsampler));
        }
        if let Some(max_concurrency) = self.write.max_concurrency {
            builder = builder.with_max_concurrency(max_concurrency);
        }

        builder.build()
    }
}

fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    humantime::parse_duration(&s).map_err(serde::de::Error::custom)
}
