//! Command-line interface definitions for the remote write gateway.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

/// Command-line arguments for the remote write gateway.
///
/// Flags override the matching settings of the configuration file.
#[derive(Debug, Parser)]
#[command(name = "promwrite-gateway")]
#[command(
    author,
    version,
    about = "Prometheus remote write gateway: decode, canonicalize and fan out writes"
)]
pub struct Cli {
    /// Address to listen on
    #[arg(long, default_value = "127.0.0.1:7201")]
    pub listen: String,

    /// Path to YAML configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Default write deadline (e.g. 500ms, 30s)
    #[arg(long, value_parser = humantime::parse_duration)]
    pub timeout: Option<Duration>,

    /// Interval between metric counter flushes (e.g. 1s)
    #[arg(long, value_parser = humantime::parse_duration)]
    pub metrics_flush_interval: Option<Duration>,

    /// Maximum number of write targets written concurrently per request
    #[arg(long)]
    pub max_concurrency: Option<usize>,
}
