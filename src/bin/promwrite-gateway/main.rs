//! # Remote Write Gateway CLI
//!
//! Command-line interface for the Prometheus remote write gateway.
//!
//! This binary loads the gateway configuration, wires the write targets and
//! metrics reporters together and serves the HTTP API until interrupted.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{fmt, EnvFilter};

use promwrite_gateway::config::GatewayConfig;
use promwrite_gateway::http::{build_router, AppState};
use promwrite_gateway::metrics::{
    FanoutReporter, PrometheusReporter, Scope, StatsReporter, TracingReporter,
};

mod cli;

use cli::Cli;

#[tokio::main]
async fn main() -> io::Result<()> {
    // Initialize logging
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(env_filter).init();

    // Parse CLI arguments
    let cli = Cli::parse();

    let mut config = if let Some(path) = &cli.config {
        GatewayConfig::load_from_path(path)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?
    } else {
        GatewayConfig::default()
    };
    apply_overrides(&mut config, &cli);
    config.validate().map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

    // Metrics go to the /metrics endpoint and the debug log
    let prometheus = Arc::new(PrometheusReporter::new());
    let reporters: Vec<Arc<dyn StatsReporter>> = vec![prometheus.clone(), Arc::new(TracingReporter)];
    let reporter = Arc::new(FanoutReporter::new(reporters));
    let (scope, closer) = Scope::root(reporter, config.metrics.flush_interval);

    let writer = config
        .build_writer(&scope)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
    tracing::info!(targets = ?writer.target_names(), "write targets ready");

    let shutdown = CancellationToken::new();
    let state = AppState::builder()
        .with_writer(Arc::new(writer))
        .with_decoder(config.decoder())
        .with_tag_options(config.tag_options.clone())
        .with_timeout(config.write.timeout)
        .with_scope(scope)
        .with_prometheus(prometheus)
        .with_shutdown(shutdown.clone())
        .build()?;

    let app = build_router(state);

    let addr: SocketAddr = cli.listen.parse().map_err(io::Error::other)?;
    tracing::info!("starting promwrite-gateway on http://{addr}");
    axum::serve(tokio::net::TcpListener::bind(addr).await?, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await?;

    closer.close().await;
    tracing::info!("promwrite-gateway stopped");
    Ok(())
}

fn apply_overrides(config: &mut GatewayConfig, cli: &Cli) {
    if let Some(timeout) = cli.timeout {
        config.write.timeout = timeout;
    }
    if let Some(interval) = cli.metrics_flush_interval {
        config.metrics.flush_interval = interval;
    }
    if cli.max_concurrency.is_some() {
        config.write.max_concurrency = cli.max_concurrency;
    }
}

/// Resolve on ctrl-c, cancelling in-flight writes.
async fn shutdown_signal(shutdown: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
    shutdown.cancel();
}
