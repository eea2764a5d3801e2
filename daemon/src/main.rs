//! Activity Check Daemon
//!
//! Serves `POST /isgood`: accepts a batch of activity check records and
//! answers whether every record is valid.

mod config;
mod handler;
mod metrics;

use anyhow::Result;
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

use config::DaemonConfig;
use metrics::Metrics;

/// Activity Check Daemon - batch validation service
#[derive(Parser, Debug)]
#[command(name = "actcheckd")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file (defaults to daemon.toml when present)
    #[arg(short, long)]
    config: Option<String>,

    /// Additional configuration file merged over the base config
    #[arg(long)]
    overlay: Option<String>,

    /// Override the listen address
    #[arg(long)]
    bind: Option<SocketAddr>,

    /// Run in verbose mode
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("Activity Check Daemon v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let mut config = match &args.config {
        Some(path) => {
            let config = DaemonConfig::load(path).await?;
            info!("Loaded configuration from {}", path);
            config
        }
        None => {
            info!("Loading default configuration");
            DaemonConfig::load_default().await?
        }
    };

    if let Some(path) = &args.overlay {
        config.load_merge(path).await?;
        info!("Merged configuration overlay from {}", path);
    }

    if let Some(bind) = args.bind {
        config.server.bind = bind;
    }

    let metrics = Arc::new(Metrics::new()?);

    // Start metrics server
    let metrics_handle = metrics::start_server(&config.monitoring, metrics.clone());

    info!("Starting handler on {}", config.server.bind);
    tokio::select! {
        result = handler::run_handler(&config, metrics) => result?,
        _ = tokio::signal::ctrl_c() => info!("Shutting down"),
    }

    // Cleanup
    metrics_handle.abort();

    Ok(())
}
