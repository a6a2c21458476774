//! Gazecast Daemon - real-time gaze broadcast server
//!
//! Samples the gaze pipeline at a fixed rate and pushes every sample to all
//! WebSocket subscribers (default ws://localhost:8001/).

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use gazecast_daemon::logging::init_tracing;
use gazecast_daemon::{shutdown_signal, CliArgs, Daemon, DaemonConfig};

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();
    let config = DaemonConfig::from_args(&args).context("Failed to load configuration")?;

    init_tracing(&config.log_level);

    info!("Starting Gazecast Daemon v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration loaded from {}", config.config_path.display());

    let daemon = Daemon::start(&config).await?;

    info!("Gazecast daemon ready on ws://{}", daemon.local_addr());
    info!("  - Rate: {} Hz", config.tick_rate);
    info!("  - Screen: {}x{}", config.screen_width, config.screen_height);
    info!("  - Source: {}, smoother: {}", config.source, config.smoother);

    daemon.run(shutdown_signal()).await?;
    Ok(())
}
