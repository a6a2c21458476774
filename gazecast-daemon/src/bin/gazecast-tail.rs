//! Print gaze samples from a running daemon, one `x y blink` line each.

use anyhow::Result;
use clap::Parser;

use gazecast_daemon::logging::init_tracing;
use gazecast_daemon::tail::{tail, DEFAULT_URL};

#[derive(Parser, Debug)]
#[command(name = "gazecast-tail", version, about = "Print gaze samples from a Gazecast daemon")]
struct Args {
    /// Daemon endpoint
    #[arg(default_value = DEFAULT_URL)]
    url: String,

    /// Exit after this many samples
    #[arg(long, short = 'n')]
    count: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing("warn");

    let mut stdout = std::io::stdout().lock();
    tail(&args.url, args.count, &mut stdout).await?;
    Ok(())
}
