//! Command-line subscriber: prints one line per received sample

use anyhow::{Context, Result};
use futures_util::{SinkExt, StreamExt};
use gazecast_broadcaster::GazeMessage;
use std::io::Write;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info};

pub const DEFAULT_URL: &str = "ws://localhost:8001/";

/// Render a sample as `x y blink`
pub fn format_line(msg: &GazeMessage) -> String {
    format!("{:.6} {:.6} {}", msg.x, msg.y, msg.blink)
}

/// Connect to `url` and write each sample to `out` until the server closes
/// the connection or `count` samples have been written. Returns the number
/// of samples written.
pub async fn tail<W: Write>(url: &str, count: Option<u64>, out: &mut W) -> Result<u64> {
    let (ws, _) = connect_async(url)
        .await
        .with_context(|| format!("Failed to connect to {}", url))?;
    info!("Connected to {}", url);

    let (mut sink, mut stream) = ws.split();
    let mut written = 0u64;

    while count.map_or(true, |limit| written < limit) {
        let Some(frame) = stream.next().await else {
            break;
        };
        match frame.context("WebSocket read failed")? {
            Message::Text(text) => {
                let msg = GazeMessage::parse(&text).context("Malformed sample")?;
                writeln!(out, "{}", format_line(&msg))?;
                written += 1;
            }
            Message::Close(frame) => {
                debug!(?frame, "Server closed the connection");
                break;
            }
            _ => {}
        }
    }

    // Completes the close handshake, or starts it when stopping on --count
    if let Err(e) = sink.close().await {
        debug!("Close failed: {}", e);
    }

    out.flush()?;
    Ok(written)
}
