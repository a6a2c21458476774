//! Per-subscriber connection lifecycle

use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use crate::client::{ConnectionRegistry, Subscriber};
use crate::error::{BroadcasterError, Result};

/// Default limit on the WebSocket upgrade after the TCP accept
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// How long the writer gets to flush and send a close frame after deregistration
const CLOSE_GRACE: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CloseReason {
    Shutdown,
    ClosedByPeer,
    SendFailed,
    TransportError,
}

/// Accept the WebSocket handshake (bounded by `handshake_timeout` and
/// abandoned on shutdown), register, and hold the connection until
/// the peer goes away or `shutdown` fires; then deregister and close.
///
/// Samples are pushed by the broadcast loop through the registry; this task
/// only owns the connection's lifetime. Inbound data frames are ignored.
pub async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    registry: Arc<ConnectionRegistry>,
    queue_capacity: usize,
    handshake_timeout: Duration,
    shutdown: CancellationToken,
) -> Result<()> {
    let handshake = tokio::time::timeout(handshake_timeout, tokio_tungstenite::accept_async(stream));
    let ws = tokio::select! {
        _ = shutdown.cancelled() => {
            tracing::debug!(%peer, "Shutdown during handshake");
            return Ok(());
        }
        accepted = handshake => match accepted {
            Ok(Ok(ws)) => ws,
            Ok(Err(source)) => return Err(BroadcasterError::Handshake { peer, source }),
            Err(_) => {
                return Err(BroadcasterError::HandshakeTimeout {
                    peer,
                    timeout: handshake_timeout,
                })
            }
        }
    };
    let (mut sink, mut inbound) = ws.split();

    let (subscriber, mut queue) = Subscriber::new(Some(peer), queue_capacity);
    let id = subscriber.id();
    let total = registry.add(Arc::clone(&subscriber));
    tracing::info!(subscriber = %id, %peer, total, "Subscriber connected");

    // Drains the queue onto the socket; ends when every sender is dropped
    // (close frame sent) or a write fails.
    let mut writer = tokio::spawn(async move {
        while let Some(message) = queue.recv().await {
            if let Err(e) = sink.send(message).await {
                tracing::debug!(%peer, "Send failed: {}", e);
                return;
            }
        }
        let _ = sink.close().await;
    });

    let mut writer_done = false;
    let reason = loop {
        tokio::select! {
            _ = shutdown.cancelled() => break CloseReason::Shutdown,
            _ = &mut writer => {
                writer_done = true;
                break CloseReason::SendFailed;
            }
            frame = inbound.next() => match frame {
                Some(Ok(Message::Close(_))) | None => break CloseReason::ClosedByPeer,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::debug!(subscriber = %id, "Transport error: {}", e);
                    break CloseReason::TransportError;
                }
            }
        }
    };

    registry.remove(id);
    drop(subscriber);

    if !writer_done && tokio::time::timeout(CLOSE_GRACE, &mut writer).await.is_err() {
        writer.abort();
    }

    tracing::info!(
        subscriber = %id,
        %peer,
        ?reason,
        remaining = registry.len(),
        "Subscriber disconnected"
    );
    Ok(())
}
