use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;

use crate::client::ConnectionRegistry;
use crate::connection::{handle_connection, DEFAULT_HANDSHAKE_TIMEOUT};
use crate::error::{BroadcasterError, Result};

/// Default per-subscriber outbound queue, in messages
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// Pause after a failed accept before trying again
const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Listener settings
#[derive(Debug, Clone)]
pub struct BroadcasterSettings {
    pub host: String,
    pub port: u16,
    pub queue_capacity: usize,
    /// Connections that have not upgraded within this are dropped
    pub handshake_timeout: Duration,
}

impl Default for BroadcasterSettings {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 8001,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
        }
    }
}

/// WebSocket endpoint for gaze subscribers
///
/// Accepts connections and runs one supervised handler task per subscriber.
/// Handlers register themselves in the shared [`ConnectionRegistry`]; the
/// broadcast loop fans samples out through that registry. Cancelling the
/// shutdown token stops accepting, closes every connection and joins every
/// handler before [`GazeBroadcaster::stop`] returns.
pub struct GazeBroadcaster {
    settings: BroadcasterSettings,
    registry: Arc<ConnectionRegistry>,
    shutdown: CancellationToken,
    accept_task: Mutex<Option<JoinHandle<()>>>,
}

impl GazeBroadcaster {
    /// Create new broadcaster
    pub fn new(settings: BroadcasterSettings, shutdown: CancellationToken) -> Self {
        Self {
            settings,
            registry: Arc::new(ConnectionRegistry::new()),
            shutdown,
            accept_task: Mutex::new(None),
        }
    }

    /// Shared registry, for the broadcast loop
    pub fn registry(&self) -> Arc<ConnectionRegistry> {
        Arc::clone(&self.registry)
    }

    /// Bind the listener and start accepting subscribers.
    ///
    /// Returns the bound address (useful with port 0). Bind failure is fatal.
    pub async fn start(&self) -> Result<SocketAddr> {
        let mut accept_task = self.accept_task.lock().await;
        if accept_task.is_some() {
            return Err(BroadcasterError::AlreadyRunning);
        }

        let addr = format!("{}:{}", self.settings.host, self.settings.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| BroadcasterError::Bind { addr: addr.clone(), source })?;
        let local_addr = listener.local_addr()?;

        tracing::info!("Gaze broadcaster listening on ws://{}", local_addr);

        let registry = Arc::clone(&self.registry);
        let settings = self.settings.clone();
        let shutdown = self.shutdown.clone();

        *accept_task = Some(tokio::spawn(accept_loop(listener, registry, settings, shutdown)));

        Ok(local_addr)
    }

    /// Stop accepting, close all subscriber connections and wait for their
    /// handlers to finish.
    pub async fn stop(&self) -> Result<()> {
        let task = self
            .accept_task
            .lock()
            .await
            .take()
            .ok_or(BroadcasterError::NotStarted)?;

        self.shutdown.cancel();
        if let Err(e) = task.await {
            tracing::error!("Accept task failed: {}", e);
        }

        tracing::info!("Gaze broadcaster stopped");
        Ok(())
    }

    /// Get current subscriber count
    pub fn client_count(&self) -> usize {
        self.registry.len()
    }
}

async fn accept_loop(
    listener: TcpListener,
    registry: Arc<ConnectionRegistry>,
    settings: BroadcasterSettings,
    shutdown: CancellationToken,
) {
    let mut handlers = JoinSet::new();

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    tracing::debug!(%peer, "Connection accepted");
                    handlers.spawn(handle_connection(
                        stream,
                        peer,
                        Arc::clone(&registry),
                        settings.queue_capacity,
                        settings.handshake_timeout,
                        shutdown.clone(),
                    ));
                }
                Err(e) => {
                    tracing::error!("Failed to accept connection: {}", e);
                    tokio::time::sleep(ACCEPT_RETRY_DELAY).await;
                }
            },
            Some(finished) = handlers.join_next(), if !handlers.is_empty() => {
                log_handler_exit(finished);
            }
        }
    }

    drop(listener);
    tracing::info!(open = handlers.len(), "Closing subscriber connections");
    while let Some(finished) = handlers.join_next().await {
        log_handler_exit(finished);
    }
    tracing::info!("Client acceptance task stopped");
}

fn log_handler_exit(finished: std::result::Result<Result<()>, tokio::task::JoinError>) {
    match finished {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::warn!("Subscriber connection failed: {}", e),
        Err(e) => tracing::error!("Subscriber handler panicked: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local() -> BroadcasterSettings {
        BroadcasterSettings {
            host: "127.0.0.1".to_string(),
            port: 0,
            queue_capacity: 8,
            handshake_timeout: Duration::from_secs(2),
        }
    }

    #[tokio::test]
    async fn test_broadcaster_create() {
        let broadcaster = GazeBroadcaster::new(local(), CancellationToken::new());
        assert_eq!(broadcaster.client_count(), 0);
        assert!(broadcaster.registry().is_empty());
    }

    #[tokio::test]
    async fn test_start_twice_rejected() {
        let broadcaster = GazeBroadcaster::new(local(), CancellationToken::new());
        broadcaster.start().await.unwrap();
        assert!(matches!(
            broadcaster.start().await,
            Err(BroadcasterError::AlreadyRunning)
        ));
        broadcaster.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_stop_without_start() {
        let broadcaster = GazeBroadcaster::new(local(), CancellationToken::new());
        assert!(matches!(broadcaster.stop().await, Err(BroadcasterError::NotStarted)));
    }

    #[tokio::test]
    async fn test_bind_conflict_is_error() {
        let first = GazeBroadcaster::new(local(), CancellationToken::new());
        let addr = first.start().await.unwrap();

        let second = GazeBroadcaster::new(
            BroadcasterSettings {
                port: addr.port(),
                ..local()
            },
            CancellationToken::new(),
        );
        assert!(matches!(second.start().await, Err(BroadcasterError::Bind { .. })));

        first.stop().await.unwrap();
    }
}
