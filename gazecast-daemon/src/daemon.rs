//! Process lifecycle: start the endpoint, run the loop, shut down together

use anyhow::{anyhow, Context, Result};
use gazecast_broadcaster::{BroadcastLoop, GazeBroadcaster, LoopSummary};
use gazecast_pipeline::SampleProducer;
use std::future::Future;
use std::net::SocketAddr;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::config::DaemonConfig;
use crate::setup::build_producer;

/// A bound, ready-to-run broadcast server.
pub struct Daemon {
    broadcaster: GazeBroadcaster,
    producer: SampleProducer,
    shutdown: CancellationToken,
    local_addr: SocketAddr,
    tick_rate: u32,
}

impl Daemon {
    /// Build the producer and bind the WebSocket endpoint.
    ///
    /// Fails if the producer cannot be built or the port cannot be bound;
    /// the loop is not started until [`Daemon::run`].
    pub async fn start(config: &DaemonConfig) -> Result<Self> {
        let producer = build_producer(config).context("Failed to build sample producer")?;

        let shutdown = CancellationToken::new();
        let broadcaster = GazeBroadcaster::new(config.broadcaster_settings(), shutdown.clone());
        let local_addr = broadcaster
            .start()
            .await
            .context("Failed to start gaze broadcaster")?;

        Ok(Self {
            broadcaster,
            producer,
            shutdown,
            local_addr,
            tick_rate: config.tick_rate,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Token that stops the whole daemon when cancelled
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Run the broadcast loop until `signal` resolves, the token is cancelled,
    /// or production fails. Every connection is closed before this returns.
    pub async fn run<F>(self, signal: F) -> Result<LoopSummary>
    where
        F: Future<Output = ()>,
    {
        let Self {
            broadcaster,
            producer,
            shutdown,
            tick_rate,
            ..
        } = self;

        let mut loop_task = tokio::spawn(
            BroadcastLoop::with_rate(broadcaster.registry(), tick_rate).run(producer, shutdown.clone()),
        );

        let finished = tokio::select! {
            joined = &mut loop_task => Some(joined),
            _ = signal => {
                info!("Received shutdown signal");
                None
            }
            _ = shutdown.cancelled() => None,
        };

        shutdown.cancel();
        let outcome = match finished {
            Some(joined) => joined,
            None => loop_task.await,
        };

        info!("Shutting down...");
        broadcaster.stop().await.context("Failed to stop gaze broadcaster")?;

        match outcome {
            Ok(Ok(summary)) => {
                info!(
                    ticks = summary.ticks,
                    blinks = summary.blinks,
                    delivered = summary.delivered,
                    lagging = summary.lagging,
                    evicted = summary.evicted,
                    "Gazecast daemon stopped"
                );
                Ok(summary)
            }
            Ok(Err(e)) => {
                error!("Broadcast loop failed: {}", e);
                Err(e).context("Broadcast loop failed")
            }
            Err(e) => Err(anyhow!("Broadcast loop task failed: {}", e)),
        }
    }
}

/// Resolves on Ctrl-C, or SIGTERM on Unix.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
