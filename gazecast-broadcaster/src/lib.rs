//! Real-time gaze broadcaster for Gazecast
//!
//! This crate provides a WebSocket server that pushes one gaze sample per tick
//! to every connected subscriber. It manages multiple concurrent subscribers,
//! isolates slow or dead ones from the rest, and shuts every connection down
//! together with the process.
//!
//! # Features
//!
//! - WebSocket endpoint (default `ws://localhost:8001/`, any path)
//! - One JSON text frame per tick: `{"x": f64, "y": f64, "blink": bool}`
//! - Fixed-rate loop with no catch-up bursts after an overrun
//! - Non-blocking fan-out through bounded per-subscriber queues
//! - Supervised connection handlers, joined on shutdown
//!
//! # Example Usage
//!
//! ```no_run
//! use gazecast_broadcaster::{BroadcastLoop, BroadcasterSettings, GazeBroadcaster};
//! use gazecast_pipeline::{
//!     Normalizer, SampleProducer, ScreenSize, SmootherKind, SyntheticEstimator, SyntheticSource,
//! };
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let shutdown = CancellationToken::new();
//!     let broadcaster = GazeBroadcaster::new(BroadcasterSettings::default(), shutdown.clone());
//!     broadcaster.start().await?;
//!
//!     let screen = ScreenSize::default();
//!     let producer = SampleProducer::new(
//!         Box::new(SyntheticSource::new()),
//!         Box::new(SyntheticEstimator::new(screen)),
//!         SmootherKind::Kalman.build(0.3),
//!         Normalizer::new(screen)?,
//!     );
//!
//!     // Runs until the token is cancelled or the source runs dry
//!     let summary = BroadcastLoop::with_rate(broadcaster.registry(), 60)
//!         .run(producer, shutdown.clone())
//!         .await;
//!
//!     broadcaster.stop().await?;
//!     println!("{:?}", summary);
//!     Ok(())
//! }
//! ```

pub mod broadcaster;
pub mod client;
pub mod connection;
pub mod error;
pub mod events;
pub mod ticker;

// Re-exports
pub use broadcaster::{BroadcasterSettings, GazeBroadcaster, DEFAULT_QUEUE_CAPACITY};
pub use connection::DEFAULT_HANDSHAKE_TIMEOUT;
pub use client::{BroadcastReport, ConnectionRegistry, Delivery, Subscriber, SubscriberId};
pub use error::{BroadcasterError, Result};
pub use events::GazeMessage;
pub use ticker::{tick_interval, BroadcastLoop, LoopSummary, DEFAULT_TICK_RATE};
