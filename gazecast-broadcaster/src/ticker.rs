//! Fixed-rate sample production and fan-out

use gazecast_pipeline::SampleProducer;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::client::ConnectionRegistry;
use crate::error::{BroadcasterError, Result};
use crate::events::GazeMessage;

/// Default sampling rate in ticks per second
pub const DEFAULT_TICK_RATE: u32 = 60;

/// Interval between ticks for a rate in ticks per second (0 is treated as 1)
pub fn tick_interval(tick_rate: u32) -> Duration {
    Duration::from_secs_f64(1.0 / f64::from(tick_rate.max(1)))
}

/// Counters accumulated over a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopSummary {
    pub ticks: u64,
    pub blinks: u64,
    pub delivered: u64,
    pub lagging: u64,
    pub evicted: u64,
}

/// Drives one sample per tick from the producer to every registered subscriber.
pub struct BroadcastLoop {
    registry: Arc<ConnectionRegistry>,
    tick_interval: Duration,
}

impl BroadcastLoop {
    pub fn new(registry: Arc<ConnectionRegistry>, tick_interval: Duration) -> Self {
        Self {
            registry,
            tick_interval,
        }
    }

    pub fn with_rate(registry: Arc<ConnectionRegistry>, tick_rate: u32) -> Self {
        Self::new(registry, tick_interval(tick_rate))
    }

    /// Run until `shutdown` is cancelled or production fails.
    ///
    /// A tick that overruns the interval is followed immediately by the next
    /// one; missed ticks are never made up. Sample production runs on the
    /// blocking pool because capture and inference may block. A production
    /// error ends the loop before anything else is sent.
    pub async fn run(
        self,
        producer: SampleProducer,
        shutdown: CancellationToken,
    ) -> Result<LoopSummary> {
        let mut ticker = interval(self.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut producer = producer;
        let mut summary = LoopSummary::default();

        tracing::info!(
            interval_ms = self.tick_interval.as_secs_f64() * 1000.0,
            "Broadcast loop started"
        );

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let production = tokio::task::spawn_blocking(move || {
                let sample = producer.produce();
                (producer, sample)
            });

            let (returned, produced) = tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                joined = production => {
                    joined.map_err(|e| BroadcasterError::ProducerTask(e.to_string()))?
                }
            };
            producer = returned;

            let sample = match produced {
                Ok(sample) => sample,
                Err(e) => {
                    tracing::error!(ticks = summary.ticks, "Sample production failed: {}", e);
                    return Err(e.into());
                }
            };

            summary.ticks += 1;
            if sample.blink {
                summary.blinks += 1;
            }

            let message = GazeMessage::from(sample).to_ws_message()?;
            let report = self.registry.broadcast(&message);
            summary.delivered += report.delivered as u64;
            summary.lagging += report.lagging as u64;
            summary.evicted += report.removed as u64;

            tracing::trace!(
                tick = summary.ticks,
                x = sample.x,
                y = sample.y,
                blink = sample.blink,
                subscribers = report.delivered,
                "Tick"
            );
        }

        tracing::info!(?summary, "Broadcast loop stopped");
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::Subscriber;
    use gazecast_pipeline::{
        Normalizer, PipelineError, ScreenSize, SmootherKind, SyntheticEstimator, SyntheticSource,
    };

    fn producer(limit: Option<u64>, blink_every: u64) -> SampleProducer {
        let screen = ScreenSize::default();
        let source = match limit {
            Some(n) => SyntheticSource::with_limit(n),
            None => SyntheticSource::new(),
        };
        SampleProducer::new(
            Box::new(source),
            Box::new(SyntheticEstimator::new(screen).blink_every(blink_every)),
            SmootherKind::Kalman.build(0.3),
            Normalizer::new(screen).unwrap(),
        )
    }

    #[test]
    fn test_tick_interval() {
        assert_eq!(tick_interval(50), Duration::from_millis(20));
        assert_eq!(tick_interval(0), Duration::from_secs(1));
        let sixty = tick_interval(DEFAULT_TICK_RATE).as_secs_f64();
        assert!((sixty - 1.0 / 60.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_runs_without_subscribers() {
        let registry = Arc::new(ConnectionRegistry::new());
        let shutdown = CancellationToken::new();
        let task = tokio::spawn(
            BroadcastLoop::new(registry, Duration::from_millis(5)).run(producer(None, 0), shutdown.clone()),
        );

        tokio::time::sleep(Duration::from_millis(100)).await;
        shutdown.cancel();

        let summary = task.await.unwrap().unwrap();
        assert!(summary.ticks > 0);
        assert_eq!(summary.delivered, 0);
        assert_eq!(summary.evicted, 0);
    }

    #[tokio::test]
    async fn test_one_message_per_tick_in_order() {
        let registry = Arc::new(ConnectionRegistry::new());
        let (subscriber, mut rx) = Subscriber::new(None, 1024);
        registry.add(subscriber);

        let summary = BroadcastLoop::new(registry, Duration::from_millis(1))
            .run(producer(Some(40), 5), CancellationToken::new())
            .await;
        assert!(matches!(
            summary,
            Err(BroadcasterError::Pipeline(PipelineError::SourceExhausted))
        ));

        let mut received = Vec::new();
        while let Ok(message) = rx.try_recv() {
            received.push(GazeMessage::parse(message.to_text().unwrap()).unwrap());
        }
        assert_eq!(received.len(), 40);

        // Frames 4, 9, 14, ... blink, so the stream order is observable
        for (tick, msg) in received.iter().enumerate() {
            assert_eq!(msg.blink, tick % 5 == 4, "tick {}", tick);
            if msg.blink {
                assert_eq!((msg.x, msg.y), (0.0, 0.0));
            }
        }
    }

    #[tokio::test]
    async fn test_closed_subscriber_evicted_within_a_tick() {
        let registry = Arc::new(ConnectionRegistry::new());
        let (alive, mut rx_alive) = Subscriber::new(None, 1024);
        let (gone, rx_gone) = Subscriber::new(None, 1024);
        let gone_id = gone.id();
        registry.add(alive);
        registry.add(gone);
        drop(rx_gone);

        let result = BroadcastLoop::new(Arc::clone(&registry), Duration::from_millis(1))
            .run(producer(Some(10), 0), CancellationToken::new())
            .await;
        assert!(result.is_err());

        assert!(!registry.contains(gone_id));
        assert_eq!(registry.len(), 1);

        let mut count = 0;
        while rx_alive.try_recv().is_ok() {
            count += 1;
        }
        assert_eq!(count, 10);
    }

    #[tokio::test]
    async fn test_cancel_returns_summary() {
        let registry = Arc::new(ConnectionRegistry::new());
        let (subscriber, mut rx) = Subscriber::new(None, 4096);
        registry.add(subscriber);

        let shutdown = CancellationToken::new();
        let task = tokio::spawn(
            BroadcastLoop::new(registry, Duration::from_millis(2))
                .run(producer(None, 3), shutdown.clone()),
        );
        tokio::time::sleep(Duration::from_millis(60)).await;
        shutdown.cancel();
        let summary = task.await.unwrap().unwrap();

        let mut count = 0;
        while rx.try_recv().is_ok() {
            count += 1;
        }
        assert_eq!(count as u64, summary.delivered);
        assert_eq!(summary.delivered, summary.ticks);
        assert_eq!(summary.blinks, summary.ticks / 3);
    }
}
