//! FrameSource → Estimator → Smoother → Normalizer, one sample per call

use tracing::{debug, trace};

use crate::error::{PipelineError, Result};
use crate::normalizer::Normalizer;
use crate::source::{Estimator, FrameSource, Smoother};
use crate::GazeSample;

/// Owns the collaborators of the producer path.
///
/// The smoother's state lives here and nowhere else; it advances once per
/// open-eye sample and is never reset while the producer is alive.
pub struct SampleProducer {
    source: Box<dyn FrameSource>,
    estimator: Box<dyn Estimator>,
    smoother: Box<dyn Smoother>,
    normalizer: Normalizer,
    frames: u64,
    blinks: u64,
}

impl SampleProducer {
    pub fn new(
        source: Box<dyn FrameSource>,
        estimator: Box<dyn Estimator>,
        smoother: Box<dyn Smoother>,
        normalizer: Normalizer,
    ) -> Self {
        Self {
            source,
            estimator,
            smoother,
            normalizer,
            frames: 0,
            blinks: 0,
        }
    }

    /// Produce the sample for the current tick.
    ///
    /// May block on frame capture or inference. Source exhaustion and
    /// estimator failures are returned as errors; a blink is a valid sample.
    pub fn produce(&mut self) -> Result<GazeSample> {
        let frame = self
            .source
            .next_frame()?
            .ok_or(PipelineError::SourceExhausted)?;
        self.frames += 1;

        let features = match self.estimator.extract(&frame)?.usable() {
            Some(features) => features,
            None => {
                self.blinks += 1;
                trace!(frame = frame.sequence, "Blink");
                return Ok(GazeSample::blink());
            }
        };

        let (raw_x, raw_y) = self.estimator.predict(&features)?;
        let (px, py) = self.smoother.filter(raw_x, raw_y);
        let (x, y) = self.normalizer.normalize(px, py);
        trace!(frame = frame.sequence, "Gaze: ({:.0}, {:.0})", px, py);

        Ok(GazeSample::at(x, y))
    }

    /// Frames consumed so far
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Frames that produced a blink sample
    pub fn blinks(&self) -> u64 {
        self.blinks
    }
}

impl Drop for SampleProducer {
    fn drop(&mut self) {
        debug!(frames = self.frames, blinks = self.blinks, "Sample producer released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalizer::ScreenSize;
    use crate::source::{Extraction, Features, Frame};
    use approx::assert_relative_eq;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct ScriptedSource {
        remaining: u64,
        next: u64,
    }

    impl FrameSource for ScriptedSource {
        fn next_frame(&mut self) -> Result<Option<Frame>> {
            if self.remaining == 0 {
                return Ok(None);
            }
            self.remaining -= 1;
            let frame = Frame {
                sequence: self.next,
                ..Frame::default()
            };
            self.next += 1;
            Ok(Some(frame))
        }
    }

    /// Replays a fixed script of extractions; each open eye predicts (px, py).
    struct ScriptedEstimator {
        script: VecDeque<Option<(f64, f64)>>,
        predictions: Arc<AtomicUsize>,
    }

    impl Estimator for ScriptedEstimator {
        fn extract(&mut self, _frame: &Frame) -> Result<Extraction> {
            match self.script.pop_front() {
                Some(Some((x, y))) => Ok(Extraction::open(Features(vec![x, y]))),
                Some(None) => Ok(Extraction::closed()),
                None => Err(PipelineError::estimator("script exhausted")),
            }
        }

        fn predict(&mut self, features: &Features) -> Result<(f64, f64)> {
            self.predictions.fetch_add(1, Ordering::SeqCst);
            Ok((features.0[0], features.0[1]))
        }
    }

    struct CountingSmoother {
        calls: Arc<AtomicUsize>,
    }

    impl Smoother for CountingSmoother {
        fn filter(&mut self, x: f64, y: f64) -> (f64, f64) {
            self.calls.fetch_add(1, Ordering::SeqCst);
            (x, y)
        }
    }

    fn producer(
        frames: u64,
        script: Vec<Option<(f64, f64)>>,
    ) -> (SampleProducer, Arc<AtomicUsize>, Arc<AtomicUsize>) {
        let predictions = Arc::new(AtomicUsize::new(0));
        let smoothed = Arc::new(AtomicUsize::new(0));
        let producer = SampleProducer::new(
            Box::new(ScriptedSource { remaining: frames, next: 0 }),
            Box::new(ScriptedEstimator {
                script: script.into(),
                predictions: predictions.clone(),
            }),
            Box::new(CountingSmoother { calls: smoothed.clone() }),
            Normalizer::new(ScreenSize { width: 1000, height: 500 }).unwrap(),
        );
        (producer, predictions, smoothed)
    }

    #[test]
    fn test_open_eye_is_normalized() {
        let (mut p, _, _) = producer(1, vec![Some((250.0, 500.0))]);
        let sample = p.produce().unwrap();
        assert!(!sample.blink);
        assert_relative_eq!(sample.x, 0.25);
        assert_relative_eq!(sample.y, 1.0);
    }

    #[test]
    fn test_blink_skips_prediction_and_smoothing() {
        let (mut p, predictions, smoothed) = producer(3, vec![Some((1.0, 1.0)), None, Some((2.0, 2.0))]);

        p.produce().unwrap();
        let blink = p.produce().unwrap();
        assert_eq!(blink, GazeSample::blink());
        assert_eq!(predictions.load(Ordering::SeqCst), 1);
        assert_eq!(smoothed.load(Ordering::SeqCst), 1);

        p.produce().unwrap();
        assert_eq!(smoothed.load(Ordering::SeqCst), 2);
        assert_eq!(p.frames(), 3);
        assert_eq!(p.blinks(), 1);
    }

    #[test]
    fn test_exhausted_source_is_fatal() {
        let (mut p, _, _) = producer(1, vec![Some((1.0, 1.0)), Some((1.0, 1.0))]);
        p.produce().unwrap();
        assert!(matches!(p.produce(), Err(PipelineError::SourceExhausted)));
        assert_eq!(p.frames(), 1);
    }

    #[test]
    fn test_estimator_failure_propagates() {
        let (mut p, _, _) = producer(5, vec![]);
        assert!(matches!(p.produce(), Err(PipelineError::Estimator(_))));
    }
}
