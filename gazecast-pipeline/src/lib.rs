//! Gazecast sample pipeline
//!
//! Turns raw sensor frames into screen-normalized gaze samples, one per tick.
//!
//! ## Architecture
//!
//! ```text
//! FrameSource (camera / synthetic / trace replay)
//!   │
//!   ├─> Estimator::extract  -> features + blink flag
//!   │     │
//!   │     └─> blink or no features ──> GazeSample { 0, 0, blink: true }
//!   │
//!   ├─> Estimator::predict  -> raw pixel (x, y)
//!   ├─> Smoother::filter    -> filtered pixel (x, y)
//!   └─> Normalizer          -> GazeSample { x / width, y / height }
//! ```
//!
//! The camera and the gaze model live outside this crate; they plug in through
//! the [`FrameSource`] and [`Estimator`] traits. The synthetic and trace
//! collaborators are enough to run the whole stream without hardware.

pub mod error;
pub mod normalizer;
pub mod producer;
pub mod smoothing;
pub mod source;
pub mod synthetic;
pub mod trace;

pub use error::{PipelineError, Result};
pub use normalizer::{Normalizer, ScreenSize};
pub use producer::SampleProducer;
pub use smoothing::{EmaSmoother, KalmanSmoother, NoSmoothing, SmootherKind};
pub use source::{Estimator, Extraction, Features, Frame, FrameSource, Smoother};
pub use synthetic::{SyntheticEstimator, SyntheticSource};
pub use trace::{TraceEstimator, TraceSource};

use serde::{Deserialize, Serialize};

/// One tick's gaze reading, normalized to the screen.
///
/// `x` and `y` are fractions of the screen width and height. They are not
/// clamped, so gaze that leaves the screen produces values outside `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GazeSample {
    pub x: f64,
    pub y: f64,
    pub blink: bool,
}

impl GazeSample {
    /// Sample for a tick without a usable prediction.
    pub const fn blink() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            blink: true,
        }
    }

    pub const fn at(x: f64, y: f64) -> Self {
        Self { x, y, blink: false }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blink_sample_is_zeroed() {
        let sample = GazeSample::blink();
        assert!(sample.blink);
        assert_eq!(sample.x, 0.0);
        assert_eq!(sample.y, 0.0);
    }

    #[test]
    fn test_sample_serializes_three_fields() {
        let json = serde_json::to_value(GazeSample::at(0.25, 1.5)).unwrap();
        let obj = json.as_object().unwrap();
        assert_eq!(obj.len(), 3);
        assert_eq!(obj["x"], 0.25);
        assert_eq!(obj["y"], 1.5);
        assert_eq!(obj["blink"], false);
    }
}
