//! Collaborator seams: frame acquisition, gaze estimation and smoothing

use crate::error::Result;

/// One raw sensor frame.
#[derive(Debug, Clone, Default)]
pub struct Frame {
    /// Monotonic frame counter assigned by the source, starting at 0
    pub sequence: u64,
    pub width: u32,
    pub height: u32,
    /// Source-specific payload (pixels for a camera, a record for replay)
    pub data: Vec<u8>,
}

/// Feature vector extracted from a frame.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Features(pub Vec<f64>);

impl Features {
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }
}

/// Result of feature extraction for one frame.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Extraction {
    /// `None` when no eye could be located in the frame
    pub features: Option<Features>,
    pub blink: bool,
}

impl Extraction {
    pub fn open(features: Features) -> Self {
        Self {
            features: Some(features),
            blink: false,
        }
    }

    pub fn closed() -> Self {
        Self {
            features: None,
            blink: true,
        }
    }

    /// Features usable for prediction, if this frame has any.
    pub fn usable(self) -> Option<Features> {
        if self.blink {
            None
        } else {
            self.features
        }
    }
}

/// Yields sensor frames on demand.
///
/// `Ok(None)` means the source is exhausted; the stream cannot continue
/// without frames.
pub trait FrameSource: Send {
    fn next_frame(&mut self) -> Result<Option<Frame>>;
}

/// Model-backed gaze estimation.
pub trait Estimator: Send {
    fn extract(&mut self, frame: &Frame) -> Result<Extraction>;

    /// Raw gaze prediction in screen pixels.
    fn predict(&mut self, features: &Features) -> Result<(f64, f64)>;
}

/// Stateful temporal filter over raw predictions (screen pixels in and out).
pub trait Smoother: Send {
    fn filter(&mut self, x: f64, y: f64) -> (f64, f64);
}

impl<T: FrameSource + ?Sized> FrameSource for Box<T> {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        (**self).next_frame()
    }
}

impl<T: Estimator + ?Sized> Estimator for Box<T> {
    fn extract(&mut self, frame: &Frame) -> Result<Extraction> {
        (**self).extract(frame)
    }

    fn predict(&mut self, features: &Features) -> Result<(f64, f64)> {
        (**self).predict(features)
    }
}

impl<T: Smoother + ?Sized> Smoother for Box<T> {
    fn filter(&mut self, x: f64, y: f64) -> (f64, f64) {
        (**self).filter(x, y)
    }
}
