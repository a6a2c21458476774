//! Synthetic gaze for running the stream without a camera or model
//!
//! The estimator sweeps a 3:2 Lissajous figure across the screen in pixel
//! space, which exercises the smoother and normalizer like real predictions
//! would, and can inject periodic blinks.

use std::f64::consts::{FRAC_PI_2, TAU};

use crate::error::Result;
use crate::normalizer::ScreenSize;
use crate::source::{Estimator, Extraction, Features, Frame, FrameSource};

/// Frames for one full sweep of the figure (10 s at 60 Hz)
pub const DEFAULT_PERIOD_FRAMES: u64 = 600;

/// Fraction of the half-screen covered by the sweep
const AMPLITUDE: f64 = 0.8;

/// Empty frames, numbered in order. Endless unless a limit is set.
#[derive(Debug, Clone, Default)]
pub struct SyntheticSource {
    next: u64,
    limit: Option<u64>,
}

impl SyntheticSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Source that is exhausted after `frames` frames
    pub fn with_limit(frames: u64) -> Self {
        Self {
            next: 0,
            limit: Some(frames),
        }
    }
}

impl FrameSource for SyntheticSource {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        if self.limit.is_some_and(|limit| self.next >= limit) {
            return Ok(None);
        }

        let frame = Frame {
            sequence: self.next,
            ..Frame::default()
        };
        self.next += 1;
        Ok(Some(frame))
    }
}

#[derive(Debug, Clone)]
pub struct SyntheticEstimator {
    screen: ScreenSize,
    blink_every: u64,
    period_frames: u64,
}

impl SyntheticEstimator {
    pub fn new(screen: ScreenSize) -> Self {
        Self {
            screen,
            blink_every: 0,
            period_frames: DEFAULT_PERIOD_FRAMES,
        }
    }

    /// Report a blink on every `n`th frame (0 disables blinks)
    pub fn blink_every(mut self, n: u64) -> Self {
        self.blink_every = n;
        self
    }

    pub fn period_frames(mut self, frames: u64) -> Self {
        self.period_frames = frames.max(1);
        self
    }

    fn is_blink(&self, sequence: u64) -> bool {
        self.blink_every > 0 && sequence % self.blink_every == self.blink_every - 1
    }
}

impl Estimator for SyntheticEstimator {
    fn extract(&mut self, frame: &Frame) -> Result<Extraction> {
        if self.is_blink(frame.sequence) {
            return Ok(Extraction::closed());
        }

        let phase = (frame.sequence % self.period_frames) as f64 / self.period_frames as f64;
        Ok(Extraction::open(Features(vec![phase * TAU])))
    }

    fn predict(&mut self, features: &Features) -> Result<(f64, f64)> {
        let theta = features.as_slice().first().copied().unwrap_or_default();
        let half_w = f64::from(self.screen.width) / 2.0;
        let half_h = f64::from(self.screen.height) / 2.0;

        let x = half_w + AMPLITUDE * half_w * (3.0 * theta).sin();
        let y = half_h + AMPLITUDE * half_h * (2.0 * theta + FRAC_PI_2).sin();
        Ok((x, y))
    }
}
