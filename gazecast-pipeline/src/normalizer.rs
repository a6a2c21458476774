//! Pixel to screen-fraction mapping

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

/// Screen dimensions in pixels used as normalization denominators.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScreenSize {
    pub width: u32,
    pub height: u32,
}

impl Default for ScreenSize {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Normalizer {
    width: f64,
    height: f64,
}

impl Normalizer {
    pub fn new(screen: ScreenSize) -> Result<Self> {
        if screen.width == 0 || screen.height == 0 {
            return Err(PipelineError::invalid_config(format!(
                "screen dimensions must be non-zero, got {}x{}",
                screen.width, screen.height
            )));
        }

        Ok(Self {
            width: f64::from(screen.width),
            height: f64::from(screen.height),
        })
    }

    /// Map filtered pixel coordinates to fractions of the screen. No clamping.
    pub fn normalize(&self, x: f64, y: f64) -> (f64, f64) {
        (x / self.width, y / self.height)
    }
}
