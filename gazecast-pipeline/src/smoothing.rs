//! Reference smoothers for raw gaze predictions

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::PipelineError;
use crate::source::Smoother;

/// Default process noise variance (per state component, per tick)
pub const KALMAN_PROCESS_VAR: f64 = 50.0;

/// Default measurement noise variance
pub const KALMAN_MEASUREMENT_VAR: f64 = 0.2;

/// Smoother selection as it appears in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SmootherKind {
    #[default]
    Kalman,
    Ema,
    None,
}

impl SmootherKind {
    /// Build a fresh smoother of this kind. `ema_alpha` only applies to `Ema`.
    pub fn build(self, ema_alpha: f64) -> Box<dyn Smoother> {
        match self {
            Self::Kalman => Box::new(KalmanSmoother::default()),
            Self::Ema => Box::new(EmaSmoother::new(ema_alpha)),
            Self::None => Box::new(NoSmoothing),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Kalman => "kalman",
            Self::Ema => "ema",
            Self::None => "none",
        }
    }
}

impl fmt::Display for SmootherKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SmootherKind {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "kalman" => Ok(Self::Kalman),
            "ema" => Ok(Self::Ema),
            "none" | "off" => Ok(Self::None),
            other => Err(PipelineError::invalid_config(format!(
                "unknown smoother '{}' (expected kalman, ema or none)",
                other
            ))),
        }
    }
}

/// Constant-velocity Kalman filter over screen pixels.
///
/// State is (x, y, vx, vy) with a one-tick time step. Process and measurement
/// covariances are diagonal and the initial covariance is the identity, so the
/// two axes never couple and each runs as an independent position/velocity
/// filter.
#[derive(Debug, Clone)]
pub struct KalmanSmoother {
    x: AxisFilter,
    y: AxisFilter,
    initialized: bool,
}

impl KalmanSmoother {
    pub fn new(process_var: f64, measurement_var: f64) -> Self {
        Self {
            x: AxisFilter::new(process_var, measurement_var),
            y: AxisFilter::new(process_var, measurement_var),
            initialized: false,
        }
    }
}

impl Default for KalmanSmoother {
    fn default() -> Self {
        Self::new(KALMAN_PROCESS_VAR, KALMAN_MEASUREMENT_VAR)
    }
}

impl Smoother for KalmanSmoother {
    fn filter(&mut self, x: f64, y: f64) -> (f64, f64) {
        // Seed from the first measurement rather than pulling it towards (0, 0)
        if !self.initialized {
            self.x.seed(x);
            self.y.seed(y);
            self.initialized = true;
            return (x, y);
        }

        (self.x.step(x), self.y.step(y))
    }
}

/// One axis of the constant-velocity filter: state [position, velocity].
#[derive(Debug, Clone)]
struct AxisFilter {
    pos: f64,
    vel: f64,
    // Covariance [[p00, p01], [p01, p11]]
    p00: f64,
    p01: f64,
    p11: f64,
    q: f64,
    r: f64,
}

impl AxisFilter {
    fn new(process_var: f64, measurement_var: f64) -> Self {
        Self {
            pos: 0.0,
            vel: 0.0,
            p00: 1.0,
            p01: 0.0,
            p11: 1.0,
            q: process_var,
            r: measurement_var,
        }
    }

    fn seed(&mut self, pos: f64) {
        self.pos = pos;
        self.vel = 0.0;
    }

    fn step(&mut self, measured: f64) -> f64 {
        // Predict: F = [[1, 1], [0, 1]], P = F P Fᵀ + Q
        self.pos += self.vel;
        let p00 = self.p00 + 2.0 * self.p01 + self.p11 + self.q;
        let p01 = self.p01 + self.p11;
        let p11 = self.p11 + self.q;

        // Correct: H = [1, 0]
        let s = p00 + self.r;
        let k0 = p00 / s;
        let k1 = p01 / s;
        let innovation = measured - self.pos;

        self.pos += k0 * innovation;
        self.vel += k1 * innovation;

        self.p00 = (1.0 - k0) * p00;
        self.p01 = (1.0 - k0) * p01;
        self.p11 = p11 - k1 * p01;

        self.pos
    }
}

/// Exponential moving average.
#[derive(Debug, Clone)]
pub struct EmaSmoother {
    /// 0 = maximum smoothing, 1 = no smoothing
    alpha: f64,
    last: Option<(f64, f64)>,
}

impl EmaSmoother {
    pub fn new(alpha: f64) -> Self {
        Self {
            alpha: alpha.clamp(0.0, 1.0),
            last: None,
        }
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }
}

impl Smoother for EmaSmoother {
    fn filter(&mut self, x: f64, y: f64) -> (f64, f64) {
        let next = match self.last {
            Some((lx, ly)) => (lx + self.alpha * (x - lx), ly + self.alpha * (y - ly)),
            None => (x, y),
        };
        self.last = Some(next);
        next
    }
}

/// Identity filter.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSmoothing;

impl Smoother for NoSmoothing {
    fn filter(&mut self, x: f64, y: f64) -> (f64, f64) {
        (x, y)
    }
}
