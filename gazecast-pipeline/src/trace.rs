//! Replay of recorded gaze traces
//!
//! A trace is newline-delimited JSON, one frame per line, in screen pixels:
//!
//! ```text
//! {"x": 812.0, "y": 430.5}
//! {"blink": true}
//! ```
//!
//! Blank lines are skipped. End of file exhausts the source.

use serde::Deserialize;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::error::{PipelineError, Result};
use crate::source::{Estimator, Extraction, Features, Frame, FrameSource};

/// Frames read line by line from a trace.
pub struct TraceSource {
    reader: Box<dyn BufRead + Send>,
    next: u64,
    line: String,
}

impl TraceSource {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            PipelineError::source(format!("cannot open trace {}: {}", path.display(), e))
        })?;
        Ok(Self::from_reader(BufReader::new(file)))
    }

    pub fn from_reader<R: BufRead + Send + 'static>(reader: R) -> Self {
        Self {
            reader: Box::new(reader),
            next: 0,
            line: String::new(),
        }
    }
}

impl FrameSource for TraceSource {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        loop {
            self.line.clear();
            if self.reader.read_line(&mut self.line)? == 0 {
                return Ok(None);
            }

            let record = self.line.trim();
            if record.is_empty() {
                continue;
            }

            let frame = Frame {
                sequence: self.next,
                width: 0,
                height: 0,
                data: record.as_bytes().to_vec(),
            };
            self.next += 1;
            return Ok(Some(frame));
        }
    }
}

#[derive(Debug, Deserialize)]
struct TraceRecord {
    x: Option<f64>,
    y: Option<f64>,
    #[serde(default)]
    blink: bool,
}

/// Decodes trace frames; the recorded point is both feature and prediction.
#[derive(Debug, Clone, Copy, Default)]
pub struct TraceEstimator;

impl Estimator for TraceEstimator {
    fn extract(&mut self, frame: &Frame) -> Result<Extraction> {
        let record: TraceRecord = serde_json::from_slice(&frame.data).map_err(|e| {
            PipelineError::estimator(format!("malformed trace frame {}: {}", frame.sequence, e))
        })?;

        match (record.blink, record.x, record.y) {
            (false, Some(x), Some(y)) => Ok(Extraction::open(Features(vec![x, y]))),
            _ => Ok(Extraction::closed()),
        }
    }

    fn predict(&mut self, features: &Features) -> Result<(f64, f64)> {
        match features.as_slice() {
            [x, y, ..] => Ok((*x, *y)),
            other => Err(PipelineError::estimator(format!(
                "trace features need 2 values, got {}",
                other.len()
            ))),
        }
    }
}
