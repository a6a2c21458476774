use gazecast_pipeline::GazeSample;
use serde::{Deserialize, Serialize};
use tokio_tungstenite::tungstenite::Message;

/// Per-tick message sent to every subscriber.
///
/// Exactly three fields on the wire: `x`, `y`, `blink`.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct GazeMessage {
    pub x: f64,
    pub y: f64,
    pub blink: bool,
}

impl From<GazeSample> for GazeMessage {
    fn from(sample: GazeSample) -> Self {
        Self {
            x: sample.x,
            y: sample.y,
            blink: sample.blink,
        }
    }
}

impl GazeMessage {
    /// Encode as a JSON object
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Encode as a WebSocket text frame
    pub fn to_ws_message(&self) -> Result<Message, serde_json::Error> {
        Ok(Message::text(self.to_json()?))
    }

    /// Decode a received payload (subscriber side)
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}
