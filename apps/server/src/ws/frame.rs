//! Wire format for WebSocket text frames
//!
//! Every text frame carries one JSON object naming a transport event and its
//! payload, e.g. `{"event": "@@socket-relay/DISPATCH_ACTION", "data": {...}}`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Event sent to a client right after the upgrade completes
pub const CONNECT_EVENT: &str = "connect";

/// Event sent to a client when one of its frames could not be parsed
pub const ERROR_EVENT: &str = "error";

/// One transport event on the wire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub event: String,

    #[serde(default)]
    pub data: Value,
}

impl Frame {
    pub fn new(event: impl Into<String>, data: Value) -> Self {
        Self {
            event: event.into(),
            data,
        }
    }

    /// Frame telling the client which connection id it was given
    pub fn connected(id: &str) -> Self {
        Self::new(CONNECT_EVENT, serde_json::json!({ "id": id }))
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(ERROR_EVENT, serde_json::json!({ "message": message.into() }))
    }

    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn to_text(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
