//! Relay configuration
//!
//! Options are plain values resolved once when a relay is constructed.
//! Each relay owns its own copy; nothing is shared between instances.

use crate::action::DispatchedBy;
use crate::action_types::DISPATCH_EVENT;

/// Client relay configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientOptions {
    /// Channel used for envelope traffic (default: [`DISPATCH_EVENT`])
    pub event_name: String,

    /// Provenance stamp written on emitted actions (default: client)
    pub dispatched_by: DispatchedBy,

    /// Emit every local action whose `meta.emit` is absent (default: false)
    pub emit_all: bool,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            event_name: DISPATCH_EVENT.to_string(),
            dispatched_by: DispatchedBy::Client,
            emit_all: false,
        }
    }
}

impl ClientOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_event_name(mut self, event_name: impl Into<String>) -> Self {
        self.event_name = event_name.into();
        self
    }

    pub fn with_emit_all(mut self, emit_all: bool) -> Self {
        self.emit_all = emit_all;
        self
    }

    pub fn with_dispatched_by(mut self, tag: DispatchedBy) -> Self {
        self.dispatched_by = tag;
        self
    }
}

/// Server relay configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerOptions {
    /// Channel used for envelope traffic (default: [`DISPATCH_EVENT`])
    pub event_name: String,

    /// Provenance stamp written on dispatched actions (default: server)
    pub dispatched_by: DispatchedBy,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            event_name: DISPATCH_EVENT.to_string(),
            dispatched_by: DispatchedBy::Server,
        }
    }
}

impl ServerOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_event_name(mut self, event_name: impl Into<String>) -> Self {
        self.event_name = event_name.into();
        self
    }

    pub fn with_dispatched_by(mut self, tag: DispatchedBy) -> Self {
        self.dispatched_by = tag;
        self
    }
}
