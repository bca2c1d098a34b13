//! Transport capabilities the relays are written against
//!
//! The relays never open sockets themselves. Connection establishment,
//! reconnection and framing belong to whatever implements these traits:
//!
//! - [`ClientTransport`]: one client socket (`on`, `once`, `emit`)
//! - [`ServerTransport`]: the listening side (`on_connection`, `emit_all`)
//! - [`ServerConnection`]: one accepted connection (`on`, `emit`, `emit_to`)
//!
//! Payloads are already-deserialized JSON values.

mod listeners;
pub mod memory;

pub use listeners::{Listener, ListenerRegistry};

use serde_json::Value;
use std::sync::Arc;

use crate::error::TransportError;

/// Event name fired on a server connection when it closes
pub const DISCONNECT_EVENT: &str = "disconnect";

/// Client side of a socket
pub trait ClientTransport: Send + Sync {
    /// Register a listener for every firing of `event`
    fn on(&self, event: &str, listener: Listener);

    /// Register a listener for the next firing of `event` only
    fn once(&self, event: &str, listener: Listener);

    /// Send a payload to the server on `event`
    fn emit(&self, event: &str, payload: Value) -> Result<(), TransportError>;
}

/// One accepted connection on the server side
pub trait ServerConnection: Send + Sync {
    /// Transport-assigned connection id
    fn id(&self) -> &str;

    /// Register a listener for events sent by this connection's client
    fn on(&self, event: &str, listener: Listener);

    /// Send a payload to this connection's client
    fn emit(&self, event: &str, payload: Value) -> Result<(), TransportError>;

    /// Send a payload to another connection by id
    fn emit_to(&self, id: &str, event: &str, payload: Value) -> Result<(), TransportError>;
}

/// Callback invoked once per accepted connection
pub type ConnectionListener<C> = Arc<dyn Fn(Arc<C>) + Send + Sync>;

/// Listening side of a socket server
pub trait ServerTransport: Send + Sync {
    type Connection: ServerConnection + 'static;

    /// Register a listener for new connections
    fn on_connection(&self, listener: ConnectionListener<Self::Connection>);

    /// Send a payload to every connected client
    ///
    /// Returns the number of connections the payload was handed to.
    fn emit_all(&self, event: &str, payload: Value) -> usize;
}
