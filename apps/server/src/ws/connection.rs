//! WebSocket connection registry
//!
//! Tracks every open socket and implements the relay's server transport on
//! top of them. Each connection owns an unbounded channel drained by its
//! socket's send task, so emitting never waits on the network.

use dashmap::DashMap;
use serde_json::Value;
use socket_relay::transport::{
    ConnectionListener, Listener, ListenerRegistry, ServerConnection, ServerTransport,
    DISCONNECT_EVENT,
};
use socket_relay::TransportError;
use std::sync::{Arc, RwLock, Weak};
use tokio::sync::mpsc;
use uuid::Uuid;

use super::frame::Frame;

#[derive(Default)]
struct Registry {
    connections: DashMap<String, Arc<WsConnection>>,
    connection_listeners: RwLock<Vec<ConnectionListener<WsConnection>>>,
}

/// Handle for one open WebSocket
pub struct WsConnection {
    id: String,

    /// Channel drained by the socket's send task
    sender: mpsc::UnboundedSender<Frame>,

    /// Listeners for events sent by this connection's client
    listeners: ListenerRegistry,

    /// When this connection was established (Unix timestamp ms)
    connected_at: i64,

    registry: Weak<Registry>,
}

impl WsConnection {
    pub fn connected_at(&self) -> i64 {
        self.connected_at
    }

    /// Check if the socket's send task is still running
    pub fn is_alive(&self) -> bool {
        !self.sender.is_closed()
    }

    /// Queue a frame for this connection
    pub fn send(&self, frame: Frame) -> Result<(), TransportError> {
        self.sender.send(frame).map_err(|_| TransportError::Closed)
    }
}

impl ServerConnection for WsConnection {
    fn id(&self) -> &str {
        &self.id
    }

    fn on(&self, event: &str, listener: Listener) {
        self.listeners.on(event, listener);
    }

    fn emit(&self, event: &str, payload: Value) -> Result<(), TransportError> {
        self.send(Frame::new(event, payload))
    }

    fn emit_to(&self, id: &str, event: &str, payload: Value) -> Result<(), TransportError> {
        let registry = self.registry.upgrade().ok_or(TransportError::Closed)?;
        let target = registry
            .connections
            .get(id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| TransportError::UnknownConnection(id.to_string()))?;
        target.send(Frame::new(event, payload))
    }
}

impl std::fmt::Debug for WsConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WsConnection")
            .field("id", &self.id)
            .field("connected_at", &self.connected_at)
            .field("alive", &self.is_alive())
            .finish()
    }
}

/// Manages all open WebSocket connections
///
/// Uses DashMap for concurrent access without explicit locking.
/// Wrapped in Arc for cheap cloning.
#[derive(Clone, Default)]
pub struct WsServer {
    registry: Arc<Registry>,
}

impl WsServer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new connection and run every connection listener on it
    pub fn register(&self, sender: mpsc::UnboundedSender<Frame>) -> Arc<WsConnection> {
        let connection = Arc::new(WsConnection {
            id: Uuid::new_v4().to_string(),
            sender,
            listeners: ListenerRegistry::new(),
            connected_at: chrono::Utc::now().timestamp_millis(),
            registry: Arc::downgrade(&self.registry),
        });

        self.registry
            .connections
            .insert(connection.id.clone(), Arc::clone(&connection));

        let listeners = self
            .registry
            .connection_listeners
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        for listener in listeners {
            listener(Arc::clone(&connection));
        }

        tracing::debug!(
            connection_id = %connection.id,
            total_connections = self.connection_count(),
            "Connection registered"
        );

        connection
    }

    /// Fire a frame received from a client on that connection's listeners
    ///
    /// Returns the number of listeners that ran; zero when the connection
    /// is unknown or nothing listens on the frame's event.
    pub fn deliver(&self, id: &str, frame: Frame) -> usize {
        let Some(connection) = self.connection(id) else {
            tracing::debug!(connection_id = %id, "Frame for unknown connection");
            return 0;
        };

        let fired = connection.listeners.fire(&frame.event, frame.data);
        if fired == 0 {
            tracing::trace!(connection_id = %id, event = %frame.event, "No listener for event");
        }
        fired
    }

    /// Remove a connection, firing its `disconnect` listeners first
    pub fn remove(&self, id: &str) -> Option<Arc<WsConnection>> {
        let (_, connection) = self.registry.connections.remove(id)?;

        connection.listeners.fire(DISCONNECT_EVENT, Value::Null);
        connection.listeners.clear();

        tracing::debug!(
            connection_id = %id,
            total_connections = self.connection_count(),
            "Connection removed"
        );

        Some(connection)
    }

    pub fn connection(&self, id: &str) -> Option<Arc<WsConnection>> {
        self.registry
            .connections
            .get(id)
            .map(|entry| Arc::clone(entry.value()))
    }

    pub fn connection_count(&self) -> usize {
        self.registry.connections.len()
    }

    pub fn connection_ids(&self) -> Vec<String> {
        self.registry
            .connections
            .iter()
            .map(|entry| entry.key().clone())
            .collect()
    }
}

impl ServerTransport for WsServer {
    type Connection = WsConnection;

    fn on_connection(&self, listener: ConnectionListener<WsConnection>) {
        self.registry
            .connection_listeners
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(listener);
    }

    fn emit_all(&self, event: &str, payload: Value) -> usize {
        let connections: Vec<Arc<WsConnection>> = self
            .registry
            .connections
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();

        connections
            .iter()
            .filter(|connection| {
                connection
                    .send(Frame::new(event, payload.clone()))
                    .is_ok()
            })
            .count()
    }
}

impl std::fmt::Debug for WsServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WsServer")
            .field("connections", &self.connection_count())
            .finish()
    }
}
