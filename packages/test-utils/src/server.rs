//! Mock server transport
//!
//! Provides a [`MockServer`] where tests accept connections by hand and fire
//! client events synchronously. Every emit is recorded per recipient.

use serde_json::Value;
use socket_relay::transport::{
    ConnectionListener, Listener, ListenerRegistry, ServerConnection, ServerTransport,
};
use socket_relay::TransportError;
use std::collections::HashMap;
use std::sync::{Arc, RwLock, Weak};

#[derive(Default)]
struct ServerState {
    connections: RwLock<HashMap<String, Arc<MockConnection>>>,
    connection_listeners: RwLock<Vec<ConnectionListener<MockConnection>>>,
    broadcasts: RwLock<Vec<(String, Value)>>,
}

/// Recording server transport
#[derive(Clone, Default)]
pub struct MockServer {
    state: Arc<ServerState>,
}

impl MockServer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept a connection and run every connection listener on it
    pub fn accept(&self, id: &str) -> Arc<MockConnection> {
        let connection = Arc::new(MockConnection {
            id: id.to_string(),
            listeners: ListenerRegistry::new(),
            received: RwLock::new(Vec::new()),
            server: Arc::downgrade(&self.state),
        });

        self.state
            .connections
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id.to_string(), Arc::clone(&connection));

        let listeners = self
            .state
            .connection_listeners
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        for listener in listeners {
            listener(Arc::clone(&connection));
        }

        connection
    }

    pub fn connection(&self, id: &str) -> Option<Arc<MockConnection>> {
        self.state
            .connections
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(id)
            .cloned()
    }

    /// Every `(event, payload)` passed to `emit_all`, in order
    pub fn broadcasts(&self) -> Vec<(String, Value)> {
        self.state
            .broadcasts
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl ServerTransport for MockServer {
    type Connection = MockConnection;

    fn on_connection(&self, listener: ConnectionListener<MockConnection>) {
        self.state
            .connection_listeners
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(listener);
    }

    fn emit_all(&self, event: &str, payload: Value) -> usize {
        self.state
            .broadcasts
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push((event.to_string(), payload.clone()));

        let connections: Vec<Arc<MockConnection>> = self
            .state
            .connections
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .cloned()
            .collect();
        for connection in &connections {
            connection.record(event, payload.clone());
        }
        connections.len()
    }
}

/// Connection accepted by a [`MockServer`]
pub struct MockConnection {
    id: String,
    listeners: ListenerRegistry,
    received: RwLock<Vec<(String, Value)>>,
    server: Weak<ServerState>,
}

impl MockConnection {
    /// Fire an event as if this connection's client had sent it
    pub fn fire(&self, event: &str, payload: Value) -> usize {
        self.listeners.fire(event, payload)
    }

    pub fn listener_count(&self, event: &str) -> usize {
        self.listeners.listener_count(event)
    }

    /// Every `(event, payload)` delivered to this connection's client
    pub fn received(&self) -> Vec<(String, Value)> {
        self.received
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn record(&self, event: &str, payload: Value) {
        self.received
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push((event.to_string(), payload));
    }
}

impl ServerConnection for MockConnection {
    fn id(&self) -> &str {
        &self.id
    }

    fn on(&self, event: &str, listener: Listener) {
        self.listeners.on(event, listener);
    }

    fn emit(&self, event: &str, payload: Value) -> Result<(), TransportError> {
        self.record(event, payload);
        Ok(())
    }

    fn emit_to(&self, id: &str, event: &str, payload: Value) -> Result<(), TransportError> {
        let server = self.server.upgrade().ok_or(TransportError::Closed)?;
        let target = server
            .connections
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(id)
            .cloned()
            .ok_or_else(|| TransportError::UnknownConnection(id.to_string()))?;
        target.record(event, payload);
        Ok(())
    }
}
