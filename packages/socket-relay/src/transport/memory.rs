//! In-process transport backed by tokio channels
//!
//! Useful for tests and for wiring relays together inside one process.
//! Frames are queued on unbounded channels and only delivered when the
//! receiving side is pumped, so a listener never runs inside the `emit`
//! call that produced its frame. That keeps stores from being re-entered
//! while a reducer is still running.
//!
//! ```rust
//! use socket_relay::transport::memory::{settle, MemoryServer};
//!
//! let server = MemoryServer::new();
//! let client = server.connect();
//! settle(&server, &[client]);
//! assert_eq!(server.connection_count(), 1);
//! ```

use dashmap::DashMap;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock, Weak};
use tokio::sync::mpsc;
use uuid::Uuid;

use super::{
    ClientTransport, ConnectionListener, Listener, ListenerRegistry, ServerConnection,
    ServerTransport, DISCONNECT_EVENT,
};
use crate::action_types::LifecycleEvent;
use crate::error::TransportError;

/// Upper bound on pump rounds in [`settle`]
const MAX_SETTLE_ROUNDS: usize = 1024;

/// Event name and payload queued for delivery
#[derive(Debug, Clone)]
struct Frame {
    event: String,
    payload: Value,
}

/// Work queued for the server side
enum ServerFrame {
    Connected(Arc<MemoryConnection>),
    Event { from: String, frame: Frame },
    Disconnected(String),
}

struct ServerShared {
    connections: DashMap<String, Arc<MemoryConnection>>,
    connection_listeners: RwLock<Vec<ConnectionListener<MemoryConnection>>>,
    inbox_tx: mpsc::UnboundedSender<ServerFrame>,
}

/// Server half of the in-process transport
///
/// Cloning is cheap; all clones share the same connections.
#[derive(Clone)]
pub struct MemoryServer {
    shared: Arc<ServerShared>,
    inbox: Arc<Mutex<mpsc::UnboundedReceiver<ServerFrame>>>,
}

impl MemoryServer {
    pub fn new() -> Self {
        let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();
        Self {
            shared: Arc::new(ServerShared {
                connections: DashMap::new(),
                connection_listeners: RwLock::new(Vec::new()),
                inbox_tx,
            }),
            inbox: Arc::new(Mutex::new(inbox_rx)),
        }
    }

    /// Open a new client connection
    ///
    /// The server sees the connection on its next [`pump`](Self::pump); the
    /// client gets a queued `connect` event.
    pub fn connect(&self) -> Arc<MemoryClient> {
        let id = Uuid::new_v4().to_string();
        let (client_tx, client_rx) = mpsc::unbounded_channel();

        let connection = Arc::new(MemoryConnection {
            id: id.clone(),
            listeners: ListenerRegistry::new(),
            outbox: client_tx.clone(),
            connected_at: chrono::Utc::now().timestamp_millis(),
            server: Arc::downgrade(&self.shared),
        });

        let client = Arc::new(MemoryClient {
            id,
            listeners: ListenerRegistry::new(),
            inbox_tx: client_tx,
            inbox: Mutex::new(client_rx),
            server_tx: self.shared.inbox_tx.clone(),
            connected: AtomicBool::new(true),
        });

        // The server owns the receiving half, so these cannot fail here
        let _ = self.shared.inbox_tx.send(ServerFrame::Connected(connection));
        client.notify(LifecycleEvent::Connect.event_name(), Value::Null);

        client
    }

    /// Deliver every queued frame, returning how many were processed
    pub fn pump(&self) -> usize {
        let mut processed = 0;

        loop {
            let frame = {
                let mut inbox = self.inbox.lock().unwrap_or_else(|e| e.into_inner());
                match inbox.try_recv() {
                    Ok(frame) => frame,
                    Err(_) => break,
                }
            };
            processed += 1;

            match frame {
                ServerFrame::Connected(connection) => {
                    self.shared
                        .connections
                        .insert(connection.id.clone(), Arc::clone(&connection));

                    tracing::debug!(
                        connection_id = %connection.id,
                        connection_count = self.shared.connections.len(),
                        "Connection added"
                    );

                    let listeners = self
                        .shared
                        .connection_listeners
                        .read()
                        .unwrap_or_else(|e| e.into_inner())
                        .clone();
                    for listener in listeners {
                        listener(Arc::clone(&connection));
                    }
                }
                ServerFrame::Event { from, frame } => {
                    let connection = self.shared.connections.get(&from).map(|c| Arc::clone(&c));
                    match connection {
                        Some(connection) => {
                            connection.listeners.fire(&frame.event, frame.payload);
                        }
                        None => {
                            tracing::debug!(
                                connection_id = %from,
                                event = %frame.event,
                                "Dropping event from unknown connection"
                            );
                        }
                    }
                }
                ServerFrame::Disconnected(id) => {
                    if let Some((_, connection)) = self.shared.connections.remove(&id) {
                        connection.listeners.fire(DISCONNECT_EVENT, Value::Null);
                        connection.listeners.clear();

                        tracing::debug!(connection_id = %id, "Connection removed");
                    }
                }
            }
        }

        processed
    }

    pub fn connection_count(&self) -> usize {
        self.shared.connections.len()
    }

    pub fn connection_ids(&self) -> Vec<String> {
        self.shared
            .connections
            .iter()
            .map(|entry| entry.key().clone())
            .collect()
    }

    pub fn connection(&self, id: &str) -> Option<Arc<MemoryConnection>> {
        self.shared.connections.get(id).map(|c| Arc::clone(&c))
    }
}

impl Default for MemoryServer {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerTransport for MemoryServer {
    type Connection = MemoryConnection;

    fn on_connection(&self, listener: ConnectionListener<MemoryConnection>) {
        self.shared
            .connection_listeners
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(listener);
    }

    fn emit_all(&self, event: &str, payload: Value) -> usize {
        let mut sent = 0;
        for entry in self.shared.connections.iter() {
            if entry.value().emit(event, payload.clone()).is_ok() {
                sent += 1;
            }
        }
        sent
    }
}

/// Server-side view of one client
pub struct MemoryConnection {
    id: String,
    listeners: ListenerRegistry,
    outbox: mpsc::UnboundedSender<Frame>,
    connected_at: i64,
    server: Weak<ServerShared>,
}

impl MemoryConnection {
    /// When this connection was accepted (Unix timestamp ms)
    pub fn connected_at(&self) -> i64 {
        self.connected_at
    }

    pub fn is_alive(&self) -> bool {
        !self.outbox.is_closed()
    }
}

impl ServerConnection for MemoryConnection {
    fn id(&self) -> &str {
        &self.id
    }

    fn on(&self, event: &str, listener: Listener) {
        self.listeners.on(event, listener);
    }

    fn emit(&self, event: &str, payload: Value) -> Result<(), TransportError> {
        self.outbox
            .send(Frame {
                event: event.to_string(),
                payload,
            })
            .map_err(|_| TransportError::Closed)
    }

    fn emit_to(&self, id: &str, event: &str, payload: Value) -> Result<(), TransportError> {
        let server = self.server.upgrade().ok_or(TransportError::Closed)?;
        let target = server
            .connections
            .get(id)
            .map(|c| Arc::clone(&c))
            .ok_or_else(|| TransportError::UnknownConnection(id.to_string()))?;
        target.emit(event, payload)
    }
}

impl std::fmt::Debug for MemoryConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryConnection")
            .field("id", &self.id)
            .field("connected_at", &self.connected_at)
            .finish()
    }
}

/// Client half of the in-process transport
pub struct MemoryClient {
    id: String,
    listeners: ListenerRegistry,
    inbox_tx: mpsc::UnboundedSender<Frame>,
    inbox: Mutex<mpsc::UnboundedReceiver<Frame>>,
    server_tx: mpsc::UnboundedSender<ServerFrame>,
    connected: AtomicBool,
}

impl MemoryClient {
    /// Id of the matching server-side connection
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Queue a transport-level event for this client
    ///
    /// This is how lifecycle events such as `reconnecting` are simulated.
    pub fn notify(&self, event: &str, payload: Value) {
        let _ = self.inbox_tx.send(Frame {
            event: event.to_string(),
            payload,
        });
    }

    /// Close the connection; the server drops it on its next pump
    pub fn disconnect(&self) {
        if self.connected.swap(false, Ordering::SeqCst) {
            let _ = self.server_tx.send(ServerFrame::Disconnected(self.id.clone()));
        }
    }

    /// Deliver every queued frame, returning how many were processed
    pub fn pump(&self) -> usize {
        let mut processed = 0;

        loop {
            let frame = {
                let mut inbox = self.inbox.lock().unwrap_or_else(|e| e.into_inner());
                match inbox.try_recv() {
                    Ok(frame) => frame,
                    Err(_) => break,
                }
            };
            processed += 1;
            self.listeners.fire(&frame.event, frame.payload);
        }

        processed
    }
}

impl ClientTransport for MemoryClient {
    fn on(&self, event: &str, listener: Listener) {
        self.listeners.on(event, listener);
    }

    fn once(&self, event: &str, listener: Listener) {
        self.listeners.once(event, listener);
    }

    fn emit(&self, event: &str, payload: Value) -> Result<(), TransportError> {
        if !self.is_connected() {
            return Err(TransportError::Closed);
        }

        self.server_tx
            .send(ServerFrame::Event {
                from: self.id.clone(),
                frame: Frame {
                    event: event.to_string(),
                    payload,
                },
            })
            .map_err(|_| TransportError::Closed)
    }
}

impl std::fmt::Debug for MemoryClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryClient")
            .field("id", &self.id)
            .field("connected", &self.is_connected())
            .finish()
    }
}

/// Pump the server and every client until no frames remain
///
/// Returns the total number of frames delivered. Stops after a fixed number
/// of rounds if handlers keep producing traffic.
pub fn settle(server: &MemoryServer, clients: &[Arc<MemoryClient>]) -> usize {
    let mut total = 0;

    for _ in 0..MAX_SETTLE_ROUNDS {
        let round = server.pump() + clients.iter().map(|c| c.pump()).sum::<usize>();
        if round == 0 {
            return total;
        }
        total += round;
    }

    tracing::warn!(
        rounds = MAX_SETTLE_ROUNDS,
        delivered = total,
        "Memory transport did not settle"
    );
    total
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn recorder() -> (Arc<Mutex<Vec<Value>>>, Listener) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        (seen, Arc::new(move |payload| sink.lock().unwrap().push(payload)))
    }

    #[test]
    fn test_connect_registers_after_pump() {
        let server = MemoryServer::new();
        let client = server.connect();

        assert_eq!(server.connection_count(), 0);
        server.pump();
        assert_eq!(server.connection_count(), 1);
        assert_eq!(server.connection_ids(), vec![client.id().to_string()]);
    }

    #[test]
    fn test_client_receives_connect_once() {
        let server = MemoryServer::new();
        let client = server.connect();
        let (seen, listener) = recorder();
        client.once("connect", listener);

        settle(&server, &[Arc::clone(&client)]);
        client.notify("connect", Value::Null);
        client.pump();

        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_client_emit_reaches_connection_listener() {
        let server = MemoryServer::new();
        let (seen, listener) = recorder();
        server.on_connection(Arc::new(move |conn: Arc<MemoryConnection>| {
            conn.on("chat", Arc::clone(&listener));
        }));

        let client = server.connect();
        server.pump();
        client.emit("chat", json!({ "text": "hi" })).unwrap();
        server.pump();

        assert_eq!(*seen.lock().unwrap(), vec![json!({ "text": "hi" })]);
    }

    #[test]
    fn test_emit_all_and_emit_to() {
        let server = MemoryServer::new();
        let a = server.connect();
        let b = server.connect();
        settle(&server, &[Arc::clone(&a), Arc::clone(&b)]);

        let (seen_a, listener_a) = recorder();
        let (seen_b, listener_b) = recorder();
        a.on("news", listener_a);
        b.on("news", listener_b);

        assert_eq!(server.emit_all("news", json!(1)), 2);
        let conn_a = server.connection(a.id()).unwrap();
        conn_a.emit_to(b.id(), "news", json!(2)).unwrap();
        settle(&server, &[Arc::clone(&a), Arc::clone(&b)]);

        assert_eq!(*seen_a.lock().unwrap(), vec![json!(1)]);
        assert_eq!(*seen_b.lock().unwrap(), vec![json!(1), json!(2)]);
    }

    #[test]
    fn test_emit_to_unknown_connection() {
        let server = MemoryServer::new();
        let client = server.connect();
        server.pump();

        let conn = server.connection(client.id()).unwrap();
        assert_eq!(
            conn.emit_to("nobody", "news", Value::Null),
            Err(TransportError::UnknownConnection("nobody".to_string()))
        );
    }

    #[test]
    fn test_disconnect_fires_and_removes() {
        let server = MemoryServer::new();
        let (seen, listener) = recorder();
        server.on_connection(Arc::new(move |conn: Arc<MemoryConnection>| {
            conn.on(DISCONNECT_EVENT, Arc::clone(&listener));
        }));

        let client = server.connect();
        server.pump();
        client.disconnect();
        server.pump();

        assert_eq!(server.connection_count(), 0);
        assert_eq!(seen.lock().unwrap().len(), 1);
        assert_eq!(
            client.emit("chat", Value::Null),
            Err(TransportError::Closed)
        );
    }

    #[test]
    fn test_settle_returns_zero_when_idle() {
        let server = MemoryServer::new();
        assert_eq!(settle(&server, &[]), 0);
    }
}
