//! Mock client transport
//!
//! Provides a [`MockSocket`] that records every emit and lets tests fire
//! transport events directly, without queuing.

use serde_json::Value;
use socket_relay::transport::{ClientTransport, Listener, ListenerRegistry};
use socket_relay::TransportError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

/// Recording client transport
///
/// # Thread Safety
///
/// `MockSocket` keeps its state behind `Arc`, so clones share listeners and
/// the emit log.
#[derive(Clone, Default)]
pub struct MockSocket {
    listeners: Arc<ListenerRegistry>,
    emitted: Arc<RwLock<Vec<(String, Value)>>>,
    closed: Arc<AtomicBool>,
}

impl MockSocket {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fire `event` on every registered listener, returning how many ran
    pub fn fire(&self, event: &str, payload: Value) -> usize {
        self.listeners.fire(event, payload)
    }

    pub fn listener_count(&self, event: &str) -> usize {
        self.listeners.listener_count(event)
    }

    /// Every `(event, payload)` emitted so far, in order
    pub fn emitted(&self) -> Vec<(String, Value)> {
        self.emitted
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Payloads emitted on one event name
    pub fn emitted_on(&self, event: &str) -> Vec<Value> {
        self.emitted()
            .into_iter()
            .filter(|(name, _)| name == event)
            .map(|(_, payload)| payload)
            .collect()
    }

    pub fn clear_emitted(&self) {
        self.emitted
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }

    /// Make every following emit fail with [`TransportError::Closed`]
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

impl ClientTransport for MockSocket {
    fn on(&self, event: &str, listener: Listener) {
        self.listeners.on(event, listener);
    }

    fn once(&self, event: &str, listener: Listener) {
        self.listeners.once(event, listener);
    }

    fn emit(&self, event: &str, payload: Value) -> Result<(), TransportError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }
        self.emitted
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push((event.to_string(), payload));
        Ok(())
    }
}
