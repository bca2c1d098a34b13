//! Event listener bookkeeping shared by transport implementations

use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Callback invoked with the payload of an event
pub type Listener = Arc<dyn Fn(Value) + Send + Sync>;

struct Entry {
    listener: Listener,
    once: bool,
}

/// Per-event listener lists with `on`/`once` semantics
///
/// Listeners run outside the internal lock, so a listener may register
/// further listeners or fire events on the same registry.
///
/// Lock poisoning is recovered with `into_inner`: a panicking listener never
/// holds the lock, and the map stays consistent across a panic elsewhere.
#[derive(Default)]
pub struct ListenerRegistry {
    entries: Mutex<HashMap<String, Vec<Entry>>>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(&self, event: &str, listener: Listener) {
        self.insert(event, listener, false);
    }

    pub fn once(&self, event: &str, listener: Listener) {
        self.insert(event, listener, true);
    }

    fn insert(&self, event: &str, listener: Listener, once: bool) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries
            .entry(event.to_string())
            .or_default()
            .push(Entry { listener, once });
    }

    /// Invoke every listener for `event` in registration order
    ///
    /// One-shot listeners are removed before any listener runs. Returns the
    /// number of listeners invoked.
    pub fn fire(&self, event: &str, payload: Value) -> usize {
        let listeners: Vec<Listener> = {
            let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
            let Some(list) = entries.get_mut(event) else {
                return 0;
            };

            let fired = list.iter().map(|e| Arc::clone(&e.listener)).collect();
            list.retain(|e| !e.once);
            if list.is_empty() {
                entries.remove(event);
            }
            fired
        };

        for listener in &listeners {
            listener(payload.clone());
        }

        listeners.len()
    }

    pub fn listener_count(&self, event: &str) -> usize {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.get(event).map(Vec::len).unwrap_or(0)
    }

    /// Drop every listener
    ///
    /// Transports call this when a connection closes, which releases
    /// anything the listeners captured.
    pub fn clear(&self) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.clear();
    }
}

impl std::fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let mut events: Vec<&String> = entries.keys().collect();
        events.sort();
        f.debug_struct("ListenerRegistry")
            .field("events", &events)
            .finish()
    }
}
