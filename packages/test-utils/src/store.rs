//! Mock store
//!
//! Provides a [`MockStore`] whose state never changes and which echoes every
//! dispatched action back, recording it on the way.

use socket_relay::{Action, Store};
use std::sync::{Arc, RwLock};

/// Store with a fixed state that records dispatches
pub struct MockStore<S> {
    state: S,
    dispatched: Arc<RwLock<Vec<Action>>>,
}

impl<S> MockStore<S>
where
    S: Clone + Send + Sync,
{
    pub fn new(state: S) -> Self {
        Self {
            state,
            dispatched: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Every action dispatched so far, in order
    pub fn dispatched(&self) -> Vec<Action> {
        self.dispatched
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn last_dispatched(&self) -> Option<Action> {
        self.dispatched
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .last()
            .cloned()
    }

    pub fn clear(&self) {
        self.dispatched
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }
}

impl<S> Store for MockStore<S>
where
    S: Clone + Send + Sync,
{
    type State = S;

    fn dispatch(&self, action: Action) -> Action {
        self.dispatched
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(action.clone());
        action
    }

    fn get_state(&self) -> S {
        self.state.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_store_echoes_and_records() {
        let store = MockStore::new(5_u8);
        let returned = store.dispatch(Action::new("A"));

        assert_eq!(returned, Action::new("A"));
        assert_eq!(store.dispatched(), vec![Action::new("A")]);
        assert_eq!(store.get_state(), 5);
    }

    #[test]
    fn test_mock_store_clear() {
        let store = MockStore::new(());
        store.dispatch(Action::new("A"));
        store.clear();

        assert!(store.last_dispatched().is_none());
    }
}
