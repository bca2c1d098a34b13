//! Reducer store the relays dispatch into
//!
//! [`Store`] is the capability the client relay needs: `dispatch` and
//! `get_state`. [`ReducerStore`] is a small implementation of it with a
//! middleware chain and change subscriptions.

use std::sync::{Arc, Mutex, RwLock};

use crate::action::Action;

/// Something actions can be dispatched into
pub trait Store: Send + Sync {
    type State;

    /// Run an action through the store, returning what the chain returned
    fn dispatch(&self, action: Action) -> Action;

    /// Snapshot of the current state
    fn get_state(&self) -> Self::State;
}

/// Pure state transition
pub type Reducer<S> = Arc<dyn Fn(&S, &Action) -> S + Send + Sync>;

/// Step in a store's dispatch chain
///
/// A middleware either forwards the action to `next` (possibly modified) or
/// short-circuits by returning without calling it.
pub trait Middleware: Send + Sync {
    fn handle(&self, action: Action, next: &dyn Fn(Action) -> Action) -> Action;
}

type Subscriber<S> = Arc<dyn Fn(&S) + Send + Sync>;

/// Mutex-guarded state driven by a single reducer
///
/// Reducers run while the state lock is held and must not dispatch back
/// into the same store.
pub struct ReducerStore<S> {
    state: Mutex<S>,
    reducer: Reducer<S>,
    middleware: Vec<Arc<dyn Middleware>>,
    subscribers: RwLock<Vec<Subscriber<S>>>,
}

impl<S> ReducerStore<S>
where
    S: Clone + Send + Sync + 'static,
{
    pub fn new<R>(reducer: R, initial: S) -> Self
    where
        R: Fn(&S, &Action) -> S + Send + Sync + 'static,
    {
        Self::builder(reducer, initial).build()
    }

    pub fn builder<R>(reducer: R, initial: S) -> ReducerStoreBuilder<S>
    where
        R: Fn(&S, &Action) -> S + Send + Sync + 'static,
    {
        ReducerStoreBuilder {
            reducer: Arc::new(reducer),
            initial,
            middleware: Vec::new(),
        }
    }

    /// Call `listener` with the new state after every reduction
    pub fn subscribe<F>(&self, listener: F)
    where
        F: Fn(&S) + Send + Sync + 'static,
    {
        self.subscribers
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(Arc::new(listener));
    }

    fn run(&self, index: usize, action: Action) -> Action {
        match self.middleware.get(index) {
            Some(middleware) => middleware.handle(action, &|next| self.run(index + 1, next)),
            None => self.reduce(action),
        }
    }

    fn reduce(&self, action: Action) -> Action {
        let snapshot = {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            *state = (self.reducer)(&*state, &action);
            state.clone()
        };

        let subscribers = self
            .subscribers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        for subscriber in subscribers {
            subscriber(&snapshot);
        }

        action
    }
}

impl<S> Store for ReducerStore<S>
where
    S: Clone + Send + Sync + 'static,
{
    type State = S;

    fn dispatch(&self, action: Action) -> Action {
        tracing::trace!(action_type = %action.action_type, "Dispatching action");
        self.run(0, action)
    }

    fn get_state(&self) -> S {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

/// Builder for a [`ReducerStore`] with middleware
pub struct ReducerStoreBuilder<S> {
    reducer: Reducer<S>,
    initial: S,
    middleware: Vec<Arc<dyn Middleware>>,
}

impl<S> ReducerStoreBuilder<S>
where
    S: Clone + Send + Sync + 'static,
{
    /// Append a middleware; the first one added sees actions first
    pub fn middleware<M>(mut self, middleware: M) -> Self
    where
        M: Middleware + 'static,
    {
        self.middleware.push(Arc::new(middleware));
        self
    }

    pub fn build(self) -> ReducerStore<S> {
        ReducerStore {
            state: Mutex::new(self.initial),
            reducer: self.reducer,
            middleware: self.middleware,
            subscribers: RwLock::new(Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn counter(state: &i64, action: &Action) -> i64 {
        match action.action_type.as_str() {
            "INCREMENT" => state + 1,
            "DECREMENT" => state - 1,
            _ => *state,
        }
    }

    struct Tag(&'static str, Arc<Mutex<Vec<&'static str>>>);

    impl Middleware for Tag {
        fn handle(&self, action: Action, next: &dyn Fn(Action) -> Action) -> Action {
            self.1.lock().unwrap().push(self.0);
            next(action.with_payload(self.0, true))
        }
    }

    struct Swallow;

    impl Middleware for Swallow {
        fn handle(&self, action: Action, _next: &dyn Fn(Action) -> Action) -> Action {
            action
        }
    }

    #[test]
    fn test_dispatch_reduces_state() {
        let store = ReducerStore::new(counter, 0_i64);

        store.dispatch(Action::new("INCREMENT"));
        store.dispatch(Action::new("INCREMENT"));
        store.dispatch(Action::new("DECREMENT"));

        assert_eq!(store.get_state(), 1);
    }

    #[test]
    fn test_dispatch_returns_action() {
        let store = ReducerStore::new(counter, 0_i64);
        let returned = store.dispatch(Action::new("INCREMENT").with_payload("by", 1));

        assert_eq!(returned.action_type, "INCREMENT");
        assert_eq!(returned.get("by"), Some(&json!(1)));
    }

    #[test]
    fn test_middleware_runs_in_order() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let store = ReducerStore::builder(counter, 0_i64)
            .middleware(Tag("first", Arc::clone(&order)))
            .middleware(Tag("second", Arc::clone(&order)))
            .build();

        let returned = store.dispatch(Action::new("INCREMENT"));

        assert_eq!(*order.lock().unwrap(), vec!["first", "second"]);
        assert_eq!(returned.get("first"), Some(&json!(true)));
        assert_eq!(returned.get("second"), Some(&json!(true)));
        assert_eq!(store.get_state(), 1);
    }

    #[test]
    fn test_middleware_can_short_circuit() {
        let store = ReducerStore::builder(counter, 0_i64).middleware(Swallow).build();

        store.dispatch(Action::new("INCREMENT"));

        assert_eq!(store.get_state(), 0);
    }

    #[test]
    fn test_subscribers_see_new_state() {
        let store = ReducerStore::new(counter, 10_i64);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        store.subscribe(move |state: &i64| sink.lock().unwrap().push(*state));

        store.dispatch(Action::new("INCREMENT"));
        store.dispatch(Action::new("UNKNOWN"));

        assert_eq!(*seen.lock().unwrap(), vec![11, 11]);
    }
}
