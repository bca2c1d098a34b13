//! Client relay: connects a local store to a client transport
//!
//! Outbound, [`ClientRelay::wrap_reducer`] inspects every locally dispatched
//! action after the real reducer has run and emits the ones that ask for it.
//! Inbound, [`ClientRelay::attach`] registers transport listeners that turn
//! lifecycle events and relayed envelopes into store dispatches.
//!
//! Actions that arrived from the server carry the server provenance tag and
//! are never emitted again, which is what keeps two relays from bouncing the
//! same action back and forth.

use serde_json::Value;
use std::sync::Arc;

use crate::action::{Action, DispatchedBy, Emit};
use crate::action_types::LifecycleEvent;
use crate::options::ClientOptions;
use crate::store::{Middleware, Store};
use crate::transport::{ClientTransport, Listener};

/// Transform that returns the synthesized action unchanged
pub fn passthrough<S>(_state: &S, action: Action) -> Action {
    action
}

/// Dispatch a synthesized lifecycle action
///
/// Builds `{type: action_type}`, runs it through `transform` together with
/// the current state, and dispatches the result.
pub fn handle_event<St, F>(store: &St, transform: &F, action_type: &str) -> Action
where
    St: Store + ?Sized,
    F: Fn(&St::State, Action) -> Action + ?Sized,
{
    let state = store.get_state();
    store.dispatch(transform(&state, Action::new(action_type)))
}

/// Dispatch an envelope received from the server
///
/// The envelope is dispatched as received except for its provenance, which
/// is overwritten with the server tag. Returns `None` when the payload is
/// not an action-shaped object.
pub fn handle_dispatch<St>(store: &St, payload: Value) -> Option<Action>
where
    St: Store + ?Sized,
{
    match Action::from_value(payload) {
        Ok(action) => Some(store.dispatch(action.stamp(DispatchedBy::Server))),
        Err(e) => {
            tracing::warn!(error = %e, "Dropping malformed inbound action");
            None
        }
    }
}

/// Relay between one client transport and one store
pub struct ClientRelay<T> {
    transport: Arc<T>,
    options: Arc<ClientOptions>,
}

impl<T> Clone for ClientRelay<T> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            options: Arc::clone(&self.options),
        }
    }
}

impl<T> ClientRelay<T>
where
    T: ClientTransport + 'static,
{
    pub fn new(transport: Arc<T>, options: ClientOptions) -> Self {
        Self {
            transport,
            options: Arc::new(options),
        }
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    pub fn transport(&self) -> &Arc<T> {
        &self.transport
    }

    /// Middleware for the store's dispatch chain
    pub fn middleware(&self) -> RelayMiddleware {
        RelayMiddleware {
            event_name: self.options.event_name.clone(),
        }
    }

    /// Register transport listeners that dispatch into `store`
    pub fn attach<St>(&self, store: &Arc<St>)
    where
        St: Store + 'static,
    {
        self.attach_with(store, passthrough::<St::State>);
    }

    /// Like [`attach`](Self::attach), with a transform applied to every
    /// synthesized lifecycle action before it is dispatched
    ///
    /// Listeners hold the store weakly; once the store is dropped they
    /// become no-ops.
    pub fn attach_with<St, F>(&self, store: &Arc<St>, transform: F)
    where
        St: Store + 'static,
        F: Fn(&St::State, Action) -> Action + Send + Sync + 'static,
    {
        let transform = Arc::new(transform);

        for event in LifecycleEvent::ALL {
            let store = Arc::downgrade(store);
            let transform = Arc::clone(&transform);
            let listener: Listener = Arc::new(move |_payload| {
                if let Some(store) = store.upgrade() {
                    tracing::debug!(event = %event, "Transport lifecycle event");
                    handle_event(&*store, &*transform, event.action_type());
                }
            });

            if event.is_once() {
                self.transport.once(event.event_name(), listener);
            } else {
                self.transport.on(event.event_name(), listener);
            }
        }

        let store = Arc::downgrade(store);
        self.transport.on(
            &self.options.event_name,
            Arc::new(move |payload| {
                if let Some(store) = store.upgrade() {
                    handle_dispatch(&*store, payload);
                }
            }),
        );
    }

    /// Wrap a reducer so that qualifying actions are emitted after reduction
    ///
    /// The new state is always returned, whether or not the action was
    /// emitted and whether or not emission succeeded.
    pub fn wrap_reducer<S, R>(&self, reducer: R) -> impl Fn(&S, &Action) -> S + Send + Sync + 'static
    where
        S: 'static,
        R: Fn(&S, &Action) -> S + Send + Sync + 'static,
    {
        let relay = self.clone();
        move |state: &S, action: &Action| {
            let next = reducer(state, action);
            relay.relay(action);
            next
        }
    }

    /// Whether the emit flag on `action` asks for emission on this relay
    ///
    /// True when `meta.emit` is `true`, when it equals the configured event
    /// name, or when it is absent and `emit_all` is set. A present `null` or
    /// any other shape never emits.
    pub fn should_emit(&self, action: &Action) -> bool {
        match action.emit() {
            Some(Emit::Flag(flag)) => *flag,
            Some(Emit::Channel(channel)) => *channel == self.options.event_name,
            Some(Emit::Other(_)) => false,
            None => self.options.emit_all,
        }
    }

    /// Emit `action` if it qualifies, returning whether it was sent
    pub fn relay(&self, action: &Action) -> bool {
        if action.dispatched_by() == Some(&DispatchedBy::Server) {
            tracing::trace!(action_type = %action.action_type, "Not re-emitting server action");
            return false;
        }

        if !self.should_emit(action) {
            return false;
        }

        let envelope = action.stamped(self.options.dispatched_by.clone());
        let payload = match envelope.to_value() {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    action_type = %action.action_type,
                    "Failed to serialize action"
                );
                return false;
            }
        };

        match self.transport.emit(&self.options.event_name, payload) {
            Ok(()) => {
                tracing::debug!(
                    action_type = %action.action_type,
                    event = %self.options.event_name,
                    "Emitted action"
                );
                true
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    action_type = %action.action_type,
                    "Failed to emit action"
                );
                false
            }
        }
    }
}

/// Store middleware installed alongside the relay
///
/// Actions pass through unchanged; emission happens in the wrapped reducer
/// so that it only ever follows a successful reduction.
#[derive(Debug, Clone)]
pub struct RelayMiddleware {
    event_name: String,
}

impl Middleware for RelayMiddleware {
    fn handle(&self, action: Action, next: &dyn Fn(Action) -> Action) -> Action {
        tracing::trace!(
            action_type = %action.action_type,
            event = %self.event_name,
            "Relay middleware"
        );
        next(action)
    }
}
