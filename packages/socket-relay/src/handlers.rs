//! Handler composition for inbound envelopes
//!
//! A [`Handler`] reacts to one envelope received on a connection. Plain
//! closures of the shape `Fn(&Context<T>, &Action) -> RelayResult<()>` are
//! handlers. Two combinators build larger handlers out of smaller ones:
//!
//! - [`combine_handlers`]: run several independent handlers on every action
//! - [`create_handler`]: pick one handler by action type

use std::collections::HashMap;
use std::sync::Arc;

use crate::action::Action;
use crate::error::RelayResult;
use crate::server::Context;
use crate::transport::ServerTransport;

/// Reacts to an envelope received from a connection
pub trait Handler<T: ServerTransport>: Send + Sync {
    fn handle(&self, context: &Context<T>, action: &Action) -> RelayResult<()>;
}

impl<T, F> Handler<T> for F
where
    T: ServerTransport,
    F: Fn(&Context<T>, &Action) -> RelayResult<()> + Send + Sync,
{
    fn handle(&self, context: &Context<T>, action: &Action) -> RelayResult<()> {
        self(context, action)
    }
}

/// Shared, type-erased handler
pub type BoxedHandler<T> = Arc<dyn Handler<T>>;

impl<T: ServerTransport + 'static> Handler<T> for BoxedHandler<T> {
    fn handle(&self, context: &Context<T>, action: &Action) -> RelayResult<()> {
        (**self).handle(context, action)
    }
}

/// Erase a handler's type so it can sit in a list next to others
pub fn boxed<T, H>(handler: H) -> BoxedHandler<T>
where
    T: ServerTransport + 'static,
    H: Handler<T> + 'static,
{
    Arc::new(handler)
}

/// Handlers that all see every action, in insertion order
///
/// The first error stops the remaining handlers and is returned.
pub struct CombinedHandlers<T: ServerTransport> {
    handlers: Vec<(String, BoxedHandler<T>)>,
}

impl<T> CombinedHandlers<T>
where
    T: ServerTransport + 'static,
{
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }

    pub fn with<H>(mut self, key: impl Into<String>, handler: H) -> Self
    where
        H: Handler<T> + 'static,
    {
        self.handlers.push((key.into(), boxed(handler)));
        self
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.handlers.iter().map(|(key, _)| key.as_str())
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl<T> Default for CombinedHandlers<T>
where
    T: ServerTransport + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ServerTransport + 'static> Handler<T> for CombinedHandlers<T> {
    fn handle(&self, context: &Context<T>, action: &Action) -> RelayResult<()> {
        for (key, handler) in &self.handlers {
            if let Err(e) = handler.handle(context, action) {
                tracing::debug!(
                    handler = %key,
                    action_type = %action.action_type,
                    "Combined handler stopped"
                );
                return Err(e);
            }
        }
        Ok(())
    }
}

/// Combine keyed handlers into one that runs them all in order
pub fn combine_handlers<T, K, I>(handlers: I) -> CombinedHandlers<T>
where
    T: ServerTransport + 'static,
    K: Into<String>,
    I: IntoIterator<Item = (K, BoxedHandler<T>)>,
{
    CombinedHandlers {
        handlers: handlers
            .into_iter()
            .map(|(key, handler)| (key.into(), handler))
            .collect(),
    }
}

/// Outcome of routing an action by type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Routed {
    Handled,
    /// No handler is registered for the action type; nothing ran
    Unhandled,
}

/// Handler that dispatches on `action.type`
pub struct TypeRouter<T: ServerTransport> {
    routes: HashMap<String, BoxedHandler<T>>,
}

impl<T> TypeRouter<T>
where
    T: ServerTransport + 'static,
{
    pub fn new() -> Self {
        Self {
            routes: HashMap::new(),
        }
    }

    /// Route `action_type` to `handler`, replacing any previous route
    pub fn on<H>(mut self, action_type: impl Into<String>, handler: H) -> Self
    where
        H: Handler<T> + 'static,
    {
        self.routes.insert(action_type.into(), boxed(handler));
        self
    }

    pub fn handles(&self, action_type: &str) -> bool {
        self.routes.contains_key(action_type)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

impl<T: ServerTransport + 'static> TypeRouter<T> {
    /// Run the handler registered for `action.type`, if any
    pub fn route(&self, context: &Context<T>, action: &Action) -> RelayResult<Routed> {
        match self.routes.get(&action.action_type) {
            Some(handler) => {
                handler.handle(context, action)?;
                Ok(Routed::Handled)
            }
            None => {
                tracing::trace!(action_type = %action.action_type, "No handler for action type");
                Ok(Routed::Unhandled)
            }
        }
    }
}

impl<T> Default for TypeRouter<T>
where
    T: ServerTransport + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ServerTransport + 'static> Handler<T> for TypeRouter<T> {
    fn handle(&self, context: &Context<T>, action: &Action) -> RelayResult<()> {
        self.route(context, action).map(|_| ())
    }
}

/// Build a [`TypeRouter`] from `(action type, handler)` pairs
pub fn create_handler<T, K, I>(actions: I) -> TypeRouter<T>
where
    T: ServerTransport + 'static,
    K: Into<String>,
    I: IntoIterator<Item = (K, BoxedHandler<T>)>,
{
    TypeRouter {
        routes: actions
            .into_iter()
            .map(|(action_type, handler)| (action_type.into(), handler))
            .collect(),
    }
}
