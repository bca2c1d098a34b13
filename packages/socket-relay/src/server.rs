//! Server relay: per-connection dispatch context and inbound routing
//!
//! For every accepted connection the relay builds a [`Context`], lets an
//! optional enhancer decorate it, and routes envelopes received on the
//! configured channel to a [`Handler`].

use serde_json::Value;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use crate::action::Action;
use crate::error::RelayResult;
use crate::handlers::Handler;
use crate::options::ServerOptions;
use crate::transport::{ServerConnection, ServerTransport};

/// Typed values attached to a [`Context`] by an enhancer
#[derive(Clone, Default)]
pub struct Extensions {
    map: HashMap<TypeId, Arc<dyn Any + Send + Sync>>,
}

impl Extensions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value, replacing any previous value of the same type
    pub fn insert<E: Send + Sync + 'static>(&mut self, value: E) {
        self.map.insert(TypeId::of::<E>(), Arc::new(value));
    }

    pub fn get<E: Send + Sync + 'static>(&self) -> Option<&E> {
        self.map
            .get(&TypeId::of::<E>())
            .and_then(|value| value.downcast_ref::<E>())
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

impl std::fmt::Debug for Extensions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Extensions")
            .field("len", &self.map.len())
            .finish()
    }
}

/// Dispatch capabilities scoped to one connection
///
/// Every dispatch overwrites `meta.dispatchedBy` with the server tag
/// before the envelope leaves.
pub struct Context<T: ServerTransport> {
    server: Arc<T>,
    client: Arc<T::Connection>,
    options: Arc<ServerOptions>,
    extensions: Extensions,
}

impl<T: ServerTransport> Clone for Context<T> {
    fn clone(&self) -> Self {
        Self {
            server: Arc::clone(&self.server),
            client: Arc::clone(&self.client),
            options: Arc::clone(&self.options),
            extensions: self.extensions.clone(),
        }
    }
}

impl<T: ServerTransport> Context<T> {
    pub fn new(server: Arc<T>, client: Arc<T::Connection>, options: Arc<ServerOptions>) -> Self {
        Self {
            server,
            client,
            options,
            extensions: Extensions::new(),
        }
    }

    pub fn server(&self) -> &Arc<T> {
        &self.server
    }

    pub fn client(&self) -> &Arc<T::Connection> {
        &self.client
    }

    pub fn connection_id(&self) -> &str {
        self.client.id()
    }

    pub fn options(&self) -> &ServerOptions {
        &self.options
    }

    pub fn extensions(&self) -> &Extensions {
        &self.extensions
    }

    pub fn extensions_mut(&mut self) -> &mut Extensions {
        &mut self.extensions
    }

    /// Attach a typed value; intended for enhancers
    pub fn with_extension<E: Send + Sync + 'static>(mut self, value: E) -> Self {
        self.extensions.insert(value);
        self
    }

    pub fn extension<E: Send + Sync + 'static>(&self) -> Option<&E> {
        self.extensions.get::<E>()
    }

    fn envelope(&self, action: Action) -> RelayResult<Value> {
        Ok(action.stamp(self.options.dispatched_by.clone()).to_value()?)
    }

    /// Send an action to the originating connection
    pub fn dispatch(&self, action: Action) -> RelayResult<()> {
        let payload = self.envelope(action)?;
        self.client.emit(&self.options.event_name, payload)?;
        Ok(())
    }

    /// Send an action to another connection by id
    pub fn dispatch_to(&self, id: &str, action: Action) -> RelayResult<()> {
        let payload = self.envelope(action)?;
        self.client.emit_to(id, &self.options.event_name, payload)?;
        Ok(())
    }

    /// Send an action to every connected client, returning how many it
    /// was handed to
    pub fn dispatch_all(&self, action: Action) -> RelayResult<usize> {
        let payload = self.envelope(action)?;
        Ok(self.server.emit_all(&self.options.event_name, payload))
    }
}

type Enhancer<T> = Arc<dyn Fn(Context<T>) -> Context<T> + Send + Sync>;

/// Relay for the listening side of a transport
pub struct ServerRelay<T: ServerTransport> {
    transport: Arc<T>,
    options: Arc<ServerOptions>,
    enhancer: Option<Enhancer<T>>,
}

impl<T> ServerRelay<T>
where
    T: ServerTransport + 'static,
{
    pub fn new(transport: Arc<T>, options: ServerOptions) -> Self {
        Self {
            transport,
            options: Arc::new(options),
            enhancer: None,
        }
    }

    pub fn options(&self) -> &ServerOptions {
        &self.options
    }

    /// Decorate every new context before handlers see it
    pub fn enhancer<F>(mut self, enhancer: F) -> Self
    where
        F: Fn(Context<T>) -> Context<T> + Send + Sync + 'static,
    {
        self.enhancer = Some(Arc::new(enhancer));
        self
    }

    /// Start routing envelopes from every new connection to `handler`
    pub fn listen<H>(self, handler: H)
    where
        H: Handler<T> + 'static,
    {
        let handler: Arc<dyn Handler<T>> = Arc::new(handler);
        let server = Arc::clone(&self.transport);
        let options = Arc::clone(&self.options);
        let enhancer = self.enhancer.clone();

        self.transport.on_connection(Arc::new(move |client: Arc<T::Connection>| {
            let mut context = Context::new(Arc::clone(&server), Arc::clone(&client), Arc::clone(&options));
            if let Some(enhancer) = &enhancer {
                context = enhancer(context);
            }

            tracing::debug!(
                connection_id = %client.id(),
                event = %options.event_name,
                "Relay attached to connection"
            );

            let handler = Arc::clone(&handler);
            client.on(
                &options.event_name,
                Arc::new(move |payload| route(&context, &*handler, payload)),
            );
        }));
    }
}

/// Register `handler` on `transport` with default options
pub fn server<T, H>(transport: Arc<T>, handler: H)
where
    T: ServerTransport + 'static,
    H: Handler<T> + 'static,
{
    ServerRelay::new(transport, ServerOptions::default()).listen(handler);
}

fn route<T: ServerTransport>(context: &Context<T>, handler: &dyn Handler<T>, payload: Value) {
    let action = match Action::from_value(payload) {
        Ok(action) => action,
        Err(e) => {
            tracing::warn!(
                connection_id = %context.connection_id(),
                error = %e,
                "Dropping malformed inbound action"
            );
            return;
        }
    };

    if let Err(e) = handler.handle(context, &action) {
        tracing::warn!(
            connection_id = %context.connection_id(),
            action_type = %action.action_type,
            error = %e,
            "Handler failed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::DispatchedBy;
    use crate::action_types::{DISPATCH_EVENT, SERVER_TAG};
    use crate::error::RelayError;
    use crate::transport::memory::{settle, MemoryServer};
    use crate::transport::ClientTransport;
    use serde_json::json;
    use std::sync::Mutex;
    use tracing_test::traced_test;

    #[derive(Debug, PartialEq)]
    struct Room(&'static str);

    fn inbox(client: &crate::transport::memory::MemoryClient) -> Arc<Mutex<Vec<Value>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        client.on(
            DISPATCH_EVENT,
            Arc::new(move |payload| sink.lock().unwrap().push(payload)),
        );
        seen
    }

    #[test]
    fn test_extensions_typed_lookup() {
        let mut extensions = Extensions::new();
        assert!(extensions.is_empty());

        extensions.insert(Room("lobby"));
        extensions.insert(7_u32);
        extensions.insert(Room("kitchen"));

        assert_eq!(extensions.len(), 2);
        assert_eq!(extensions.get::<Room>(), Some(&Room("kitchen")));
        assert_eq!(extensions.get::<u32>(), Some(&7));
        assert!(extensions.get::<String>().is_none());
    }

    #[test]
    fn test_handler_receives_context_and_action() {
        let transport = Arc::new(MemoryServer::new());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);

        server(
            Arc::clone(&transport),
            move |ctx: &Context<MemoryServer>, action: &Action| -> RelayResult<()> {
                sink.lock()
                    .unwrap()
                    .push((ctx.connection_id().to_string(), action.action_type.clone()));
                Ok(())
            },
        );

        let client = transport.connect();
        settle(&transport, &[Arc::clone(&client)]);
        client
            .emit(DISPATCH_EVENT, json!({ "type": "HELLO" }))
            .unwrap();
        settle(&transport, &[Arc::clone(&client)]);

        assert_eq!(
            *seen.lock().unwrap(),
            vec![(client.id().to_string(), "HELLO".to_string())]
        );
    }

    #[test]
    fn test_dispatch_targets_originating_client() {
        let transport = Arc::new(MemoryServer::new());
        server(
            Arc::clone(&transport),
            |ctx: &Context<MemoryServer>, action: &Action| -> RelayResult<()> {
                ctx.dispatch(Action::new(format!("{}_ACK", action.action_type)))
            },
        );

        let a = transport.connect();
        let b = transport.connect();
        let seen_a = inbox(&a);
        let seen_b = inbox(&b);
        let clients = [Arc::clone(&a), Arc::clone(&b)];
        settle(&transport, &clients);

        a.emit(DISPATCH_EVENT, json!({ "type": "SAVE" })).unwrap();
        settle(&transport, &clients);

        assert_eq!(
            *seen_a.lock().unwrap(),
            vec![json!({ "type": "SAVE_ACK", "meta": { "dispatchedBy": SERVER_TAG } })]
        );
        assert!(seen_b.lock().unwrap().is_empty());
    }

    #[test]
    fn test_dispatch_to_and_dispatch_all_overwrite_provenance() {
        let transport = Arc::new(MemoryServer::new());
        let a = transport.connect();
        let b = transport.connect();
        let target = b.id().to_string();

        server(
            Arc::clone(&transport),
            move |ctx: &Context<MemoryServer>, action: &Action| -> RelayResult<()> {
                match action.action_type.as_str() {
                    "DIRECT" => ctx.dispatch_to(&target, action.clone()),
                    "SHOUT" => ctx.dispatch_all(action.clone()).map(|_| ()),
                    _ => Ok(()),
                }
            },
        );

        let seen_a = inbox(&a);
        let seen_b = inbox(&b);
        let clients = [Arc::clone(&a), Arc::clone(&b)];
        settle(&transport, &clients);

        let direct = Action::new("DIRECT").stamp(DispatchedBy::Client);
        a.emit(DISPATCH_EVENT, direct.to_value().unwrap()).unwrap();
        a.emit(DISPATCH_EVENT, json!({ "type": "SHOUT" })).unwrap();
        settle(&transport, &clients);

        let stamped = |t: &str| json!({ "type": t, "meta": { "dispatchedBy": SERVER_TAG } });
        assert_eq!(*seen_a.lock().unwrap(), vec![stamped("SHOUT")]);
        assert_eq!(
            *seen_b.lock().unwrap(),
            vec![stamped("DIRECT"), stamped("SHOUT")]
        );
    }

    #[test]
    fn test_dispatch_to_unknown_connection_errors() {
        let transport = Arc::new(MemoryServer::new());
        let failures = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&failures);

        server(
            Arc::clone(&transport),
            move |ctx: &Context<MemoryServer>, action: &Action| -> RelayResult<()> {
                if let Err(e) = ctx.dispatch_to("missing", action.clone()) {
                    sink.lock().unwrap().push(e.to_string());
                }
                Ok(())
            },
        );

        let client = transport.connect();
        settle(&transport, &[Arc::clone(&client)]);
        client.emit(DISPATCH_EVENT, json!({ "type": "X" })).unwrap();
        settle(&transport, &[Arc::clone(&client)]);

        assert_eq!(
            *failures.lock().unwrap(),
            vec!["transport error: unknown connection: missing".to_string()]
        );
    }

    #[test]
    fn test_enhancer_extensions_reach_handler() {
        let transport = Arc::new(MemoryServer::new());
        let rooms = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&rooms);

        ServerRelay::new(Arc::clone(&transport), ServerOptions::default())
            .enhancer(|ctx: Context<MemoryServer>| ctx.with_extension(Room("lobby")))
            .listen(
                move |ctx: &Context<MemoryServer>, _action: &Action| -> RelayResult<()> {
                    let room = ctx
                        .extension::<Room>()
                        .ok_or_else(|| RelayError::handler("no room"))?;
                    sink.lock().unwrap().push(room.0);
                    Ok(())
                },
            );

        let client = transport.connect();
        settle(&transport, &[Arc::clone(&client)]);
        client.emit(DISPATCH_EVENT, json!({ "type": "X" })).unwrap();
        settle(&transport, &[Arc::clone(&client)]);

        assert_eq!(*rooms.lock().unwrap(), vec!["lobby"]);
    }

    #[test]
    fn test_custom_event_name_and_malformed_payloads() {
        let transport = Arc::new(MemoryServer::new());
        let count = Arc::new(Mutex::new(0));
        let sink = Arc::clone(&count);

        ServerRelay::new(
            Arc::clone(&transport),
            ServerOptions::new().with_event_name("chat"),
        )
        .listen(
            move |_ctx: &Context<MemoryServer>, _action: &Action| -> RelayResult<()> {
                *sink.lock().unwrap() += 1;
                Ok(())
            },
        );

        let client = transport.connect();
        settle(&transport, &[Arc::clone(&client)]);
        client.emit(DISPATCH_EVENT, json!({ "type": "IGNORED" })).unwrap();
        client.emit("chat", json!(17)).unwrap();
        client.emit("chat", json!({ "type": "COUNTED" })).unwrap();
        settle(&transport, &[Arc::clone(&client)]);

        assert_eq!(*count.lock().unwrap(), 1);
    }

    #[traced_test]
    #[test]
    fn test_handler_error_is_logged_and_connection_survives() {
        let transport = Arc::new(MemoryServer::new());
        server(
            Arc::clone(&transport),
            |ctx: &Context<MemoryServer>, action: &Action| -> RelayResult<()> {
                if action.action_type == "BAD" {
                    return Err(RelayError::handler("rejected"));
                }
                ctx.dispatch(Action::new("OK"))
            },
        );

        let client = transport.connect();
        let seen = inbox(&client);
        settle(&transport, &[Arc::clone(&client)]);
        client.emit(DISPATCH_EVENT, json!({ "type": "BAD" })).unwrap();
        client.emit(DISPATCH_EVENT, json!({ "type": "GOOD" })).unwrap();
        settle(&transport, &[Arc::clone(&client)]);

        assert!(logs_contain("rejected"));
        assert_eq!(seen.lock().unwrap().len(), 1);
        assert_eq!(transport.connection_count(), 1);
    }
}
