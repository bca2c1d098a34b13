//! Socket relay
//!
//! Bridges a reducer store with a bidirectional socket transport. Locally
//! dispatched actions that ask for it are emitted to the server; envelopes
//! received from the server are dispatched into the store and never emitted
//! again.
//!
//! - [`client`]: [`ClientRelay`], wraps a reducer and listens on a client transport
//! - [`server`]: [`ServerRelay`] and the per-connection [`Context`]
//! - [`handlers`]: [`combine_handlers`] and [`create_handler`]
//! - [`store`]: the [`Store`] capability and a [`ReducerStore`]
//! - [`transport`]: transport capabilities and an in-process implementation
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use socket_relay::transport::memory::{settle, MemoryServer};
//! use socket_relay::{
//!     create_handler, handlers::boxed, Action, ClientOptions, ClientRelay, Context,
//!     ReducerStore, RelayResult, Store, ServerRelay, ServerOptions,
//! };
//!
//! let server = Arc::new(MemoryServer::new());
//! ServerRelay::new(Arc::clone(&server), ServerOptions::default()).listen(create_handler([(
//!     "PING",
//!     boxed(|ctx: &Context<MemoryServer>, _: &Action| -> RelayResult<()> {
//!         ctx.dispatch_all(Action::new("PONG")).map(|_| ())
//!     }),
//! )]));
//!
//! let socket = server.connect();
//! let relay = ClientRelay::new(Arc::clone(&socket), ClientOptions::default());
//! let reducer = relay.wrap_reducer(|log: &Vec<String>, action: &Action| {
//!     let mut log = log.clone();
//!     log.push(action.action_type.clone());
//!     log
//! });
//! let store = Arc::new(
//!     ReducerStore::builder(reducer, Vec::new())
//!         .middleware(relay.middleware())
//!         .build(),
//! );
//! relay.attach(&store);
//!
//! store.dispatch(Action::new("PING").with_emit(true));
//! settle(&server, &[socket]);
//!
//! assert_eq!(store.get_state().last().map(String::as_str), Some("PONG"));
//! ```

pub mod action;
pub mod action_types;
pub mod client;
pub mod error;
pub mod handlers;
pub mod options;
pub mod server;
pub mod store;
pub mod transport;

pub use action::{Action, DispatchedBy, Emit, Meta};
pub use client::{handle_dispatch, handle_event, passthrough, ClientRelay, RelayMiddleware};
pub use error::{RelayError, RelayResult, TransportError};
pub use handlers::{
    combine_handlers, create_handler, BoxedHandler, CombinedHandlers, Handler, Routed, TypeRouter,
};
pub use options::{ClientOptions, ServerOptions};
pub use server::{server, Context, Extensions, ServerRelay};
pub use store::{Middleware, ReducerStore, Store};
