//! Shared test utilities for the socket-relay workspace
//!
//! This crate provides recording implementations of the transport and store
//! capabilities so relays can be tested without a real socket.
//!
//! # Mocks
//!
//! - [`MockSocket`] - client transport that records emits and fires events on demand
//! - [`MockServer`] / [`MockConnection`] - server transport with manually accepted connections
//! - [`MockStore`] - store with a fixed state that records every dispatch
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use serde_json::json;
//! use socket_relay::{ClientOptions, ClientRelay};
//! use socket_relay::action_types::DISPATCH_EVENT;
//! use socket_relay_test_utils::{MockSocket, MockStore};
//!
//! let socket = Arc::new(MockSocket::new());
//! let store = Arc::new(MockStore::new(()));
//! ClientRelay::new(Arc::clone(&socket), ClientOptions::default()).attach(&store);
//!
//! socket.fire(DISPATCH_EVENT, json!({ "type": "test" }));
//! assert_eq!(store.dispatched().len(), 1);
//! ```

mod server;
mod socket;
mod store;

pub use server::{MockConnection, MockServer};
pub use socket::MockSocket;
pub use store::MockStore;
