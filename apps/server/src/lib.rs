//! Socket relay server library
//!
//! Exposes the WebSocket transport, the demo handler set and the router
//! for use by the binary and by integration tests.

pub mod config;
pub mod handlers;
pub mod routes;
pub mod ws;

pub use config::Config;
pub use routes::app;
pub use ws::{WsConnection, WsServer};
