//! WebSocket transport for the relay
//!
//! - [`frame`]: the `{event, data}` text frame format
//! - [`connection`]: connection registry implementing the server transport
//! - [`handler`]: the axum upgrade handler and per-socket tasks

pub mod connection;
pub mod frame;
pub mod handler;

pub use connection::{WsConnection, WsServer};
pub use frame::Frame;
pub use handler::ws_handler;
