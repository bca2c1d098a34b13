//! HTTP routes
//!
//! - `GET /` - banner
//! - `GET /health` - liveness check with the open connection count
//! - `GET /ws` - WebSocket upgrade into the relay

use axum::{extract::Extension, response::IntoResponse, routing::get, Json, Router};
use tower_http::trace::TraceLayer;

use crate::ws::{ws_handler, WsServer};

/// Build the application router around a connection registry
pub fn app(server: WsServer) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/ws", get(ws_handler))
        .layer(Extension(server))
        .layer(TraceLayer::new_for_http())
}

async fn root() -> &'static str {
    "socket-relay server"
}

async fn health(Extension(server): Extension<WsServer>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "connections": server.connection_count(),
    }))
}
