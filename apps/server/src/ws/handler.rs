//! WebSocket upgrade handler
//!
//! Upgrades the request, registers the socket with the [`WsServer`] and runs
//! one task per direction until either side finishes.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Extension,
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use socket_relay::transport::ServerConnection;
use tokio::sync::mpsc;

use super::connection::WsServer;
use super::frame::Frame;

/// WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, Extension(server): Extension<WsServer>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, server))
}

/// Handle an established WebSocket connection
async fn handle_socket(socket: WebSocket, server: WsServer) {
    // Create unbounded channel for sending frames to this connection
    let (tx, mut rx) = mpsc::unbounded_channel::<Frame>();

    let (mut ws_sender, mut ws_receiver) = socket.split();

    let connection_id = server.register(tx).id().to_string();

    tracing::info!(connection_id = %connection_id, "WebSocket connection opened");

    match Frame::connected(&connection_id).to_text() {
        Ok(text) => {
            if ws_sender.send(Message::Text(text)).await.is_err() {
                tracing::warn!(connection_id = %connection_id, "Failed to send connect frame");
                server.remove(&connection_id);
                return;
            }
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to serialize connect frame");
        }
    }

    // Forward queued frames to the socket
    let send_id = connection_id.clone();
    let mut send_task = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            match frame.to_text() {
                Ok(text) => {
                    if ws_sender.send(Message::Text(text)).await.is_err() {
                        tracing::debug!(connection_id = %send_id, "WebSocket send failed");
                        break;
                    }
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to serialize frame");
                }
            }
        }
    });

    // Handle incoming frames
    let recv_id = connection_id.clone();
    let recv_server = server.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(result) = ws_receiver.next().await {
            match result {
                Ok(Message::Text(text)) => match Frame::parse(&text) {
                    Ok(frame) => {
                        recv_server.deliver(&recv_id, frame);
                    }
                    Err(e) => {
                        tracing::debug!(
                            error = %e,
                            connection_id = %recv_id,
                            "Failed to parse client frame"
                        );
                        if let Some(connection) = recv_server.connection(&recv_id) {
                            let _ = connection.send(Frame::error(e.to_string()));
                        }
                    }
                },
                Ok(Message::Binary(_)) => {
                    tracing::debug!(connection_id = %recv_id, "Received unsupported binary message");
                }
                Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {
                    tracing::trace!(connection_id = %recv_id, "Received ping/pong");
                }
                Ok(Message::Close(_)) => {
                    tracing::debug!(connection_id = %recv_id, "WebSocket close received");
                    break;
                }
                Err(e) => {
                    tracing::debug!(error = %e, connection_id = %recv_id, "WebSocket error");
                    break;
                }
            }
        }
    });

    // Wait for either task to complete, then abort the other
    tokio::select! {
        _ = &mut send_task => {
            tracing::debug!(connection_id = %connection_id, "Send task completed");
            recv_task.abort();
        }
        _ = &mut recv_task => {
            tracing::debug!(connection_id = %connection_id, "Receive task completed");
            send_task.abort();
        }
    }

    server.remove(&connection_id);

    tracing::info!(connection_id = %connection_id, "WebSocket connection closed");
}
