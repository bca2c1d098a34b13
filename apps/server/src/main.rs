use std::sync::Arc;

use socket_relay::ServerRelay;
use socket_relay_server::{app, handlers::demo_handlers, Config, WsServer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config = Config::from_env()?;

    // Initialize tracing
    tracing_subscriber::registry()
        .with(config.env_filter())
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(
        environment = %config.common.environment,
        event = %config.relay.event_name,
        "Configuration loaded"
    );

    let server = WsServer::new();
    ServerRelay::new(Arc::new(server.clone()), config.relay.server_options())
        .listen(demo_handlers::<WsServer>());

    let addr = config.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!("Listening on {}", addr);
    tracing::info!("WebSocket endpoint available at ws://{}/ws", addr);

    axum::serve(listener, app(server)).await?;

    Ok(())
}
