//! Relay server configuration

use anyhow::{Context, Result};
use socket_relay_config::{CommonConfig, RelayConfig, ServerConfig};
use std::net::SocketAddr;
use tracing_subscriber::EnvFilter;

/// Relay server configuration loaded from environment variables
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Common configuration shared with other services
    pub common: CommonConfig,

    /// Listener address
    pub server: ServerConfig,

    /// Relay channel and provenance settings
    pub relay: RelayConfig,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            common: CommonConfig::from_env().context("Failed to load common configuration")?,
            server: ServerConfig::from_env().context("Failed to load server configuration")?,
            relay: RelayConfig::from_env().context("Failed to load relay configuration")?,
        })
    }

    pub fn socket_addr(&self) -> Result<SocketAddr> {
        self.server
            .socket_addr()
            .context("Failed to build listen address")
    }

    pub fn is_production(&self) -> bool {
        self.common.environment.is_production()
    }

    /// Tracing filter from `RUST_LOG`, then `LOG_LEVEL`; an unparsable
    /// directive falls back to `info`
    pub fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_new(&self.common.log_level).unwrap_or_else(|_| EnvFilter::new("info"))
    }
}
