//! Relay configuration types

use crate::{get_env_or_default, ConfigError, ConfigResult};
use socket_relay::action_types::DISPATCH_EVENT;
use socket_relay::{DispatchedBy, ServerOptions};

/// Relay channel configuration
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Transport event name that carries relayed actions
    pub event_name: String,

    /// Provenance tag stamped on actions the server sends
    pub server_tag: Option<String>,
}

impl RelayConfig {
    /// Load relay configuration from environment variables
    pub fn from_env() -> ConfigResult<Self> {
        let config = Self {
            event_name: get_env_or_default("RELAY_EVENT_NAME", DISPATCH_EVENT),
            server_tag: std::env::var("RELAY_SERVER_TAG")
                .ok()
                .filter(|s| !s.is_empty()),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.event_name.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "RELAY_EVENT_NAME must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Options for a server relay on this channel
    pub fn server_options(&self) -> ServerOptions {
        let options = ServerOptions::new().with_event_name(self.event_name.clone());
        match &self.server_tag {
            Some(tag) => options.with_dispatched_by(DispatchedBy::from(tag.as_str())),
            None => options,
        }
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            event_name: DISPATCH_EVENT.to_string(),
            server_tag: None,
        }
    }
}
