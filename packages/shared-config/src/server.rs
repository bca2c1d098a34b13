//! Listener configuration for the relay server

use crate::{get_env_or_default, parse_env, ConfigError, ConfigResult};
use std::net::SocketAddr;

/// HTTP/WebSocket listener configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Interface to bind
    pub host: String,

    /// Port to bind
    pub port: u16,
}

impl ServerConfig {
    /// Load server configuration from environment variables
    pub fn from_env() -> ConfigResult<Self> {
        Ok(Self {
            host: get_env_or_default("HOST", "0.0.0.0"),
            port: parse_env("PORT", 8080)?,
        })
    }

    /// Socket address to bind
    pub fn socket_addr(&self) -> ConfigResult<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| ConfigError::InvalidValue("HOST".to_string(), format!("{}", e)))
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 8080);
        assert_eq!(config.socket_addr().unwrap().port(), 8080);
    }

    #[test]
    fn test_from_env() {
        temp_env::with_vars([("HOST", Some("127.0.0.1")), ("PORT", Some("9000"))], || {
            let config = ServerConfig::from_env().unwrap();
            assert_eq!(config.socket_addr().unwrap().to_string(), "127.0.0.1:9000");
        });
    }

    #[test]
    fn test_invalid_port() {
        temp_env::with_var("PORT", Some("eighty"), || {
            assert!(ServerConfig::from_env().is_err());
        });
    }

    #[test]
    fn test_invalid_host() {
        let config = ServerConfig {
            host: "not a host".to_string(),
            port: 1,
        };
        assert!(matches!(
            config.socket_addr(),
            Err(ConfigError::InvalidValue(name, _)) if name == "HOST"
        ));
    }
}
