//! Configuration management

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Client configuration
    pub client: Option<ClientConfig>,
    /// Server configuration
    pub server: Option<ServerConfig>,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, crate::Error> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| crate::Error::Config(format!("Failed to read config: {}", e)))?;

        toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))
    }
}

/// Client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Remote server address (host:port)
    pub server: String,
    /// Local SOCKS5 listen address
    pub local_listen: String,
    /// Tunnel password
    #[serde(default)]
    pub password: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server: String::new(),
            local_listen: "127.0.0.1:1080".to_string(),
            password: String::new(),
        }
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen address
    pub listen: String,
    /// Tunnel password
    #[serde(default)]
    pub password: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:8388".to_string(),
            password: String::new(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_client_section() {
        let config: Config = toml::from_str(
            r#"
            [client]
            server = "example.com:8388"
            local_listen = "127.0.0.1:1080"
            password = "hunter2"
            "#,
        )
        .unwrap();

        let client = config.client.unwrap();
        assert_eq!(client.server, "example.com:8388");
        assert_eq!(client.password, "hunter2");
        assert!(config.server.is_none());
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_parse_server_section() {
        let config: Config = toml::from_str(
            r#"
            [server]
            listen = "0.0.0.0:8388"
            password = "hunter2"

            [logging]
            level = "debug"
            "#,
        )
        .unwrap();

        let server = config.server.unwrap();
        assert_eq!(server.listen, "0.0.0.0:8388");
        assert_eq!(config.logging.level, "debug");
    }
}
