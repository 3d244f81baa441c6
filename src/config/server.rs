//! Server and networking configuration types.

use std::time::Duration;

use serde::Deserialize;

/// Errors from configuration loading and validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] ::config::ConfigError),

    #[error("Subscriber #{index} has an empty name")]
    EmptySubscriberName { index: usize },

    #[error("Subscriber '{name}' has an empty address")]
    EmptySubscriberAddress { name: String },

    #[error("Subscriber '{name}' is registered more than once")]
    DuplicateSubscriber { name: String },
}

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to.
    pub host: String,
    /// Port to listen on.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 4005,
        }
    }
}

impl ServerConfig {
    /// `host:port` bind address.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Where a subscriber service finds the relay.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Base URL of the relay, e.g. `http://localhost:4005`.
    pub address: String,
    /// Request timeout for submit and history fetches.
    pub timeout_ms: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            address: "http://localhost:4005".to_string(),
            timeout_ms: 10_000,
        }
    }
}

impl RelayConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}
