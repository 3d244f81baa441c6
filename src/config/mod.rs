//! Application configuration.
//!
//! Aggregates configuration from all modules into a single Config struct
//! that can be loaded from YAML files or environment variables.

mod delivery;
mod server;

use std::collections::HashSet;

use serde::Deserialize;

pub use delivery::{DeliveryConfig, DeliveryMode, SubscriberEndpoint};
pub use server::{ConfigError, RelayConfig, ServerConfig};

use crate::projectors::ProjectionConfig;
use crate::storage::StorageConfig;

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";
/// Environment variable for configuration file path.
pub const CONFIG_ENV_VAR: &str = "EVENTRELAY_CONFIG";
/// Prefix for configuration environment variables.
pub const CONFIG_ENV_PREFIX: &str = "EVENTRELAY";
/// Environment variable for logging configuration.
pub const LOG_ENV_VAR: &str = "EVENTRELAY_LOG";
/// Environment variable selecting the log format (`json` or text).
pub const LOG_FORMAT_ENV_VAR: &str = "EVENTRELAY_LOG_FORMAT";

/// Main application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP server configuration.
    pub server: ServerConfig,
    /// Event log configuration (relay only).
    pub storage: StorageConfig,
    /// Subscriber registry, in delivery order (relay only).
    pub subscribers: Vec<SubscriberEndpoint>,
    /// Fan-out behaviour (relay only).
    pub delivery: DeliveryConfig,
    /// Relay location (subscriber services only).
    pub relay: RelayConfig,
    /// View folding behaviour (subscriber services only).
    pub projection: ProjectionConfig,
}

impl Config {
    /// Load configuration from file and environment.
    ///
    /// Configuration sources (in order of priority, later overrides earlier):
    /// 1. `config.yaml` in current directory (if exists)
    /// 2. File specified by `path` argument (if provided)
    /// 3. File specified by `CONFIG_ENV_VAR` environment variable (if set)
    /// 4. Environment variables with `CONFIG_ENV_PREFIX` prefix
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        use ::config::{Config as ConfigLib, Environment, File, FileFormat};

        let mut builder = ConfigLib::builder()
            .add_source(File::new(DEFAULT_CONFIG_FILE, FileFormat::Yaml).required(false));

        if let Some(config_path) = path {
            builder = builder.add_source(File::new(config_path, FileFormat::Yaml).required(true));
        }

        if let Ok(config_path) = std::env::var(CONFIG_ENV_VAR) {
            builder = builder.add_source(File::new(&config_path, FileFormat::Yaml).required(true));
        }

        let config: Config = builder
            .add_source(
                Environment::with_prefix(CONFIG_ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    /// Check the subscriber registry for empty or duplicate entries.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        for (index, subscriber) in self.subscribers.iter().enumerate() {
            if subscriber.name.trim().is_empty() {
                return Err(ConfigError::EmptySubscriberName { index });
            }
            if subscriber.address.trim().is_empty() {
                return Err(ConfigError::EmptySubscriberAddress {
                    name: subscriber.name.clone(),
                });
            }
            if !seen.insert(subscriber.name.as_str()) {
                return Err(ConfigError::DuplicateSubscriber {
                    name: subscriber.name.clone(),
                });
            }
        }
        Ok(())
    }

    /// Create config for testing.
    pub fn for_test() -> Self {
        Self::default()
    }
}
