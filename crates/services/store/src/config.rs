//! Configuration for the store API
//!
//! Configuration can be loaded from a TOML file and/or environment variables.
//! Environment variables override values from the file.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::hub::HubConfig;

/// Main configuration for the store API
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// WebSocket subscriber delivery
    #[serde(default)]
    pub subscribers: SubscriberConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// HTTP port
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite database file, or `:memory:`
    #[serde(default = "default_database_path")]
    pub path: String,
}

fn default_database_path() -> String {
    "roadwatch.db".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
        }
    }
}

/// Subscriber delivery configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriberConfig {
    /// How long one broadcast waits on a single subscriber, in milliseconds
    #[serde(default = "default_send_timeout_ms")]
    pub send_timeout_ms: u64,

    /// Payloads buffered per subscriber before sends start waiting
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

fn default_send_timeout_ms() -> u64 {
    2000
}

fn default_queue_capacity() -> usize {
    64
}

impl Default for SubscriberConfig {
    fn default() -> Self {
        Self {
            send_timeout_ms: default_send_timeout_ms(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

impl SubscriberConfig {
    pub fn hub_config(&self) -> HubConfig {
        HubConfig {
            send_timeout: Duration::from_millis(self.send_timeout_ms),
            queue_capacity: self.queue_capacity.max(1),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::Io(e.to_string()))?;
        let config: Config =
            toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        Ok(config)
    }

    /// Load configuration from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        Config::default().with_env_overrides()
    }

    /// Load configuration from file if it exists, then apply environment overrides
    pub fn load<P: AsRef<Path>>(path: Option<P>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(p) if p.as_ref().exists() => Self::from_file(p)?,
            _ => return Ok(Self::from_env()),
        };
        Ok(config.with_env_overrides())
    }

    /// Bind address for the HTTP server
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    fn with_env_overrides(mut self) -> Self {
        // Server
        if let Ok(host) = std::env::var("STORE_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("STORE_PORT") {
            if let Ok(p) = port.parse() {
                self.server.port = p;
            }
        }

        // Database
        if let Ok(path) = std::env::var("STORE_DATABASE_PATH") {
            self.database.path = path;
        }

        // Subscribers
        if let Ok(timeout) = std::env::var("STORE_SUBSCRIBER_TIMEOUT_MS") {
            if let Ok(t) = timeout.parse() {
                self.subscribers.send_timeout_ms = t;
            }
        }

        self
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("Parse error: {0}")]
    Parse(String),
}
