//! Configuration for the agent
//!
//! Configuration can be loaded from a TOML file and/or environment variables.
//! Environment variables override values from the file.

use roadwatch_core::SourceConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration for the agent
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Recorded data replay
    #[serde(default)]
    pub source: SourceSection,

    /// Store API connection
    #[serde(default)]
    pub store: StoreSection,

    #[serde(default)]
    pub classifier: ClassifierConfig,
}

/// Recorded data replay configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceSection {
    /// Accelerometer CSV (`x,y,z`)
    #[serde(default = "default_accelerometer_path")]
    pub accelerometer_path: PathBuf,

    /// GPS CSV (`latitude,longitude`)
    #[serde(default = "default_gps_path")]
    pub gps_path: PathBuf,

    /// Samples per batch
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Pause after each sample, in milliseconds
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
}

fn default_accelerometer_path() -> PathBuf {
    PathBuf::from("data/accelerometer.csv")
}

fn default_gps_path() -> PathBuf {
    PathBuf::from("data/gps.csv")
}

fn default_batch_size() -> usize {
    roadwatch_core::source::DEFAULT_BATCH_SIZE
}

fn default_delay_ms() -> u64 {
    roadwatch_core::source::DEFAULT_SAMPLE_DELAY.as_millis() as u64
}

impl Default for SourceSection {
    fn default() -> Self {
        Self {
            accelerometer_path: default_accelerometer_path(),
            gps_path: default_gps_path(),
            batch_size: default_batch_size(),
            delay_ms: default_delay_ms(),
        }
    }
}

/// Store API connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSection {
    /// Base URL of the store API
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

fn default_base_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_timeout_seconds() -> u64 {
    roadwatch_http::DEFAULT_TIMEOUT.as_secs()
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

impl StoreSection {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

/// Road state labelling configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Largest deviation of `z` from rest that still counts as a smooth road
    #[serde(default = "default_bump_threshold")]
    pub bump_threshold: i32,
}

fn default_bump_threshold() -> i32 {
    crate::classifier::DEFAULT_BUMP_THRESHOLD
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            bump_threshold: default_bump_threshold(),
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

    /// Replay source settings
    pub fn source_config(&self) -> SourceConfig {
        SourceConfig::new(&self.source.accelerometer_path, &self.source.gps_path)
            .with_batch_size(self.source.batch_size)
            .with_sample_delay(Duration::from_millis(self.source.delay_ms))
    }

    fn with_env_overrides(mut self) -> Self {
        // Source
        if let Ok(path) = std::env::var("AGENT_ACCELEROMETER_FILE") {
            self.source.accelerometer_path = PathBuf::from(path);
        }
        if let Ok(path) = std::env::var("AGENT_GPS_FILE") {
            self.source.gps_path = PathBuf::from(path);
        }
        if let Ok(size) = std::env::var("AGENT_BATCH_SIZE") {
            if let Ok(s) = size.parse() {
                self.source.batch_size = s;
            }
        }
        if let Ok(delay) = std::env::var("AGENT_DELAY_MS") {
            if let Ok(d) = delay.parse() {
                self.source.delay_ms = d;
            }
        }

        // Store
        if let Ok(url) = std::env::var("STORE_API_URL") {
            self.store.base_url = url;
        }

        // Classifier
        if let Ok(threshold) = std::env::var("AGENT_BUMP_THRESHOLD") {
            if let Ok(t) = threshold.parse() {
                self.classifier.bump_threshold = t;
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
