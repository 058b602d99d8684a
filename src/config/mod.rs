//! Application configuration.
//!
//! Supports YAML file and environment variable overrides.

use serde::Deserialize;
use std::time::Duration;

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";
/// Environment variable for configuration file path.
pub const CONFIG_ENV_VAR: &str = "ENTITY_SAGA_CONFIG";
/// Prefix for configuration environment variables.
pub const CONFIG_ENV_PREFIX: &str = "ENTITY_SAGA";
/// Environment variable for logging configuration.
pub const LOG_ENV_VAR: &str = "ENTITY_SAGA_LOG";

/// Default saga name used in tracing spans.
pub const DEFAULT_SAGA_NAME: &str = "entity-saga";

/// Errors that can occur while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("configuration error: {0}")]
    Load(#[from] ::config::ConfigError),
}

/// Main application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Orchestrator settings.
    pub saga: SagaSettings,
    /// Host action bus settings.
    pub bus: BusSettings,
}

/// Orchestrator settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SagaSettings {
    /// Name recorded on every invocation span.
    pub name: String,
    /// Cancel an invocation after this many milliseconds. None = no timeout.
    pub timeout_ms: Option<u64>,
}

impl Default for SagaSettings {
    fn default() -> Self {
        Self {
            name: DEFAULT_SAGA_NAME.to_string(),
            timeout_ms: None,
        }
    }
}

impl SagaSettings {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

/// Channel action bus settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BusSettings {
    /// Broadcast channel capacity.
    pub capacity: usize,
}

impl Default for BusSettings {
    fn default() -> Self {
        Self {
            capacity: crate::bus::channel::DEFAULT_CHANNEL_CAPACITY,
        }
    }
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

        let config = builder
            .add_source(
                Environment::with_prefix(CONFIG_ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(config.try_deserialize()?)
    }

    /// Create config for testing.
    pub fn for_test() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests;
