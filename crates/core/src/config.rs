//! Mesh configuration loader.

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    NotFound(String),

    #[error("Config file is empty")]
    Empty,

    #[error("Invalid YAML: {0}")]
    Invalid(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Top-level mesh configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MeshConfig {
    #[serde(default)]
    pub agents: AgentsConfig,
}

/// Agent subsystem configuration.
///
/// The poll interval and history capacity are fixed constants, not config.
#[derive(Debug, Clone, Deserialize)]
pub struct AgentsConfig {
    /// Gate on orchestrator initialization.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Default timeout for the orchestrator's awaitable task execution.
    #[serde(default = "default_task_timeout_ms")]
    pub task_timeout_ms: u64,
}

fn default_enabled() -> bool {
    true
}

fn default_task_timeout_ms() -> u64 {
    5000
}

impl Default for AgentsConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            task_timeout_ms: default_task_timeout_ms(),
        }
    }
}

impl AgentsConfig {
    pub fn task_timeout(&self) -> Duration {
        Duration::from_millis(self.task_timeout_ms)
    }
}

impl MeshConfig {
    /// Load configuration from a YAML file.
    ///
    /// # Errors
    /// Returns an error if the file is missing, empty, or not valid YAML.
    pub fn load(config_path: &str) -> Result<Self, ConfigError> {
        let config_file = Path::new(config_path);

        if !config_file.exists() {
            return Err(ConfigError::NotFound(config_path.to_string()));
        }

        let content = std::fs::read_to_string(config_file)?;

        if content.trim().is_empty() {
            return Err(ConfigError::Empty);
        }

        serde_yaml::from_str(&content).map_err(|e| ConfigError::Invalid(e.to_string()))
    }
}
