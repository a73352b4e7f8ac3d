//! User configuration (~/.wrap/config.toml)

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Environment variable overriding the wrap home directory
pub const HOME_ENV: &str = "WRAP_HOME";

/// Configuration file name inside the wrap home directory
pub const CONFIG_FILE: &str = "config.toml";

/// Errors that can occur while loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read or write the configuration file
    #[error("Failed to access configuration file: {0}")]
    IoError(#[from] std::io::Error),

    /// Failed to parse TOML
    #[error("Failed to parse configuration: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Failed to serialize configuration
    #[error("Failed to serialize configuration: {0}")]
    SerializeError(String),

    /// Neither WRAP_HOME nor a home directory is available
    #[error("Could not determine the wrap home directory")]
    NoHomeDirectory,
}

/// Wrap configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// System repository directory (defaults to `<wrap home>/wraps`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_repository: Option<PathBuf>,

    /// Name of the project repository directory next to the descriptor
    pub project_repository: String,

    /// Whether the project repository writes `anchors.toml`; the system
    /// repository never does
    pub anchoring: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            system_repository: None,
            project_repository: "wraps".to_string(),
            anchoring: true,
        }
    }
}

impl Config {
    /// Wrap home directory: `$WRAP_HOME`, else `~/.wrap`
    pub fn home_dir() -> Result<PathBuf, ConfigError> {
        if let Some(home) = std::env::var_os(HOME_ENV) {
            return Ok(PathBuf::from(home));
        }
        let home = dirs::home_dir().ok_or(ConfigError::NoHomeDirectory)?;
        Ok(home.join(".wrap"))
    }

    /// Load the configuration from the wrap home directory
    ///
    /// A missing configuration file yields the defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::home_dir()?.join(CONFIG_FILE);
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::from_file(&path)
    }

    /// Parse a configuration file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Parse configuration from a string
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Write the configuration to a file
    pub fn to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Resolved system repository directory
    pub fn system_repository_path(&self) -> Result<PathBuf, ConfigError> {
        match self.system_repository {
            Some(ref path) => Ok(path.clone()),
            None => Ok(Self::home_dir()?.join("wraps")),
        }
    }
}
