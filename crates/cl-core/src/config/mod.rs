//! Configuration management for console-link

mod client;

pub use client::{AbsentOwnerPolicy, ClientConfig};

use crate::error::ConfigError;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// How often the console user is polled
pub const SESSION_POLL_INTERVAL: Duration = Duration::from_millis(1000);

/// How often a connected transport checks that the server socket still exists
pub const SERVER_CHECK_INTERVAL: Duration = Duration::from_millis(3000);

/// Delay between reconnection attempts
pub const RECONNECT_INTERVAL: Duration = Duration::from_millis(1000);

/// Get the default configuration directory
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("console-link")
}

/// Get the default configuration file path
pub fn default_config_path() -> PathBuf {
    default_config_dir().join("config.toml")
}

/// Load configuration from a file
pub fn load_config<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound(path.to_path_buf()));
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::Invalid(format!("Failed to read config: {}", e)))?;

    let config: T = toml::from_str(&content)?;
    tracing::debug!(path = %path.display(), "Loaded configuration");
    Ok(config)
}

/// Save configuration to a file
pub fn save_config<T: serde::Serialize>(path: &Path, config: &T) -> Result<(), ConfigError> {
    let content = toml::to_string_pretty(config)?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| ConfigError::Invalid(format!("Failed to create config dir: {}", e)))?;
    }

    std::fs::write(path, content)
        .map_err(|e| ConfigError::Invalid(format!("Failed to write config: {}", e)))?;

    Ok(())
}
