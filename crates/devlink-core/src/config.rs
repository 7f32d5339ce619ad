//! Configuration management for devlink

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;

/// Default TCP port a device listens on for debug connections.
pub const DEFAULT_DEVICE_PORT: u16 = 5555;

/// Default bound on connection establishment.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Get the default configuration directory
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("devlink")
}

/// Get the default configuration file path
pub fn default_config_path() -> PathBuf {
    default_config_dir().join("config.toml")
}

/// Get the default local package-cache directory
pub fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("devlink")
}

/// Top-level config file, with one section per concern
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    pub session: SessionConfig,
    pub cache: CacheConfig,
}

/// Session establishment settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Port used when an address omits one
    pub default_port: u16,
    /// Bound on connection establishment, in seconds
    pub connect_timeout_secs: u64,
    /// Directory holding the identity-key artifacts (defaults to the
    /// config directory when unset)
    pub data_dir: Option<PathBuf>,
}

impl SessionConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Directory the identity-key artifacts live in.
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(default_config_dir)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            default_port: DEFAULT_DEVICE_PORT,
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT.as_secs(),
            data_dir: None,
        }
    }
}

/// Local package-cache settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Directory swept by the local cache cleaner (defaults to the
    /// platform cache directory when unset)
    pub local_dir: Option<PathBuf>,
}

impl CacheConfig {
    pub fn local_dir(&self) -> PathBuf {
        self.local_dir.clone().unwrap_or_else(default_cache_dir)
    }
}

/// Load configuration from a file
pub fn load_config<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound(path.to_path_buf()));
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::Invalid(format!("failed to read config: {}", e)))?;

    let config: T = toml::from_str(&content)?;
    Ok(config)
}

/// Save configuration to a file
pub fn save_config<T: serde::Serialize>(path: &Path, config: &T) -> Result<(), ConfigError> {
    let content = toml::to_string_pretty(config)?;

    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| ConfigError::Invalid(format!("failed to create config dir: {}", e)))?;
    }

    std::fs::write(path, content)
        .map_err(|e| ConfigError::Invalid(format!("failed to write config: {}", e)))?;

    Ok(())
}
