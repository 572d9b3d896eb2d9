//! Configuration management for wssh

mod server;
mod ssh;
pub mod serde_utils;

pub use server::ServerConfig;
pub use ssh::{AuthMethod, HostKeyPolicy, SshConfig};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

/// Complete wssh configuration
///
/// Mirrors the layout of `config.toml`:
///
/// ```toml
/// [ssh]
/// host = "localhost"
/// port = 22
/// user = "root"
///
/// [server]
/// listen_address = "0.0.0.0:8022"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WsshConfig {
    /// SSH target and credentials
    pub ssh: SshConfig,
    /// WebSocket listener
    pub server: ServerConfig,
}

impl WsshConfig {
    /// Validate every section
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.ssh.validate()?;
        self.server.validate()
    }
}

/// Get the default configuration directory
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("wssh")
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
    Ok(config)
}
