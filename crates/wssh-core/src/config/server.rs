//! WebSocket listener configuration

use serde::{Deserialize, Serialize};

use wssh_protocol::DEFAULT_BUFFER_CAPACITY;

use crate::error::ConfigError;

/// Configuration for the WebSocket side of the relay
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind the HTTP server to
    pub listen_address: String,

    /// Route that upgrades to the terminal WebSocket
    pub path: String,

    /// Capacity of each frame buffer, tag byte included
    pub buffer_capacity: usize,

    /// Idle frame buffers kept per connection
    pub max_idle_buffers: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_address: "0.0.0.0:8022".to_string(),
            path: "/ssh".to_string(),
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            max_idle_buffers: 4,
        }
    }
}

impl ServerConfig {
    /// Check the listener settings
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.path.starts_with('/') {
            return Err(ConfigError::Invalid(format!(
                "server.path must start with '/', got '{}'",
                self.path
            )));
        }
        if self.buffer_capacity < 2 {
            return Err(ConfigError::Invalid(
                "server.buffer_capacity must leave room for a tag and payload".to_string(),
            ));
        }
        Ok(())
    }
}
