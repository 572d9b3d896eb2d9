//! Core error types for wssh

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Errors from opening or driving a remote SSH session
#[derive(Error, Debug)]
pub enum SessionError {
    /// Credentials or private key were rejected or unusable
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Host unreachable or transport failure
    #[error("Failed to connect to {address}: {message}")]
    Dial { address: String, message: String },

    /// Connect or handshake exceeded the configured bound
    #[error("Connection timed out after {0:?}")]
    Timeout(Duration),

    /// Server host key did not match the configured fingerprint
    #[error("Host key verification failed: expected {expected}, got {actual}")]
    HostKeyRejected { expected: String, actual: String },

    /// PTY allocation or resize failed
    #[error("PTY request failed: {0}")]
    Pty(String),

    /// Remote side refused to start the shell
    #[error("Shell request failed: {0}")]
    Shell(String),

    /// Session channel is closed (end of stream)
    #[error("Session closed")]
    Closed,

    /// Configuration was rejected before dialing
    #[error("Invalid session config: {0}")]
    InvalidConfig(#[from] ConfigError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SessionError {
    /// Whether the error means the session can no longer be used
    pub fn is_closed(&self) -> bool {
        matches!(self, SessionError::Closed | SessionError::Io(_))
    }
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file not found
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    /// Invalid configuration
    #[error("Invalid config: {0}")]
    Invalid(String),

    /// TOML parse error
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// Missing required field
    #[error("Missing required field: {0}")]
    MissingField(String),
}
