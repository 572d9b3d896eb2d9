//! wssh-core: Core abstractions and configuration for wssh
//!
//! This crate provides the configuration structures, error types and
//! session traits shared by the relay engine and the SSH session factory.

pub mod config;
pub mod error;
pub mod traits;

pub use config::WsshConfig;
pub use error::{ConfigError, SessionError};
pub use traits::{ConnectionState, RemoteSession, SessionOpener};
