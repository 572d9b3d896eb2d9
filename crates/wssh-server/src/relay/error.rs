//! Relay error types

use thiserror::Error;

use wssh_protocol::ProtocolError;

/// Errors surfaced by the relay pumps
#[derive(Error, Debug)]
pub enum RelayError {
    /// WebSocket transport failed
    #[error("WebSocket error: {0}")]
    Socket(String),

    /// Inbound frame could not be decoded
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}
