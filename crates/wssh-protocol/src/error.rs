//! Protocol error types

use thiserror::Error;

/// Errors that can occur while decoding a single frame
///
/// None of these are fatal to a connection: the offending frame is dropped
/// and the relay keeps reading.
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// Frame had no tag byte
    #[error("Empty frame")]
    EmptyFrame,

    /// Unknown message type
    #[error("Unknown message type: {0}")]
    UnknownMessageType(u8),

    /// Tag is reserved and has no handler
    #[error("Reserved message type {0} has no handler")]
    ReservedMessageType(u8),

    /// Resize payload was not a valid `{"cols", "rows"}` object
    #[error("Invalid resize payload: {0}")]
    InvalidResize(#[from] serde_json::Error),
}

impl ProtocolError {
    /// Whether the error is a classification mismatch rather than a
    /// malformed payload
    pub fn is_unknown_type(&self) -> bool {
        matches!(
            self,
            ProtocolError::UnknownMessageType(_) | ProtocolError::ReservedMessageType(_)
        )
    }
}
