//! Session traits

use async_trait::async_trait;
use std::fmt;

use crate::error::SessionError;
use wssh_protocol::TerminalSize;

/// Lifecycle state of one relayed connection
///
/// `Connecting → Active → Closing → Closed`, or `Connecting → Closed` when
/// the SSH session cannot be opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ConnectionState {
    /// SSH session is being opened
    Connecting = 0,
    /// Pumps are running
    Active = 1,
    /// Shutdown has been triggered
    Closing = 2,
    /// Everything is released; no further I/O
    Closed = 3,
}

impl ConnectionState {
    /// Convert from the raw representation
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Connecting),
            1 => Some(Self::Active),
            2 => Some(Self::Closing),
            3 => Some(Self::Closed),
            _ => None,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Connecting => "connecting",
            ConnectionState::Active => "active",
            ConnectionState::Closing => "closing",
            ConnectionState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// An authenticated remote shell session with an allocated PTY
///
/// Reads and writes may run concurrently from different tasks: the output
/// and input streams are independent channels. After [`close`](Self::close)
/// every pending and future call returns promptly, reads with `Ok(0)`, the
/// others with [`SessionError::Closed`].
#[async_trait]
pub trait RemoteSession: Send + Sync {
    /// Read combined stdout/stderr into `buf`
    /// Returns `Ok(0)` at end of stream
    async fn read(&self, buf: &mut [u8]) -> Result<usize, SessionError>;

    /// Write all of `data` to the shell's stdin
    async fn write(&self, data: &[u8]) -> Result<(), SessionError>;

    /// Change the PTY geometry
    async fn resize(&self, size: TerminalSize) -> Result<(), SessionError>;

    /// Start the login shell on the PTY
    async fn start_shell(&self) -> Result<(), SessionError>;

    /// Wait for the remote process to exit
    /// Returns the exit status if the server reported one
    async fn wait(&self) -> Result<Option<u32>, SessionError>;

    /// Close the session and its connection
    ///
    /// Idempotent, never fails; only the first call does any work.
    async fn close(&self);
}
