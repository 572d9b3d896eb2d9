//! Message-oriented socket seams
//!
//! The engine only needs "send one binary message" and "receive one binary
//! message". Keeping these behind traits lets the relay run over axum's
//! WebSocket in production and over plain channels in tests.

use async_trait::async_trait;
use bytes::BytesMut;

use crate::relay::RelayError;

/// Sending half of a message socket
///
/// Shared between the outbound pump and heartbeat replies; implementations
/// serialize concurrent senders so frames never interleave.
#[async_trait]
pub trait FrameSink: Send + Sync {
    /// Send one binary message
    async fn send_frame(&self, frame: &[u8]) -> Result<(), RelayError>;

    /// Close the socket; later calls are no-ops
    async fn close(&self);
}

/// Receiving half of a message socket
#[async_trait]
pub trait FrameSource: Send {
    /// Receive one message into `dst`, replacing its contents
    ///
    /// Returns `Ok(false)` when the peer closed the socket.
    async fn recv_frame(&mut self, dst: &mut BytesMut) -> Result<bool, RelayError>;
}
