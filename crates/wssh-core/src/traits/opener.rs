//! Session opener trait

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::SessionError;
use crate::traits::RemoteSession;

/// Produces a fresh remote session for each relayed connection
///
/// Implementations either return a fully established session (connected,
/// authenticated, PTY allocated) or an error; never a half-open one.
#[async_trait]
pub trait SessionOpener: Send + Sync {
    /// Open one session
    async fn open(&self) -> Result<Arc<dyn RemoteSession>, SessionError>;

    /// Human-readable target for log messages
    fn target(&self) -> String;
}
