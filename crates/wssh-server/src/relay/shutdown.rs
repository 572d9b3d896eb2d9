//! One-shot shutdown signal shared by the pumps of a connection

use std::sync::atomic::{AtomicBool, Ordering};

use tokio_util::sync::CancellationToken;

/// Trips exactly once; every task can wait on it
#[derive(Debug, Default)]
pub struct ShutdownSignal {
    tripped: AtomicBool,
    token: CancellationToken,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Trip the signal. Returns true only for the call that tripped it.
    pub fn trip(&self) -> bool {
        let won = self
            .tripped
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if won {
            self.token.cancel();
        }
        won
    }

    pub fn is_tripped(&self) -> bool {
        self.tripped.load(Ordering::Acquire)
    }

    /// Resolves once the signal has been tripped
    pub async fn tripped(&self) {
        self.token.cancelled().await
    }
}
