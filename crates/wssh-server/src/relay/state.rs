//! Atomic connection state

use std::sync::atomic::{AtomicU8, Ordering};

use wssh_core::ConnectionState;

/// Connection state readable from any task
#[derive(Debug)]
pub struct StateCell(AtomicU8);

impl StateCell {
    pub fn new(state: ConnectionState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    pub fn get(&self) -> ConnectionState {
        ConnectionState::from_u8(self.0.load(Ordering::Acquire)).unwrap_or(ConnectionState::Closed)
    }

    /// Move to `state`, returning the previous one
    pub fn set(&self, state: ConnectionState) -> ConnectionState {
        let previous = ConnectionState::from_u8(self.0.swap(state as u8, Ordering::AcqRel))
            .unwrap_or(ConnectionState::Closed);
        if previous != state {
            tracing::debug!("Connection state {} -> {}", previous, state);
        }
        previous
    }
}

impl Default for StateCell {
    fn default() -> Self {
        Self::new(ConnectionState::Connecting)
    }
}
