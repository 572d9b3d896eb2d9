//! Relay engine: pumps, shutdown coordination and socket seams

mod engine;
mod error;
mod pump;
mod shutdown;
mod socket;
mod state;

pub use engine::RelayEngine;
pub use error::RelayError;
pub use shutdown::ShutdownSignal;
pub use socket::{FrameSink, FrameSource};
pub use state::StateCell;
