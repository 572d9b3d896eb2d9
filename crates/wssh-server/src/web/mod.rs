//! WebSocket front end

mod listener;
mod socket;

pub use listener::RelayServer;
pub use socket::{split, WebSocketSink, WebSocketSource};
