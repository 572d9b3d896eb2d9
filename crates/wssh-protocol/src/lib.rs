//! wssh-protocol: Wire protocol for the wssh terminal relay
//!
//! This crate defines the binary frame format exchanged between the browser
//! terminal and the relay over a WebSocket, and the buffer pool used to
//! build frames without per-frame allocation.

pub mod error;
pub mod frame;
pub mod message;
pub mod pool;

pub use error::ProtocolError;
pub use frame::{Frame, MessageType, TAG_SIZE};
pub use message::{Heartbeat, Message, TerminalSize, PING, PONG};
pub use pool::{BufferPool, PooledBuffer, DEFAULT_BUFFER_CAPACITY};
