//! wssh-server: WebSocket-to-SSH terminal relay
//!
//! Each WebSocket connection accepted by the [`web`] front end gets one
//! [`relay::RelayEngine`], which opens an SSH session through the
//! [`ssh::SessionFactory`] and pumps terminal traffic both ways until
//! either side goes away.

pub mod relay;
pub mod ssh;
pub mod web;

pub use relay::{RelayEngine, RelayError, ShutdownSignal};
pub use ssh::{SessionFactory, SshSession};
pub use web::RelayServer;
