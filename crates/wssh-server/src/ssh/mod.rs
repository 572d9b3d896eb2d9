//! SSH side of the relay

mod factory;
mod session;

pub use factory::{ClientHandler, SessionFactory};
pub use session::SshSession;
