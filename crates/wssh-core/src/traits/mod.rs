//! Core trait definitions

mod opener;
mod session;

pub use opener::SessionOpener;
pub use session::{ConnectionState, RemoteSession};
