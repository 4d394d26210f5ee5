//! Supervisor module for chat session lifecycle and state management.

mod listener;
mod observer;
mod runner;
mod session;
mod state;

pub use listener::*;
pub use observer::*;
pub use runner::*;
pub use session::*;
pub use state::*;
