//! CLI module for chat process spawning and line protocol parsing.

mod events;
mod process;
mod stream;

pub use events::*;
pub use process::*;
pub use stream::*;
