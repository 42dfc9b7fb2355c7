//! An out-of-the-box conversational assistant core that assembles the
//! orchestrator, a chat backend and a set of built-in tools.
//!
//! The crate includes a CLI for chatting with a local Ollama server in
//! the terminal. You can also use it as a library to bring the chat
//! functionality into your own host apps.

#![deny(missing_docs)]

#[allow(unused_imports)]
#[macro_use]
extern crate tracing;

mod session;
pub mod tools;

pub use session::{Session, SessionBuilder};

/// Re-exports of [`glimpse_core`] crate.
pub mod core {
    pub use glimpse_core::*;
}
