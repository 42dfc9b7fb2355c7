//! An abstraction layer for local chat-model backends.
//!
//! This crate establishes an unified protocol for the orchestrator to
//! talk to a streaming chat backend, so that the conversation core can
//! seamlessly switch between transports (a local Ollama server, a fake
//! scripted backend in tests, etc.) without modifying its own code.
//!
//! Types in this crate don't define any behavior, instead they are the
//! constraints that the implementors should adhere to.

#![deny(missing_docs)]

mod backend;
mod chunk;
mod error;
mod message;

pub use backend::*;
pub use chunk::*;
pub use error::*;
pub use message::*;
