//! Core logic of the conversation: the orchestrator state machine, the
//! stream decoder, tool dispatch, and the supporting state types.

#![deny(missing_docs)]
#![deny(clippy::missing_safety_doc)]

#[macro_use]
extern crate tracing;

mod backend_client;
pub mod conversation;
mod decoder;
mod dispatch;
mod epoch;
mod error;
mod orchestrator;
pub mod thinking;
pub mod tool;

pub use epoch::{Epoch, EpochTracker};
pub use error::{ChatError, ErrorKind};
pub use orchestrator::{Orchestrator, OrchestratorBuilder};
