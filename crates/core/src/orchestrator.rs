//! The top-level conversation state machine.

mod builder;
pub(crate) mod state;
#[cfg(test)]
mod tests;

use std::sync::Arc;

use glimpse_backend::{ChatMessage, ChatRequest};

pub use builder::OrchestratorBuilder;
use builder::Config;
use state::StateHandle;

use crate::backend_client::BackendClient;
use crate::conversation::{DisplayMessage, ToolUsage};
use crate::decoder::{self, StreamOutcome};
use crate::dispatch::{self, BatchOutcome, Dispatcher};
use crate::epoch::Epoch;
use crate::error::ChatError;
use crate::tool::{ActionHooks, ConsentProvider, Registry};

struct Inner {
    client: BackendClient,
    registry: Registry,
    consent: Option<Box<dyn ConsentProvider>>,
    hooks: Option<Box<dyn ActionHooks>>,
    config: Config,
    state: StateHandle,
}

/// The conversation orchestrator.
///
/// Owns the authoritative history and the display list, drives the
/// stream-decode / tool-dispatch loop, and exposes the user-facing
/// operations (`submit`, `cancel`, `regenerate_last`, `clear`).
///
/// Cloning is cheap; all clones share the same conversation. Every
/// user operation bumps the request epoch, and any in-flight work
/// started under an older epoch silently discards its results.
#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<Inner>,
}

impl Orchestrator {
    /// Submits a user message and runs the turn to completion.
    ///
    /// Whitespace-only input is ignored, as is a submission while a
    /// turn is already in flight. The future resolves when the turn
    /// reaches a terminal state (committed, failed, or stale).
    pub async fn submit<S: Into<String>>(&self, text: S) {
        let text = text.into();
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        let Some(epoch) = self.begin_turn(Some(text)) else {
            trace!("submission ignored, a turn is already in flight");
            return;
        };
        self.run_turn(epoch).await;
    }

    /// Cancels the in-flight turn, if any.
    ///
    /// Synchronous and immediate: the conversation returns to idle at
    /// once. The underlying backend call is not aborted; whatever it
    /// still produces is discarded as stale.
    pub fn cancel(&self) {
        let state = &self.inner.state;
        let mut shared = state.lock();
        if !shared.sending {
            return;
        }
        state.epochs().bump();
        shared.sending = false;
        shared.last_error = None;
        shared.pending_activity = None;
        shared.tool_usage.in_progress = false;
        shared.display.drop_streaming();
    }

    /// Regenerates the response to the most recent user message.
    ///
    /// Only valid while idle and when the history contains a user
    /// turn; otherwise a no-op. The history is truncated back to that
    /// user message and the turn is resubmitted without appending a
    /// duplicate.
    pub async fn regenerate_last(&self) {
        let Some(epoch) = self.begin_turn(None) else {
            return;
        };
        self.run_turn(epoch).await;
    }

    /// Empties the conversation unconditionally.
    pub fn clear(&self) {
        let mut shared = self.inner.state.lock();
        shared.history.clear();
        shared.display.clear();
        shared.last_error = None;
        shared.pending_activity = None;
        shared.tool_usage = ToolUsage::default();
    }

    /// Returns a snapshot of the authoritative history.
    pub fn history(&self) -> Vec<ChatMessage> {
        self.inner.state.lock().history.messages().to_vec()
    }

    /// Returns a snapshot of the display list.
    #[inline]
    pub fn display_messages(&self) -> Vec<DisplayMessage> {
        self.inner.state.display_snapshot()
    }

    /// Whether a turn is currently in flight.
    #[inline]
    pub fn is_sending(&self) -> bool {
        self.inner.state.lock().sending
    }

    /// The most recent turn failure, if the turn after it has not
    /// started yet.
    pub fn last_error(&self) -> Option<String> {
        self.inner.state.lock().last_error.clone()
    }

    /// Returns a snapshot of the tool usage indicator.
    #[inline]
    pub fn tool_usage(&self) -> ToolUsage {
        self.inner.state.tool_usage_snapshot()
    }

    /// Whether `regenerate_last` would do anything right now.
    pub fn can_regenerate(&self) -> bool {
        let shared = self.inner.state.lock();
        !shared.sending && shared.history.has_user_turn()
    }

    /// Transitions into the sending state and returns the new epoch.
    ///
    /// With `user_text` the turn is a fresh submission; without it the
    /// history is truncated back to the last user message instead
    /// (regenerate). Returns `None` when the transition is invalid.
    fn begin_turn(&self, user_text: Option<&str>) -> Option<Epoch> {
        let state = &self.inner.state;
        let mut shared = state.lock();
        if shared.sending {
            return None;
        }
        match user_text {
            Some(text) => {
                let message = ChatMessage::user(text);
                shared.history.push(message.clone());
                shared.display.push_message(message);
            }
            None => {
                shared.history.truncate_to_last_user()?;
                shared.display.truncate_to_last_user();
            }
        }
        // The epoch moves under the state lock, so no stale
        // continuation can slip in between the bump and the reset.
        let epoch = state.epochs().bump();
        shared.last_error = None;
        shared.pending_activity = None;
        shared.tool_usage = ToolUsage::default();
        shared.display.drop_streaming();
        shared.sending = true;
        Some(epoch)
    }

    async fn run_turn(&self, epoch: Epoch) {
        if let Err(err) = self.drive(epoch).await {
            self.inner.state.fail_turn(epoch, &err);
        }
    }

    /// The stream-decode / tool-dispatch loop for one turn.
    async fn drive(&self, epoch: Epoch) -> Result<(), ChatError> {
        let Some(history) = self.inner.state.snapshot_history(epoch)
        else {
            return Ok(());
        };
        let mut messages = self.request_scaffold(history);
        let mut depth = 0usize;
        let mut vision_follow_up = false;

        loop {
            let request = self.build_request(&messages, vision_follow_up);
            // The vision override applies to one follow-up request.
            vision_follow_up = false;
            let outcome = decoder::run_stream(
                &self.inner.client,
                &self.inner.state,
                request,
                epoch,
            )
            .await?;
            match outcome {
                StreamOutcome::Stale => return Ok(()),
                StreamOutcome::Assistant(turn) => {
                    self.inner.state.commit_assistant(epoch, turn);
                    return Ok(());
                }
                StreamOutcome::ToolCalls(calls) => {
                    depth += 1;
                    let max_depth = self.inner.config.max_tool_depth;
                    if depth > max_depth {
                        return Err(ChatError::tool_loop_exceeded(
                            max_depth,
                        ));
                    }
                    let dispatcher = Dispatcher {
                        registry: &self.inner.registry,
                        state: &self.inner.state,
                        consent: self.inner.consent.as_deref(),
                        hooks: self.inner.hooks.as_deref(),
                        tools_enabled: self.inner.config.tools_enabled,
                    };
                    let batch = dispatcher
                        .dispatch(epoch, calls, &mut messages)
                        .await?;
                    match batch {
                        BatchOutcome::Stale => return Ok(()),
                        BatchOutcome::Continue {
                            has_image_attachment,
                        } => {
                            vision_follow_up = has_image_attachment;
                        }
                    }
                }
            }
        }
    }

    /// Builds the request message list for a fresh turn. The system
    /// prompt is prepended here and never stored in the history.
    fn request_scaffold(
        &self,
        history: Vec<ChatMessage>,
    ) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(history.len() + 1);
        if let Some(prompt) = &self.inner.config.system_prompt {
            messages.push(ChatMessage::system(prompt.clone()));
        }
        messages.extend(history);
        dispatch::strip_stale_images(&mut messages);
        messages
    }

    fn build_request(
        &self,
        messages: &[ChatMessage],
        vision_follow_up: bool,
    ) -> ChatRequest {
        let config = &self.inner.config;
        let model = match (&config.vision_model, vision_follow_up) {
            (Some(vision_model), true) => vision_model.clone(),
            _ => config.model.clone(),
        };
        let tools = if self.inner.registry.is_empty() {
            Vec::new()
        } else {
            self.inner.registry.definitions()
        };
        ChatRequest {
            model,
            messages: messages.to_vec(),
            tools,
        }
    }
}
