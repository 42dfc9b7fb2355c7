use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use glimpse_backend::ChatMessage;

use crate::conversation::{
    DisplayList, DisplayMessage, History, StreamToken, ToolUsage,
};
use crate::epoch::{Epoch, EpochTracker};
use crate::error::ChatError;

/// Everything the orchestrator owns and mutates.
#[derive(Default)]
pub(crate) struct Shared {
    pub history: History,
    pub display: DisplayList,
    pub tool_usage: ToolUsage,
    pub last_error: Option<String>,
    pub sending: bool,
    /// Tool-activity label to attach to the next finalized answer.
    pub pending_activity: Option<String>,
}

/// Epoch-guarded access to the shared conversation state.
///
/// The lock is never held across an await. Epoch bumps happen under
/// this same lock, so an epoch check and the mutation it guards are
/// never reentrant with each other.
#[derive(Clone, Default)]
pub(crate) struct StateHandle {
    shared: Arc<Mutex<Shared>>,
    epochs: EpochTracker,
}

impl StateHandle {
    pub fn lock(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(|e| e.into_inner())
    }

    #[inline]
    pub fn epochs(&self) -> &EpochTracker {
        &self.epochs
    }

    /// Runs `f` against the shared state only when `epoch` is still
    /// current. Returns `None` when the result became stale.
    pub fn if_current<R>(
        &self,
        epoch: Epoch,
        f: impl FnOnce(&mut Shared) -> R,
    ) -> Option<R> {
        let mut shared = self.lock();
        if !self.epochs.is_current(epoch) {
            return None;
        }
        Some(f(&mut shared))
    }

    pub fn is_current(&self, epoch: Epoch) -> bool {
        self.epochs.is_current(epoch)
    }

    pub fn snapshot_history(&self, epoch: Epoch) -> Option<Vec<ChatMessage>> {
        self.if_current(epoch, |shared| shared.history.messages().to_vec())
    }

    pub fn begin_streaming(&self, epoch: Epoch) -> Option<StreamToken> {
        self.if_current(epoch, |shared| shared.display.begin_streaming())
    }

    pub fn update_streaming(
        &self,
        epoch: Epoch,
        token: StreamToken,
        content: &str,
        thinking: Option<String>,
    ) {
        self.if_current(epoch, |shared| {
            shared.display.update_streaming(token, content, thinking);
        });
    }

    /// Removes a discarded stream's placeholder. Deliberately not
    /// epoch-guarded: a decoder always owns its own placeholder.
    pub fn remove_streaming(&self, token: StreamToken) {
        self.lock().display.remove_streaming(token);
    }

    /// Appends a tool exchange to the history.
    pub fn append_history(
        &self,
        epoch: Epoch,
        messages: Vec<ChatMessage>,
    ) -> bool {
        self.if_current(epoch, |shared| shared.history.extend(messages))
            .is_some()
    }

    pub fn tool_started(&self, epoch: Epoch, name: &str) {
        self.if_current(epoch, |shared| {
            shared.tool_usage.in_progress = true;
            shared.tool_usage.name = Some(name.to_owned());
            shared.pending_activity =
                Some(format!("Using {}.", name.replace('_', " ")));
        });
    }

    /// Resets the in-progress flag. Runs on every dispatcher exit,
    /// stale ones included.
    pub fn tool_finished(&self, name: &str) {
        let mut shared = self.lock();
        shared.tool_usage.in_progress = false;
        shared.tool_usage.name = Some(name.to_owned());
        shared.tool_usage.last_used_at = Some(Instant::now());
    }

    /// Commits a successful turn: appends the assistant message and
    /// freezes its display entry.
    pub fn commit_assistant(
        &self,
        epoch: Epoch,
        turn: crate::decoder::AssistantTurn,
    ) -> bool {
        self.if_current(epoch, |shared| {
            shared.history.push(turn.message.clone());
            let activity = shared.pending_activity.take();
            shared.display.finalize_streaming(
                turn.stream_token,
                turn.message,
                turn.thinking,
                turn.thinking_duration,
                activity,
            );
            shared.sending = false;
        })
        .is_some()
    }

    /// Records a failed turn. History keeps the triggering user
    /// message and nothing else from this turn.
    pub fn fail_turn(&self, epoch: Epoch, error: &ChatError) {
        self.if_current(epoch, |shared| {
            warn!("turn failed: {error}");
            shared.last_error = Some(error.to_string());
            shared.pending_activity = None;
            shared.sending = false;
        });
    }

    pub fn display_snapshot(&self) -> Vec<DisplayMessage> {
        self.lock().display.items().to_vec()
    }

    pub fn tool_usage_snapshot(&self) -> ToolUsage {
        self.lock().tool_usage.clone()
    }
}
