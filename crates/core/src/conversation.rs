//! Conversation-related types.
//!
//! Two views of the same conversation live here. [`History`] is the
//! authoritative role-tagged record that gets sent to the backend; the
//! display list is the UI-facing rendering with ephemeral streaming
//! state. Display entries are derived from history entries plus the
//! in-flight stream and are never sent back to the model.

use std::time::{Duration, Instant};

use glimpse_backend::{ChatMessage, Role};

/// Identifies the streaming display entry of one in-flight decoder run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct StreamToken(u64);

/// A UI-facing message: a history entry plus ephemeral fields.
#[derive(Clone, Debug, PartialEq)]
pub struct DisplayMessage {
    /// The underlying message.
    pub message: ChatMessage,
    /// Normalized reasoning text shown alongside the answer.
    pub thinking: Option<String>,
    /// Latency until the first assistant signal of the turn.
    pub thinking_duration: Option<Duration>,
    /// Present only while the entry is still streaming.
    pub stream_token: Option<StreamToken>,
    /// Label describing the tool activity that produced this answer.
    pub tool_activity: Option<String>,
}

impl DisplayMessage {
    fn from_message(message: ChatMessage) -> Self {
        Self {
            message,
            thinking: None,
            thinking_duration: None,
            stream_token: None,
            tool_activity: None,
        }
    }
}

/// Transient status of the tool dispatcher, exposed for UI feedback.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ToolUsage {
    /// Whether a tool batch is currently executing.
    pub in_progress: bool,
    /// The most recent tool name.
    pub name: Option<String>,
    /// When the last tool batch finished.
    pub last_used_at: Option<Instant>,
}

/// The authoritative conversation record.
///
/// Append-only, except for [`History::clear`] and
/// [`History::truncate_to_last_user`].
#[derive(Clone, Debug, Default)]
pub(crate) struct History {
    messages: Vec<ChatMessage>,
}

impl History {
    #[inline]
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    #[inline]
    pub fn push(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    #[inline]
    pub fn extend(&mut self, messages: impl IntoIterator<Item = ChatMessage>) {
        self.messages.extend(messages);
    }

    #[inline]
    pub fn clear(&mut self) {
        self.messages.clear();
    }

    #[inline]
    pub fn has_user_turn(&self) -> bool {
        self.messages.iter().any(|m| m.role == Role::User)
    }

    /// Drops everything after the most recent user message and returns
    /// that message's text, or `None` when there is no user turn.
    pub fn truncate_to_last_user(&mut self) -> Option<String> {
        let index = self
            .messages
            .iter()
            .rposition(|m| m.role == Role::User)?;
        self.messages.truncate(index + 1);
        Some(self.messages[index].content.clone())
    }
}

/// The UI-facing message list.
#[derive(Debug, Default)]
pub(crate) struct DisplayList {
    items: Vec<DisplayMessage>,
    next_token: u64,
}

impl DisplayList {
    #[inline]
    pub fn items(&self) -> &[DisplayMessage] {
        &self.items
    }

    #[inline]
    pub fn push_message(&mut self, message: ChatMessage) {
        self.items.push(DisplayMessage::from_message(message));
    }

    /// Materializes the streaming placeholder for one decoder run.
    pub fn begin_streaming(&mut self) -> StreamToken {
        self.next_token += 1;
        let token = StreamToken(self.next_token);
        let mut item =
            DisplayMessage::from_message(ChatMessage::assistant(""));
        item.stream_token = Some(token);
        self.items.push(item);
        token
    }

    pub fn update_streaming(
        &mut self,
        token: StreamToken,
        content: &str,
        thinking: Option<String>,
    ) {
        if let Some(item) = self.find_streaming(token) {
            item.message.content = content.to_owned();
            item.thinking = thinking;
        }
    }

    /// Removes the placeholder of a discarded stream.
    pub fn remove_streaming(&mut self, token: StreamToken) {
        self.items.retain(|item| item.stream_token != Some(token));
    }

    /// Freezes the streaming entry into its final form. Pushes a fresh
    /// entry when the stream never materialized a placeholder.
    pub fn finalize_streaming(
        &mut self,
        token: Option<StreamToken>,
        message: ChatMessage,
        thinking: Option<String>,
        thinking_duration: Option<Duration>,
        tool_activity: Option<String>,
    ) {
        let index = token.and_then(|token| {
            self.items
                .iter()
                .position(|item| item.stream_token == Some(token))
        });
        let index = match index {
            Some(index) => index,
            None => {
                self.items.push(DisplayMessage::from_message(
                    ChatMessage::assistant(""),
                ));
                self.items.len() - 1
            }
        };
        let item = &mut self.items[index];
        item.message = message;
        item.thinking = thinking;
        item.thinking_duration = thinking_duration;
        item.stream_token = None;
        item.tool_activity = tool_activity;
    }

    /// Drops every streaming placeholder, whatever epoch it belongs to.
    pub fn drop_streaming(&mut self) {
        self.items.retain(|item| item.stream_token.is_none());
    }

    /// Drops everything after the most recent user entry.
    pub fn truncate_to_last_user(&mut self) {
        if let Some(index) = self
            .items
            .iter()
            .rposition(|item| item.message.role == Role::User)
        {
            self.items.truncate(index + 1);
        }
    }

    #[inline]
    pub fn clear(&mut self) {
        self.items.clear();
    }

    fn find_streaming(
        &mut self,
        token: StreamToken,
    ) -> Option<&mut DisplayMessage> {
        self.items
            .iter_mut()
            .find(|item| item.stream_token == Some(token))
    }
}
