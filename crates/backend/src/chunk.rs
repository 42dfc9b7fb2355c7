use serde::Deserialize;

use crate::ToolCall;

/// An incremental assistant payload carried by one stream chunk.
///
/// Backends disagree on where side-channel reasoning text lives: some
/// stream a `reasoning` field, some `thinking`, some `thoughts`. All
/// three are accepted on the wire and resolved to a single fragment with
/// [`AssistantDelta::reasoning_fragment`], in that priority order. Call
/// sites should never touch the aliases directly.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct AssistantDelta {
    /// Visible content delta.
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    reasoning: Option<String>,
    #[serde(default)]
    thinking: Option<String>,
    #[serde(default)]
    thoughts: Option<String>,
    /// Tool invocations requested by the model.
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,
}

impl AssistantDelta {
    /// Creates a delta that only carries visible content.
    #[inline]
    pub fn content<S: Into<String>>(content: S) -> Self {
        Self {
            content: Some(content.into()),
            ..Default::default()
        }
    }

    /// Creates a delta that only carries reasoning text.
    #[inline]
    pub fn reasoning<S: Into<String>>(reasoning: S) -> Self {
        Self {
            reasoning: Some(reasoning.into()),
            ..Default::default()
        }
    }

    /// Creates a delta that only carries tool calls.
    #[inline]
    pub fn tool_calls(tool_calls: Vec<ToolCall>) -> Self {
        Self {
            tool_calls,
            ..Default::default()
        }
    }

    /// Sets the reasoning text on this delta.
    #[inline]
    pub fn with_reasoning<S: Into<String>>(mut self, reasoning: S) -> Self {
        self.reasoning = Some(reasoning.into());
        self
    }

    /// Returns the reasoning fragment in this delta, resolving the
    /// field aliases once at the ingestion boundary.
    pub fn reasoning_fragment(&self) -> Option<&str> {
        [&self.reasoning, &self.thinking, &self.thoughts]
            .into_iter()
            .flatten()
            .map(String::as_str)
            .find(|s| !s.is_empty())
    }
}

/// One event on the backend's chunk channel.
///
/// Chunks for a given correlation id are delivered in emission order;
/// consumers filter the channel by [`StreamChunk::correlation_id`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StreamChunk {
    /// Ties this chunk to one in-flight streaming request.
    pub correlation_id: String,
    /// Whether this is the final chunk of the stream.
    pub done: bool,
    /// The incremental assistant payload, if any.
    pub message: Option<AssistantDelta>,
    /// A backend-reported error. Terminal for the stream.
    pub error: Option<String>,
}

impl StreamChunk {
    /// Creates a delta chunk.
    #[inline]
    pub fn delta<S: Into<String>>(
        correlation_id: S,
        message: AssistantDelta,
    ) -> Self {
        Self {
            correlation_id: correlation_id.into(),
            done: false,
            message: Some(message),
            error: None,
        }
    }

    /// Creates a completion chunk.
    #[inline]
    pub fn done<S: Into<String>>(correlation_id: S) -> Self {
        Self {
            correlation_id: correlation_id.into(),
            done: true,
            message: None,
            error: None,
        }
    }

    /// Creates an error chunk.
    #[inline]
    pub fn error<S1: Into<String>, S2: Into<String>>(
        correlation_id: S1,
        error: S2,
    ) -> Self {
        Self {
            correlation_id: correlation_id.into(),
            done: false,
            message: None,
            error: Some(error.into()),
        }
    }
}
