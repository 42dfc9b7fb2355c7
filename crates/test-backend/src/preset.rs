use glimpse_backend::ToolCall;
use serde::{Deserialize, Serialize};

/// The events in a preset response.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum PresetEvent {
    /// A visible content fragment.
    #[serde(rename = "content_delta")]
    ContentDelta(String),
    /// A side-channel reasoning fragment.
    #[serde(rename = "reasoning_delta")]
    ReasoningDelta(String),
    /// A tool invocation. Terminal: the stream ends after it.
    #[serde(rename = "tool_call")]
    ToolCall(ToolCall),
    /// A mid-stream error. Terminal as well.
    #[serde(rename = "error")]
    Error(String),
}

/// A scripted response for one streaming request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PresetResponse {
    /// Events in this response.
    pub events: Vec<PresetEvent>,
}

impl PresetResponse {
    /// Creates a `PresetResponse` with the specified events.
    #[inline]
    pub fn with_events(events: impl Into<Vec<PresetEvent>>) -> Self {
        Self {
            events: events.into(),
        }
    }
}
