use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The author of a [`ChatMessage`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System instructions.
    System,
    /// The human user.
    User,
    /// The model.
    Assistant,
    /// A tool reporting its result.
    Tool,
}

/// An opaque reference to an image attached to a message.
///
/// The orchestrator never inspects the contents; backends decide how to
/// encode it on the wire (a file path for local backends, base64 for
/// remote ones).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageRef(pub String);

/// A tool invocation requested by the model.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    /// The name of the tool to call.
    pub name: String,
    /// Arguments to pass to the tool.
    pub arguments: Value,
}

/// Describes a tool that can be used by the model.
///
/// For most backends, the parameters should typically be defined by a
/// [JSON schema](https://json-schema.org/).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Name of the tool.
    pub name: String,
    /// Description of the tool.
    pub description: String,
    /// Parameters definition of the tool.
    pub parameters: Value,
}

/// One turn in a conversation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Who authored this message.
    pub role: Role,
    /// The text content. May be empty for assistant messages that only
    /// carry tool calls.
    pub content: String,
    /// Tool invocations requested by an assistant message.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    /// The reporting tool's name. Always present when `role` is
    /// [`Role::Tool`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    /// Images attached for multimodal follow-ups.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<ImageRef>,
}

impl ChatMessage {
    /// Creates a system message.
    #[inline]
    pub fn system<S: Into<String>>(content: S) -> Self {
        Self::text(Role::System, content)
    }

    /// Creates a user message.
    #[inline]
    pub fn user<S: Into<String>>(content: S) -> Self {
        Self::text(Role::User, content)
    }

    /// Creates an assistant message with plain text content.
    #[inline]
    pub fn assistant<S: Into<String>>(content: S) -> Self {
        Self::text(Role::Assistant, content)
    }

    /// Creates an assistant message that only carries tool calls.
    #[inline]
    pub fn assistant_tool_calls(tool_calls: Vec<ToolCall>) -> Self {
        Self {
            role: Role::Assistant,
            content: String::new(),
            tool_calls,
            tool_name: None,
            images: Vec::new(),
        }
    }

    /// Creates a tool-result message reported by the named tool.
    #[inline]
    pub fn tool<S1: Into<String>, S2: Into<String>>(
        tool_name: S1,
        content: S2,
    ) -> Self {
        Self {
            role: Role::Tool,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_name: Some(tool_name.into()),
            images: Vec::new(),
        }
    }

    /// Attaches images to this message.
    #[inline]
    pub fn with_images(mut self, images: Vec<ImageRef>) -> Self {
        self.images = images;
        self
    }

    #[inline]
    fn text<S: Into<String>>(role: Role, content: S) -> Self {
        Self {
            role,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_name: None,
            images: Vec::new(),
        }
    }
}

/// A request to be sent to the chat backend.
#[derive(Clone, Debug, PartialEq)]
pub struct ChatRequest {
    /// The model to sample from.
    pub model: String,
    /// The input messages.
    pub messages: Vec<ChatMessage>,
    /// Tools that are available to the model.
    pub tools: Vec<ToolDefinition>,
}

/// A complete (non-streaming) response from the chat backend.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct ChatResponse {
    /// The assistant message, if the backend produced one.
    pub message: Option<ChatMessage>,
}
