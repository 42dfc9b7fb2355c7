use std::error::Error as StdError;
use std::fmt::{self, Display};

/// The kind of error that ended a turn.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The backend could not be reached before any chunk arrived.
    BackendUnreachable,
    /// The backend reported an error mid-stream.
    Backend,
    /// The stream completed with no content and no reasoning text.
    EmptyResponse,
    /// The model requested a tool that is not registered.
    UnsupportedTool,
    /// A tool's execution failed.
    ToolFailed,
    /// The tool-call recursion exceeded the configured depth.
    ToolLoopExceeded,
    /// The consent provider itself failed.
    Consent,
}

/// An error that ended one conversation turn.
///
/// A failed turn never corrupts history beyond its own user message:
/// the message that triggered it stays, the reply simply failed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChatError {
    kind: ErrorKind,
    message: String,
}

impl ChatError {
    /// Creates a `BackendUnreachable` error.
    #[inline]
    pub fn backend_unreachable<S: Into<String>>(message: S) -> Self {
        Self {
            kind: ErrorKind::BackendUnreachable,
            message: message.into(),
        }
    }

    /// Creates a `Backend` error from an error chunk.
    #[inline]
    pub fn backend<S: Into<String>>(message: S) -> Self {
        Self {
            kind: ErrorKind::Backend,
            message: message.into(),
        }
    }

    /// Creates an `EmptyResponse` error.
    #[inline]
    pub fn empty_response() -> Self {
        Self {
            kind: ErrorKind::EmptyResponse,
            message: "the backend returned an empty response".to_owned(),
        }
    }

    /// Creates an `UnsupportedTool` error for the named tool.
    #[inline]
    pub fn unsupported_tool<S: Into<String>>(name: S) -> Self {
        Self {
            kind: ErrorKind::UnsupportedTool,
            message: format!("unsupported tool call: {}", name.into()),
        }
    }

    /// Creates a `ToolFailed` error.
    #[inline]
    pub fn tool_failed<S: Into<String>>(reason: S) -> Self {
        Self {
            kind: ErrorKind::ToolFailed,
            message: reason.into(),
        }
    }

    /// Creates a `ToolLoopExceeded` error.
    #[inline]
    pub fn tool_loop_exceeded(max_depth: usize) -> Self {
        Self {
            kind: ErrorKind::ToolLoopExceeded,
            message: format!(
                "tool-call recursion exceeded {max_depth} rounds"
            ),
        }
    }

    /// Creates a `Consent` error.
    #[inline]
    pub fn consent<S: Into<String>>(message: S) -> Self {
        Self {
            kind: ErrorKind::Consent,
            message: message.into(),
        }
    }

    /// Returns the kind of this error.
    #[inline]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the human-readable message.
    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Display for ChatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl StdError for ChatError {}
