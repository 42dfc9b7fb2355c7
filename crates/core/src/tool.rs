//! Tool call supports.

mod consent;
mod error;
mod object;
mod registry;

use serde::de::DeserializeOwned;
use serde_json::Value;

use glimpse_backend::ImageRef;

pub use consent::{ActionHooks, Consent, ConsentError, ConsentProvider};
pub use error::{Error, ErrorKind};
pub(crate) use object::ToolObject;
pub(crate) use registry::Registry;

/// The result of a tool call.
pub type ToolResult = Result<ToolOutput, Error>;

/// Auxiliary content produced by a tool for model consumption.
///
/// An attachment is never persisted to history; it rides along on the
/// follow-up request as a synthetic user message built from `prompt`
/// and `images`.
#[derive(Clone, Debug, PartialEq)]
pub struct ToolAttachment {
    /// Instruction telling the model how to use the attachment.
    pub prompt: String,
    /// The attached images.
    pub images: Vec<ImageRef>,
}

/// What a tool produced.
#[derive(Clone, Debug, PartialEq)]
pub struct ToolOutput {
    /// The serialized payload of the tool-result message.
    pub content: Value,
    /// Optional auxiliary content for the follow-up request.
    pub attachment: Option<ToolAttachment>,
}

impl ToolOutput {
    /// Creates an output carrying only a result payload.
    #[inline]
    pub fn content(content: Value) -> Self {
        Self {
            content,
            attachment: None,
        }
    }

    /// Attaches auxiliary content to this output.
    #[inline]
    pub fn with_attachment<S: Into<String>>(
        mut self,
        prompt: S,
        images: Vec<ImageRef>,
    ) -> Self {
        self.attachment = Some(ToolAttachment {
            prompt: prompt.into(),
            images,
        });
        self
    }
}

/// A tool that can be called by the model.
///
/// Implementations of this trait should be stateless, and may not
/// maintain any internal state. A tool can be context-aware by making
/// the context an immutable field that is copied when executing.
pub trait Tool: Send + Sync + 'static {
    /// The type of input that the tool accepts.
    type Input: DeserializeOwned;

    /// Returns the name of the tool.
    fn name(&self) -> &str;

    /// Returns the description of the tool.
    fn description(&self) -> &str;

    /// Returns the parameter schema of the tool.
    fn parameter_schema(&self) -> &Value;

    /// Whether the user must approve each invocation of this tool.
    #[inline]
    fn requires_consent(&self) -> bool {
        false
    }

    /// Whether the host UI must be hidden while this tool runs, e.g. so
    /// a screen capture does not capture the overlay itself.
    #[inline]
    fn hides_host_ui(&self) -> bool {
        false
    }

    /// Executes the tool with the given input.
    ///
    /// This method must return a future that is fully independent of
    /// `self`, and the future should be cancellation safe.
    fn execute(
        &self,
        input: Self::Input,
    ) -> impl Future<Output = ToolResult> + Send + 'static;
}
