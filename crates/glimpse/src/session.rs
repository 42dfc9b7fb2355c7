use std::sync::Arc;

use glimpse_backend::{ChatBackend, ChatMessage};
use glimpse_core::conversation::{DisplayMessage, ToolUsage};
use glimpse_core::tool::{ActionHooks, ConsentProvider};
use glimpse_core::{Orchestrator, OrchestratorBuilder};

use crate::tools::*;

/// A session builder.
///
/// See [`Session`].
pub struct SessionBuilder {
    orchestrator_builder: OrchestratorBuilder,
    capture_host: Option<Arc<dyn CaptureHost>>,
}

impl SessionBuilder {
    /// Creates a session builder with a specified chat backend.
    pub fn with_backend<B: ChatBackend>(backend: B) -> Self {
        let orchestrator_builder = OrchestratorBuilder::with_backend(backend);
        Self {
            orchestrator_builder,
            capture_host: None,
        }
    }

    /// Sets the model used for chat requests.
    #[inline]
    pub fn with_model<S: Into<String>>(mut self, model: S) -> Self {
        self.orchestrator_builder =
            self.orchestrator_builder.with_model(model);
        self
    }

    /// Sets the model used for the follow-up turn after an image
    /// attachment.
    #[inline]
    pub fn with_vision_model<S: Into<String>>(mut self, model: S) -> Self {
        self.orchestrator_builder =
            self.orchestrator_builder.with_vision_model(model);
        self
    }

    /// Sets the system prompt for the session.
    #[inline]
    pub fn with_system_prompt<S: Into<String>>(mut self, prompt: S) -> Self {
        self.orchestrator_builder =
            self.orchestrator_builder.with_system_prompt(prompt);
        self
    }

    /// Enables or disables tool execution.
    #[inline]
    pub fn with_tools_enabled(mut self, enabled: bool) -> Self {
        self.orchestrator_builder =
            self.orchestrator_builder.with_tools_enabled(enabled);
        self
    }

    /// Attaches a consent provider for consent-gated tools.
    #[inline]
    pub fn with_consent_provider<P: ConsentProvider + 'static>(
        mut self,
        provider: P,
    ) -> Self {
        self.orchestrator_builder =
            self.orchestrator_builder.with_consent_provider(provider);
        self
    }

    /// Attaches hooks to run around UI-hiding tools.
    #[inline]
    pub fn with_action_hooks<H: ActionHooks + 'static>(
        mut self,
        hooks: H,
    ) -> Self {
        self.orchestrator_builder =
            self.orchestrator_builder.with_action_hooks(hooks);
        self
    }

    /// Attaches a capture host, enabling the screen capture tools.
    #[inline]
    pub fn with_capture_host<H: CaptureHost>(mut self, host: H) -> Self {
        self.capture_host = Some(Arc::new(host));
        self
    }

    /// Builds a new session.
    pub fn build(self) -> Session {
        let mut orchestrator_builder = self
            .orchestrator_builder
            .with_tool(ReadFileTool::new());
        if let Some(host) = self.capture_host {
            orchestrator_builder = orchestrator_builder
                .with_tool(CaptureScreenTextTool::new(Arc::clone(&host)))
                .with_tool(CaptureScreenImageTool::new(host));
        }

        Session {
            orchestrator: orchestrator_builder.build(),
        }
    }
}

/// A chat session, like a window that displays messages and has an input
/// box.
///
/// The session holds a fully configured orchestrator with the built-in
/// tools registered, and it is basically a wrapper around
/// [`Orchestrator`].
#[derive(Clone)]
pub struct Session {
    orchestrator: Orchestrator,
}

impl Session {
    /// Sends a user message to the session and drives the turn to
    /// completion.
    #[inline]
    pub async fn send_message(&self, message: &str) {
        self.orchestrator.submit(message).await;
    }

    /// Cancels the in-flight turn, if any.
    #[inline]
    pub fn cancel(&self) {
        self.orchestrator.cancel();
    }

    /// Regenerates the reply to the most recent user message.
    #[inline]
    pub async fn regenerate_last(&self) {
        self.orchestrator.regenerate_last().await;
    }

    /// Clears the conversation.
    #[inline]
    pub fn clear(&self) {
        self.orchestrator.clear();
    }

    /// Returns the authoritative conversation history.
    #[inline]
    pub fn history(&self) -> Vec<ChatMessage> {
        self.orchestrator.history()
    }

    /// Returns the messages to render, in order.
    #[inline]
    pub fn display_messages(&self) -> Vec<DisplayMessage> {
        self.orchestrator.display_messages()
    }

    /// Returns whether a turn is currently in flight.
    #[inline]
    pub fn is_sending(&self) -> bool {
        self.orchestrator.is_sending()
    }

    /// Returns the last turn-fatal error, if any.
    #[inline]
    pub fn last_error(&self) -> Option<String> {
        self.orchestrator.last_error()
    }

    /// Returns the current tool usage indicator.
    #[inline]
    pub fn tool_usage(&self) -> ToolUsage {
        self.orchestrator.tool_usage()
    }

    /// Returns whether there is a user message to regenerate from.
    #[inline]
    pub fn can_regenerate(&self) -> bool {
        self.orchestrator.can_regenerate()
    }
}
