use std::sync::Arc;

use glimpse_backend::ChatBackend;

use super::{Inner, Orchestrator};
use crate::backend_client::BackendClient;
use crate::orchestrator::state::StateHandle;
use crate::tool::{ActionHooks, ConsentProvider, Registry, Tool};

/// The model used when the builder is not told otherwise.
pub(crate) const DEFAULT_MODEL: &str = "gpt-oss:20b-cloud";

/// The default bound on consecutive tool batches within one turn.
pub(crate) const DEFAULT_MAX_TOOL_DEPTH: usize = 8;

pub(crate) struct Config {
    pub model: String,
    pub vision_model: Option<String>,
    pub system_prompt: Option<String>,
    pub tools_enabled: bool,
    pub max_tool_depth: usize,
}

/// [`Orchestrator`] builder.
pub struct OrchestratorBuilder {
    client: BackendClient,
    registry: Registry,
    consent: Option<Box<dyn ConsentProvider>>,
    hooks: Option<Box<dyn ActionHooks>>,
    config: Config,
}

impl OrchestratorBuilder {
    /// Creates a new builder with the specified chat backend.
    #[inline]
    pub fn with_backend<B: ChatBackend>(backend: B) -> Self {
        Self {
            client: BackendClient::new(backend),
            registry: Registry::default(),
            consent: None,
            hooks: None,
            config: Config {
                model: DEFAULT_MODEL.to_owned(),
                vision_model: None,
                system_prompt: None,
                tools_enabled: true,
                max_tool_depth: DEFAULT_MAX_TOOL_DEPTH,
            },
        }
    }

    /// Sets the model requested from the backend.
    #[inline]
    pub fn with_model<S: Into<String>>(mut self, model: S) -> Self {
        self.config.model = model.into();
        self
    }

    /// Sets the model used for the follow-up request right after a
    /// tool produced an image attachment.
    #[inline]
    pub fn with_vision_model<S: Into<String>>(mut self, model: S) -> Self {
        self.config.vision_model = Some(model.into());
        self
    }

    /// Sets the system prompt prepended to every request.
    #[inline]
    pub fn with_system_prompt<S: Into<String>>(
        mut self,
        prompt: S,
    ) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    /// Registers a tool.
    #[inline]
    pub fn with_tool<T: Tool>(mut self, tool: T) -> Self {
        self.registry.add_tool(tool);
        self
    }

    /// Enables or disables tool execution. Registered tools are still
    /// advertised to the model; their invocations come back refused.
    #[inline]
    pub fn with_tools_enabled(mut self, enabled: bool) -> Self {
        self.config.tools_enabled = enabled;
        self
    }

    /// Attaches a consent provider for consent-gated tools.
    #[inline]
    pub fn with_consent_provider<P: ConsentProvider + 'static>(
        mut self,
        provider: P,
    ) -> Self {
        self.consent = Some(Box::new(provider));
        self
    }

    /// Attaches hooks run around tools that hide the host UI.
    #[inline]
    pub fn with_action_hooks<H: ActionHooks + 'static>(
        mut self,
        hooks: H,
    ) -> Self {
        self.hooks = Some(Box::new(hooks));
        self
    }

    /// Overrides the bound on consecutive tool batches per turn.
    #[inline]
    pub fn with_max_tool_depth(mut self, depth: usize) -> Self {
        self.config.max_tool_depth = depth;
        self
    }

    /// Builds the orchestrator.
    #[inline]
    pub fn build(self) -> Orchestrator {
        Orchestrator {
            inner: Arc::new(Inner {
                client: self.client,
                registry: self.registry,
                consent: self.consent,
                hooks: self.hooks,
                config: self.config,
                state: StateHandle::default(),
            }),
        }
    }
}
