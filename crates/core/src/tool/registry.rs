use std::collections::HashMap;
use std::sync::Arc;

use glimpse_backend::ToolDefinition;

use crate::tool::Tool;
use crate::tool::object::{ToolObject, ToolObjectImpl};

/// The static set of tools the model may call, keyed by name.
#[derive(Default)]
pub(crate) struct Registry {
    tools: HashMap<String, Arc<dyn ToolObject>>,
}

impl Registry {
    pub fn add_tool<T: Tool>(&mut self, tool: T) {
        let name = tool.name().to_owned();
        self.tools.insert(name, Arc::new(ToolObjectImpl(tool)));
    }

    #[inline]
    pub fn get(&self, name: &str) -> Option<&Arc<dyn ToolObject>> {
        self.tools.get(name)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    #[inline]
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools
            .values()
            .map(|tool| ToolDefinition {
                name: tool.name().to_owned(),
                description: tool.description().to_owned(),
                parameters: tool.parameter_schema().clone(),
            })
            .collect()
    }
}
