//! A minimal in-process `SessionHost`: keeps every registered tool,
//! resource, and prompt in memory. Good enough to drive the capability
//! registry and plugin lifecycle end to end without a real MCP transport
//! wired up yet.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use probeforge_api::{PromptHandler, ResourceReader, SessionHost, Tool, ToolDefinition};
use serde_json::Value;

#[derive(Default)]
pub struct InMemorySessionHost {
    tools: Mutex<HashMap<String, (ToolDefinition, Arc<dyn Tool>)>>,
    resources: Mutex<HashMap<String, (String, Value, Arc<dyn ResourceReader>)>>,
    prompts: Mutex<HashMap<String, (Value, Arc<dyn PromptHandler>)>>,
}

impl InMemorySessionHost {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn tool_count(&self) -> usize {
        self.tools.lock().len()
    }
}

impl SessionHost for InMemorySessionHost {
    fn register_tool(
        &self,
        name: &str,
        definition: ToolDefinition,
        handler: Arc<dyn Tool>,
    ) -> anyhow::Result<()> {
        self.tools
            .lock()
            .insert(name.to_string(), (definition, handler));
        Ok(())
    }

    fn register_resource(
        &self,
        name: &str,
        uri: &str,
        metadata: Value,
        reader: Arc<dyn ResourceReader>,
    ) -> anyhow::Result<()> {
        self.resources
            .lock()
            .insert(name.to_string(), (uri.to_string(), metadata, reader));
        Ok(())
    }

    fn register_prompt(
        &self,
        name: &str,
        config: Value,
        callback: Arc<dyn PromptHandler>,
    ) -> anyhow::Result<()> {
        self.prompts
            .lock()
            .insert(name.to_string(), (config, callback));
        Ok(())
    }

    fn unregister_tool(&self, name: &str) -> anyhow::Result<bool> {
        Ok(self.tools.lock().remove(name).is_some())
    }

    fn unregister_resource(&self, name: &str) -> anyhow::Result<bool> {
        Ok(self.resources.lock().remove(name).is_some())
    }

    fn unregister_prompt(&self, name: &str) -> anyhow::Result<bool> {
        Ok(self.prompts.lock().remove(name).is_some())
    }
}
