//! The capturing proxy: a `SessionHost` implementation handed to a plugin's
//! WASM entry in place of the real host during load. Registrations the
//! plugin makes are recorded, not applied, so they can be validated and then
//! replayed against the real host in the exact order the plugin called them.

use std::sync::Arc;

use parking_lot::Mutex;
use probeforge_api::{PromptHandler, ResourceReader, SessionHost, Tool, ToolDefinition};
use serde_json::Value;

use probeforge_registry::{PromptRegistration, ResourceRegistration, ToolRegistration};

pub enum CapturedCall {
    Tool(ToolRegistration),
    Resource(ResourceRegistration),
    Prompt(PromptRegistration),
}

#[derive(Default)]
pub struct CapturingHost {
    calls: Mutex<Vec<CapturedCall>>,
}

impl CapturingHost {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Drain captured calls in registration order.
    pub fn into_calls(self) -> Vec<CapturedCall> {
        self.calls.into_inner()
    }

    pub fn take_calls(&self) -> Vec<CapturedCall> {
        std::mem::take(&mut self.calls.lock())
    }
}

impl SessionHost for CapturingHost {
    fn register_tool(
        &self,
        name: &str,
        definition: ToolDefinition,
        handler: Arc<dyn Tool>,
    ) -> anyhow::Result<()> {
        self.calls.lock().push(CapturedCall::Tool(ToolRegistration {
            name: name.to_string(),
            definition,
            handler,
        }));
        Ok(())
    }

    fn register_resource(
        &self,
        name: &str,
        uri: &str,
        metadata: Value,
        reader: Arc<dyn ResourceReader>,
    ) -> anyhow::Result<()> {
        self.calls.lock().push(CapturedCall::Resource(ResourceRegistration {
            name: name.to_string(),
            uri: uri.to_string(),
            metadata,
            reader,
        }));
        Ok(())
    }

    fn register_prompt(
        &self,
        name: &str,
        config: Value,
        callback: Arc<dyn PromptHandler>,
    ) -> anyhow::Result<()> {
        self.calls.lock().push(CapturedCall::Prompt(PromptRegistration {
            name: name.to_string(),
            config,
            callback,
        }));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use probeforge_api::ToolCallResult;
    use async_trait::async_trait;

    struct NoopTool;

    #[async_trait]
    impl Tool for NoopTool {
        fn name(&self) -> &str {
            "noop"
        }
        fn definition(&self) -> ToolDefinition {
            ToolDefinition {
                title: None,
                description: "does nothing".into(),
                input_schema: Value::Object(Default::default()),
                annotations: None,
            }
        }
        async fn call(&self, _args: Value) -> anyhow::Result<ToolCallResult> {
            Ok(ToolCallResult::text(""))
        }
    }

    #[test]
    fn captures_calls_in_order() {
        let host = CapturingHost::new();
        host.register_tool("a", NoopTool.definition(), Arc::new(NoopTool)).unwrap();
        host.register_tool("b", NoopTool.definition(), Arc::new(NoopTool)).unwrap();
        let calls = host.take_calls();
        assert_eq!(calls.len(), 2);
        match (&calls[0], &calls[1]) {
            (CapturedCall::Tool(a), CapturedCall::Tool(b)) => {
                assert_eq!(a.name, "a");
                assert_eq!(b.name, "b");
            }
            _ => panic!("expected tool calls"),
        }
    }
}
