//! The `Tool` trait — the unit of agent-callable capability.
//!
//! Mirrors the host SDK's `registerTool` contract: a tool has a name, an
//! optional title, a description, a structural JSON-Schema `inputSchema`,
//! optional annotations, and an async handler.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::content::ToolCallResult;

/// Metadata describing a tool to the session host, independent of its handler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub title: Option<String>,
    pub description: String,
    /// Always a structural object: `{"type": "object", "properties": ..., "required": [...]}`.
    pub input_schema: Value,
    pub annotations: Option<Value>,
}

/// Core tool trait. Implement this for any agent-callable capability.
///
/// Executing the underlying business logic is not this crate's concern;
/// `call()` is the seam plugins and built-in tools hang their behavior on.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn definition(&self) -> ToolDefinition;

    async fn call(&self, args: Value) -> anyhow::Result<ToolCallResult>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }

        fn definition(&self) -> ToolDefinition {
            ToolDefinition {
                title: None,
                description: "Echoes the `value` argument back".into(),
                input_schema: serde_json::json!({
                    "type": "object",
                    "properties": { "value": { "type": "string" } },
                    "required": ["value"],
                }),
                annotations: None,
            }
        }

        async fn call(&self, args: Value) -> anyhow::Result<ToolCallResult> {
            let value = args
                .get("value")
                .and_then(Value::as_str)
                .unwrap_or_default();
            Ok(ToolCallResult::text(value))
        }
    }

    #[tokio::test]
    async fn echo_tool_roundtrips() {
        let tool = EchoTool;
        let result = tool.call(serde_json::json!({ "value": "hi" })).await.unwrap();
        assert!(!result.is_error);
    }
}
