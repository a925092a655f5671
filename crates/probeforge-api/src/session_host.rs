//! The session host interface the registry and plugin loader are built against.
//!
//! The core never talks to a concrete transport. It is handed an
//! `Arc<dyn SessionHost>` and only ever calls `register_*`/`unregister_*` on
//! it. Transports (streamable HTTP, stdio, AMQP) implement this trait once
//! and are otherwise invisible to the registry and loader.

use std::sync::Arc;

use serde_json::Value;

use crate::prompt::PromptHandler;
use crate::resource::ResourceReader;
use crate::tool::{Tool, ToolDefinition};

/// Host-side registration surface. Transports implement this; the registry
/// and plugin loader only ever call through it.
pub trait SessionHost: Send + Sync {
    fn register_tool(
        &self,
        name: &str,
        definition: ToolDefinition,
        handler: Arc<dyn Tool>,
    ) -> anyhow::Result<()>;

    fn register_resource(
        &self,
        name: &str,
        uri: &str,
        metadata: Value,
        reader: Arc<dyn ResourceReader>,
    ) -> anyhow::Result<()>;

    fn register_prompt(
        &self,
        name: &str,
        config: Value,
        callback: Arc<dyn PromptHandler>,
    ) -> anyhow::Result<()>;

    /// Hosts that cannot remove a registration return `Ok(false)` rather
    /// than erroring; the caller treats that as "nothing to clean up".
    fn unregister_tool(&self, _name: &str) -> anyhow::Result<bool> {
        Ok(false)
    }

    fn unregister_resource(&self, _name: &str) -> anyhow::Result<bool> {
        Ok(false)
    }

    fn unregister_prompt(&self, _name: &str) -> anyhow::Result<bool> {
        Ok(false)
    }
}
