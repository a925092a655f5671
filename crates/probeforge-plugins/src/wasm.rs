//! The WASM execution bridge: dynamically imports a plugin's compiled entry
//! module and exposes its declared capabilities as ordinary `Tool` /
//! `ResourceReader` / `PromptHandler` objects.
//!
//! Rust has no equivalent of importing an arbitrary module at runtime and
//! monkeypatching a capturing object into its scope the way a dynamic
//! language can. `extism` is the idiomatic substitute a `zeroclaw-plugins`
//! style crate would reach for: the entry module runs inside a WASM sandbox,
//! and capability discovery happens
//! through a single well-known export (`describe`) rather than by
//! instrumenting arbitrary host calls the guest makes during its own
//! top-level evaluation.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use probeforge_api::{CoreError, PromptHandler, ResourceReader, Tool, ToolCallResult, ToolDefinition};
use serde::Deserialize;
use serde_json::Value;

/// What a plugin's `describe` export returns: enough to build host-facing
/// registrations without running any business logic yet.
#[derive(Debug, Deserialize)]
pub struct CaptureDescriptor {
    #[serde(default)]
    pub tools: Vec<ToolDescriptor>,
    #[serde(default)]
    pub resources: Vec<ResourceDescriptor>,
    #[serde(default)]
    pub prompts: Vec<PromptDescriptor>,
}

#[derive(Debug, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    #[serde(default)]
    pub title: Option<String>,
    pub description: String,
    #[serde(default)]
    pub input_schema: Value,
}

#[derive(Debug, Deserialize)]
pub struct ResourceDescriptor {
    pub name: String,
    pub uri: String,
    #[serde(default)]
    pub metadata: Value,
}

#[derive(Debug, Deserialize)]
pub struct PromptDescriptor {
    pub name: String,
    #[serde(default)]
    pub config: Value,
}

/// A loaded WASM entry module. Calls into the guest are serialized behind a
/// mutex since `extism::Plugin::call` takes `&mut self`.
pub struct WasmEntry {
    plugin: Mutex<extism::Plugin>,
}

impl WasmEntry {
    pub fn load(plugin_id: &str, wasm_bytes: &[u8]) -> Result<Arc<Self>, CoreError> {
        let manifest = extism::Manifest::new([extism::Wasm::data(wasm_bytes.to_vec())]);
        let plugin = extism::Plugin::new(&manifest, [], true).map_err(|e| {
            CoreError::integrity(plugin_id, format!("failed to instantiate wasm module: {e}"))
        })?;
        Ok(Arc::new(Self {
            plugin: Mutex::new(plugin),
        }))
    }

    pub fn describe(&self, plugin_id: &str) -> Result<CaptureDescriptor, CoreError> {
        let mut plugin = self.plugin.lock();
        let output = plugin
            .call::<&str, &str>("describe", "")
            .map_err(|e| CoreError::integrity(plugin_id, format!("describe() export failed: {e}")))?;
        serde_json::from_str(output)
            .map_err(|e| CoreError::integrity(plugin_id, format!("describe() returned invalid json: {e}")))
    }

    fn call_tool_export(&self, envelope: &Value) -> anyhow::Result<Value> {
        let input = envelope.to_string();
        let mut plugin = self.plugin.lock();
        let output = plugin
            .call::<&str, &str>("call_tool", &input)
            .map_err(|e| anyhow::anyhow!("call_tool export failed: {e}"))?;
        Ok(serde_json::from_str(output)?)
    }

    fn read_resource_export(&self, uri: &str) -> anyhow::Result<Value> {
        let mut plugin = self.plugin.lock();
        let output = plugin
            .call::<&str, &str>("read_resource", uri)
            .map_err(|e| anyhow::anyhow!("read_resource export failed: {e}"))?;
        Ok(serde_json::from_str(output)?)
    }

    fn render_prompt_export(&self, envelope: &Value) -> anyhow::Result<Value> {
        let input = envelope.to_string();
        let mut plugin = self.plugin.lock();
        let output = plugin
            .call::<&str, &str>("render_prompt", &input)
            .map_err(|e| anyhow::anyhow!("render_prompt export failed: {e}"))?;
        Ok(serde_json::from_str(output)?)
    }
}

/// Generic `Tool` that forwards every call into the guest module's
/// `call_tool` export, tagged with the tool name so one export can dispatch
/// to many declared tools.
pub struct WasmToolProxy {
    entry: Arc<WasmEntry>,
    name: String,
    definition: ToolDefinition,
}

impl WasmToolProxy {
    pub fn new(entry: Arc<WasmEntry>, name: String, definition: ToolDefinition) -> Self {
        Self {
            entry,
            name,
            definition,
        }
    }
}

#[async_trait]
impl Tool for WasmToolProxy {
    fn name(&self) -> &str {
        &self.name
    }

    fn definition(&self) -> ToolDefinition {
        self.definition.clone()
    }

    async fn call(&self, args: Value) -> anyhow::Result<ToolCallResult> {
        let entry = self.entry.clone();
        let envelope = serde_json::json!({ "tool": self.name, "args": args });
        let name = self.name.clone();
        let result =
            tokio::task::spawn_blocking(move || entry.call_tool_export(&envelope)).await??;
        match serde_json::from_value::<ToolCallResult>(result) {
            Ok(result) => Ok(result),
            Err(_) => Ok(ToolCallResult::error(format!(
                "plugin tool '{name}' returned a malformed result"
            ))),
        }
    }
}

pub struct WasmResourceProxy {
    entry: Arc<WasmEntry>,
}

impl WasmResourceProxy {
    pub fn new(entry: Arc<WasmEntry>) -> Self {
        Self { entry }
    }
}

#[async_trait]
impl ResourceReader for WasmResourceProxy {
    async fn read(&self, uri: &str) -> anyhow::Result<Value> {
        let entry = self.entry.clone();
        let uri = uri.to_string();
        tokio::task::spawn_blocking(move || entry.read_resource_export(&uri)).await?
    }
}

pub struct WasmPromptProxy {
    entry: Arc<WasmEntry>,
    name: String,
}

impl WasmPromptProxy {
    pub fn new(entry: Arc<WasmEntry>, name: String) -> Self {
        Self { entry, name }
    }
}

#[async_trait]
impl PromptHandler for WasmPromptProxy {
    async fn render(&self, args: Value) -> anyhow::Result<Value> {
        let entry = self.entry.clone();
        let envelope = serde_json::json!({ "prompt": self.name, "args": args });
        tokio::task::spawn_blocking(move || entry.render_prompt_export(&envelope)).await?
    }
}
