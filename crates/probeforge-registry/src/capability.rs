//! Shared capability-bookkeeping types used by the registry and the diff
//! application path (plugin load/unload/reload).

use std::collections::HashSet;
use std::sync::Arc;

use probeforge_api::{PromptHandler, ResourceReader, Tool, ToolDefinition};
use serde_json::Value;

/// Snapshot of the capability names a single plugin contributed, taken after
/// its captured registrations have been forwarded to the host. Used to diff
/// an old snapshot against a new one on reload, and to drive cleanup on
/// unload.
#[derive(Debug, Clone, Default)]
pub struct CapabilitySnapshot {
    pub tools: HashSet<String>,
    pub resources: HashSet<String>,
    pub prompts: HashSet<String>,
}

impl CapabilitySnapshot {
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty() && self.resources.is_empty() && self.prompts.is_empty()
    }
}

#[derive(Clone)]
pub struct ToolRegistration {
    pub name: String,
    pub definition: ToolDefinition,
    pub handler: Arc<dyn Tool>,
}

#[derive(Clone)]
pub struct ResourceRegistration {
    pub name: String,
    pub uri: String,
    pub metadata: Value,
    pub reader: Arc<dyn ResourceReader>,
}

#[derive(Clone)]
pub struct PromptRegistration {
    pub name: String,
    pub config: Value,
    pub callback: Arc<dyn PromptHandler>,
}

/// One side of a capability diff: names added in the new snapshot vs. names
/// present in the old snapshot but absent from the new one.
#[derive(Default)]
pub struct DiffSet<T> {
    pub added: Vec<T>,
    pub removed: Vec<String>,
}

/// Full diff between an old and new `CapabilitySnapshot`, carried with enough
/// payload on the `added` side to drive fresh host registrations.
#[derive(Default)]
pub struct CapabilityDiff {
    pub tools: DiffSet<ToolRegistration>,
    pub resources: DiffSet<ResourceRegistration>,
    pub prompts: DiffSet<PromptRegistration>,
}
