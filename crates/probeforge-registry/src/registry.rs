//! The Capability Registry: the single source of truth for which tools,
//! resources, and prompts are currently live on the session host.
//!
//! Built-in modules register through the batch discipline
//! (`start_module` -> `register_tool`* -> `complete_module`), mirroring how
//! `src/plugins/registry.rs`-style registries serialize a module's
//! registrations into one unit before anything else can observe partial
//! state. Plugins register in bulk through `register_plugin_capabilities`
//! after the loader has already forwarded their captured calls to the host;
//! the registry's job there is strictly bookkeeping and duplicate detection.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use probeforge_api::SessionHost;
use tracing::{debug, info, warn};

use crate::capability::{CapabilityDiff, CapabilitySnapshot};
use crate::errors::RegistryError;

struct OpenBatch {
    module: String,
    category: String,
    started_at: Instant,
    tools: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ModuleRecord {
    pub category: String,
    pub tools: Vec<String>,
    pub load_duration: Duration,
}

#[derive(Debug, Clone, Default)]
pub struct RegistryStats {
    pub module_count: usize,
    pub unique_tools: usize,
    pub total_registrations: usize,
    pub categories: HashMap<String, usize>,
    pub duplicates_skipped: usize,
}

#[derive(Default)]
struct State {
    categories: HashMap<String, HashSet<String>>,
    modules: HashMap<String, ModuleRecord>,
    registered_tools: HashSet<String>,
    registered_resources: HashSet<String>,
    registered_prompts: HashSet<String>,
    plugin_capabilities: HashMap<String, CapabilitySnapshot>,
    current_batch: Option<OpenBatch>,
    total_registrations: usize,
    duplicates_skipped: usize,
}

/// Owns the session host handle and all bookkeeping about what is currently
/// registered against it. Cheap to clone (`Arc` internally) so it can be
/// shared across the loader, the hot-reload watcher, and the management API.
pub struct CapabilityRegistry {
    host: Arc<dyn SessionHost>,
    state: Mutex<State>,
}

impl CapabilityRegistry {
    pub fn new(host: Arc<dyn SessionHost>) -> Self {
        Self {
            host,
            state: Mutex::new(State::default()),
        }
    }

    /// Open a registration batch for a built-in module. Only one batch may be
    /// open at a time; nesting is a programmer error, not a runtime
    /// condition, so it surfaces as `RegistryError::BatchAlreadyOpen`.
    pub fn start_module(&self, name: &str, category: &str) -> Result<(), RegistryError> {
        let mut state = self.state.lock();
        if let Some(batch) = &state.current_batch {
            return Err(RegistryError::BatchAlreadyOpen(batch.module.clone()));
        }
        if state.modules.contains_key(name) {
            return Err(RegistryError::DuplicateModule(name.to_string()));
        }
        state.current_batch = Some(OpenBatch {
            module: name.to_string(),
            category: category.to_string(),
            started_at: Instant::now(),
            tools: Vec::new(),
        });
        Ok(())
    }

    /// Register one tool as part of the currently open batch, forwarding it
    /// to the session host. A name already present in the global dedup set
    /// is skipped silently (logged at debug) rather than treated as an
    /// error — capability collisions between modules are expected during
    /// incremental rollouts.
    pub fn register_tool(
        &self,
        name: &str,
        definition: probeforge_api::ToolDefinition,
        handler: Arc<dyn probeforge_api::Tool>,
    ) -> Result<(), RegistryError> {
        let mut state = self.state.lock();
        if state.current_batch.is_none() {
            return Err(RegistryError::NoActiveBatch);
        }
        if state.registered_tools.contains(name) {
            state.duplicates_skipped += 1;
            debug!(tool = name, "skipping duplicate tool registration");
            return Ok(());
        }
        if let Err(err) = self.host.register_tool(name, definition, handler) {
            warn!(tool = name, error = %err, "host rejected tool registration");
            return Ok(());
        }
        state.registered_tools.insert(name.to_string());
        state.total_registrations += 1;
        if let Some(batch) = &mut state.current_batch {
            batch.tools.push(name.to_string());
        }
        Ok(())
    }

    /// Close the open batch, committing it to the module table and category
    /// index. Idempotent-safe: calling without an open batch is a no-op,
    /// matching the lenient `completeModule` convention this mirrors.
    pub fn complete_module(&self) {
        let mut state = self.state.lock();
        let Some(batch) = state.current_batch.take() else {
            return;
        };
        let load_duration = batch.started_at.elapsed();
        let category_tools = state.categories.entry(batch.category.clone()).or_default();
        for tool in &batch.tools {
            category_tools.insert(tool.clone());
        }
        info!(
            module = %batch.module,
            category = %batch.category,
            tools = batch.tools.len(),
            elapsed_ms = load_duration.as_millis(),
            "module registration batch complete"
        );
        state.modules.insert(
            batch.module,
            ModuleRecord {
                category: batch.category,
                tools: batch.tools,
                load_duration,
            },
        );
    }

    /// Record bookkeeping for a plugin whose captured registrations have
    /// already been forwarded to the host by the loader. Returns the subset
    /// of names that were actually new (not already claimed by another
    /// module or plugin) so the loader can warn about the rest.
    pub fn register_plugin_capabilities(
        &self,
        plugin_id: &str,
        captured: CapabilitySnapshot,
    ) -> CapabilitySnapshot {
        let mut state = self.state.lock();
        let mut accepted = CapabilitySnapshot::default();

        for name in captured.tools {
            if state.registered_tools.insert(name.clone()) {
                accepted.tools.insert(name);
            } else {
                state.duplicates_skipped += 1;
                warn!(plugin = plugin_id, tool = %name, "plugin tool name collides with existing registration");
            }
        }
        for name in captured.resources {
            if state.registered_resources.insert(name.clone()) {
                accepted.resources.insert(name);
            } else {
                state.duplicates_skipped += 1;
                warn!(plugin = plugin_id, resource = %name, "plugin resource name collides with existing registration");
            }
        }
        for name in captured.prompts {
            if state.registered_prompts.insert(name.clone()) {
                accepted.prompts.insert(name);
            } else {
                state.duplicates_skipped += 1;
                warn!(plugin = plugin_id, prompt = %name, "plugin prompt name collides with existing registration");
            }
        }

        state
            .plugin_capabilities
            .insert(plugin_id.to_string(), accepted.clone());
        accepted
    }

    /// Remove all bookkeeping (and host registrations) for a plugin. Used on
    /// unload and as the first half of a reload.
    pub fn unregister_plugin_capabilities(&self, plugin_id: &str) {
        let snapshot = {
            let mut state = self.state.lock();
            state.plugin_capabilities.remove(plugin_id)
        };
        let Some(snapshot) = snapshot else {
            return;
        };
        for name in &snapshot.tools {
            let _ = self.host.unregister_tool(name);
            self.state.lock().registered_tools.remove(name);
        }
        for name in &snapshot.resources {
            let _ = self.host.unregister_resource(name);
            self.state.lock().registered_resources.remove(name);
        }
        for name in &snapshot.prompts {
            let _ = self.host.unregister_prompt(name);
            self.state.lock().registered_prompts.remove(name);
        }
    }

    /// Apply a full capability diff, removals before additions, so a reload
    /// that keeps the same tool name never trips the host's duplicate-name
    /// guard. Returns the snapshot that should replace the plugin's stored
    /// one.
    pub fn apply_plugin_capability_diff(
        &self,
        plugin_id: &str,
        diff: CapabilityDiff,
    ) -> CapabilitySnapshot {
        {
            let mut state = self.state.lock();
            let removed_tools = diff.tools.removed.iter().collect::<HashSet<_>>();
            let removed_resources = diff.resources.removed.iter().collect::<HashSet<_>>();
            let removed_prompts = diff.prompts.removed.iter().collect::<HashSet<_>>();

            for name in &diff.tools.removed {
                let _ = self.host.unregister_tool(name);
                state.registered_tools.remove(name);
            }
            for name in &diff.resources.removed {
                let _ = self.host.unregister_resource(name);
                state.registered_resources.remove(name);
            }
            for name in &diff.prompts.removed {
                let _ = self.host.unregister_prompt(name);
                state.registered_prompts.remove(name);
            }

            if let Some(existing) = state.plugin_capabilities.get_mut(plugin_id) {
                existing.tools.retain(|t| !removed_tools.contains(t));
                existing
                    .resources
                    .retain(|r| !removed_resources.contains(r));
                existing.prompts.retain(|p| !removed_prompts.contains(p));
            }
        }

        for added in &diff.tools.added {
            let _ = self.host.register_tool(
                &added.name,
                added.definition.clone(),
                added.handler.clone(),
            );
        }
        for added in &diff.resources.added {
            let _ = self.host.register_resource(
                &added.name,
                &added.uri,
                added.metadata.clone(),
                added.reader.clone(),
            );
        }
        for added in &diff.prompts.added {
            let _ = self.host.register_prompt(
                &added.name,
                added.config.clone(),
                added.callback.clone(),
            );
        }

        let mut state = self.state.lock();
        let entry = state
            .plugin_capabilities
            .entry(plugin_id.to_string())
            .or_default();
        for added in &diff.tools.added {
            state.registered_tools.insert(added.name.clone());
            entry.tools.insert(added.name.clone());
        }
        for added in &diff.resources.added {
            state.registered_resources.insert(added.name.clone());
            entry.resources.insert(added.name.clone());
        }
        for added in &diff.prompts.added {
            state.registered_prompts.insert(added.name.clone());
            entry.prompts.insert(added.name.clone());
        }
        state.plugin_capabilities.get(plugin_id).cloned().unwrap_or_default()
    }

    pub fn plugin_snapshot(&self, plugin_id: &str) -> Option<CapabilitySnapshot> {
        self.state.lock().plugin_capabilities.get(plugin_id).cloned()
    }

    pub fn stats(&self) -> RegistryStats {
        let state = self.state.lock();
        let categories = state
            .categories
            .iter()
            .map(|(cat, modules)| (cat.clone(), modules.len()))
            .collect();
        RegistryStats {
            module_count: state.modules.len(),
            unique_tools: state.registered_tools.len(),
            total_registrations: state.total_registrations,
            categories,
            duplicates_skipped: state.duplicates_skipped,
        }
    }

    pub fn modules(&self) -> HashMap<String, ModuleRecord> {
        self.state.lock().modules.clone()
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.state.lock().registered_tools.iter().cloned().collect()
    }
}
