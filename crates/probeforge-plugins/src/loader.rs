//! Plugin Loader: turns a discovered plugin directory into registered
//! capabilities on the session host.
//!
//! The pipeline mirrors the `src/plugins/loader.rs` control flow
//! (parse, validate, instantiate, forward registrations) but adds the
//! integrity, policy, and signature gates the dist-hash-and-signing manifest
//! format needs before a module is ever instantiated.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use probeforge_api::{CoreError, SessionHost};
use probeforge_config::PolicyFlags;
use probeforge_registry::{
    adapt_tool_to_host, CapabilityRegistry, CapabilitySnapshot, ToolCandidate,
    ToolValidationManager, ValidationMode,
};
use tracing::{info, warn};

use crate::dist_hash::verify_dist_hash;
use crate::discovery::DiscoveredPlugin;
use crate::manifest::{DependenciesPolicy, PluginManifest};
use crate::record::{PluginRecord, PluginState};
use crate::signature::{verify_manifest_signatures, TrustedKeyStore};
use crate::wasm::{WasmEntry, WasmPromptProxy, WasmResourceProxy, WasmToolProxy};

pub struct PluginLoader {
    host: Arc<dyn SessionHost>,
    registry: Arc<CapabilityRegistry>,
    keystore: TrustedKeyStore,
    policy: PolicyFlags,
}

impl PluginLoader {
    pub fn registry(&self) -> &Arc<CapabilityRegistry> {
        &self.registry
    }

    pub fn policy(&self) -> &PolicyFlags {
        &self.policy
    }

    pub fn new(
        host: Arc<dyn SessionHost>,
        registry: Arc<CapabilityRegistry>,
        keystore: TrustedKeyStore,
        policy: PolicyFlags,
    ) -> Self {
        Self {
            host,
            registry,
            keystore,
            policy,
        }
    }

    fn dist_dir(dir: &Path, manifest: &PluginManifest) -> PathBuf {
        Path::new(&manifest.entry)
            .parent()
            .map(|p| dir.join(p))
            .unwrap_or_else(|| dir.join("dist"))
    }

    fn check_policy(&self, manifest: &PluginManifest) -> Result<(), CoreError> {
        if manifest.permissions.native && !self.policy.allow_native {
            return Err(CoreError::policy(
                &manifest.name,
                "plugin requests native permission but PLUGIN_ALLOW_NATIVE is not set",
            ));
        }
        if manifest.dependencies_policy == DependenciesPolicy::SandboxRequired
            && !self.policy.sandbox_available
        {
            return Err(CoreError::policy(
                &manifest.name,
                "plugin requires a sandbox but SANDBOX_AVAILABLE is not set",
            ));
        }
        if manifest.dependencies_policy == DependenciesPolicy::ExternalAllowlist
            && !manifest.external_dependencies.is_empty()
            && !self.policy.allow_runtime_deps
        {
            return Err(CoreError::policy(
                &manifest.name,
                "plugin declares external runtime dependencies but PLUGIN_ALLOW_RUNTIME_DEPS is not set",
            ));
        }
        Ok(())
    }

    /// Run the full load pipeline for one discovered plugin, forwarding
    /// accepted capabilities to the host and returning the resulting record.
    /// A failure at any stage leaves the plugin in `PluginState::Error` with
    /// `last_error` set, rather than propagating -- callers decide whether
    /// that should trigger quarantine.
    pub fn load(&self, discovered: &DiscoveredPlugin) -> PluginRecord {
        match self.load_inner(discovered) {
            Ok(record) => record,
            Err(err) => {
                warn!(plugin = %discovered.id, error = %err, "plugin load failed");
                let manifest = PluginManifest::load(&discovered.manifest_path).unwrap_or_else(|_| {
                    fallback_manifest(&discovered.id)
                });
                let mut record = PluginRecord::new(discovered.id.clone(), discovered.dir.clone(), manifest);
                record.fail_with(&err);
                record
            }
        }
    }

    fn load_inner(&self, discovered: &DiscoveredPlugin) -> Result<PluginRecord, CoreError> {
        let manifest = PluginManifest::load(&discovered.manifest_path)?;
        let mut record = PluginRecord::new(discovered.id.clone(), discovered.dir.clone(), manifest.clone());
        record.transition(PluginState::Loading)?;

        let dist_dir = Self::dist_dir(&discovered.dir, &manifest);
        verify_dist_hash(&manifest.name, &dist_dir, &manifest.dist.hash)?;
        crate::dist_hash::verify_coverage_all(&manifest.name, &dist_dir, &manifest.dist, self.policy.strict_integrity)?;
        self.check_policy(&manifest)?;
        verify_manifest_signatures(&manifest, &self.keystore, &self.policy)?;

        let entry_path = discovered.dir.join(&manifest.entry);
        let wasm_bytes = std::fs::read(&entry_path)?;
        let entry = WasmEntry::load(&manifest.name, &wasm_bytes)?;
        let descriptor = entry.describe(&manifest.name)?;

        let validation_manager = ToolValidationManager::new(if self.policy.strict_capabilities {
            ValidationMode::Strict
        } else {
            ValidationMode::Permissive
        });

        let declared_tools: std::collections::HashSet<_> =
            manifest.capabilities.tools.iter().cloned().collect();
        let described_tools: std::collections::HashSet<_> =
            descriptor.tools.iter().map(|t| t.name.clone()).collect();

        if self.policy.strict_capabilities {
            let mut mismatched: Vec<&String> = described_tools.difference(&declared_tools).collect();
            mismatched.extend(declared_tools.difference(&described_tools));
            if !mismatched.is_empty() {
                let names: Vec<String> = mismatched.into_iter().cloned().collect();
                return Err(CoreError::policy(
                    &manifest.name,
                    format!("cap_tool mismatch between declared and described tools: {names:?}"),
                ));
            }
        } else {
            for undeclared in described_tools.difference(&declared_tools) {
                warn!(plugin = %manifest.name, tool = undeclared, "ignoring tool not declared in manifest capabilities");
            }
            for undescribed in declared_tools.difference(&described_tools) {
                warn!(plugin = %manifest.name, tool = undescribed, "manifest declares tool the entry module does not implement");
            }
        }

        let candidates: Vec<ToolCandidate> = descriptor
            .tools
            .iter()
            .filter(|t| declared_tools.contains(&t.name))
            .map(|t| ToolCandidate {
                name: t.name.clone(),
                description: t.description.clone(),
                input_schema: t.input_schema.clone(),
            })
            .collect();

        let validated = validation_manager.validate_batch(&candidates);
        if !validated.ok() && self.policy.strict_capabilities {
            return Err(CoreError::validation(
                &manifest.name,
                format!("tool validation failed: {:?}", validated.findings),
            ));
        }
        for finding in &validated.findings {
            warn!(plugin = %manifest.name, tool = %finding.tool, reason = %finding.reason, "tool rejected by validation manager");
        }

        let mut snapshot = CapabilitySnapshot::default();
        for descriptor_tool in descriptor
            .tools
            .iter()
            .filter(|t| validated.accepted.contains(&t.name))
        {
            let adapted = adapt_tool_to_host(
                &descriptor_tool.name,
                &descriptor_tool.description,
                &descriptor_tool.input_schema,
            );
            let definition = probeforge_api::ToolDefinition {
                title: descriptor_tool.title.clone(),
                description: adapted.description,
                input_schema: adapted.input_schema,
                annotations: None,
            };
            let handler = Arc::new(WasmToolProxy::new(
                entry.clone(),
                descriptor_tool.name.clone(),
                definition.clone(),
            ));
            self.host
                .register_tool(&descriptor_tool.name, definition, handler)
                .map_err(|e| CoreError::validation(&manifest.name, e.to_string()))?;
            snapshot.tools.insert(descriptor_tool.name.clone());
        }

        let declared_resources: std::collections::HashSet<_> =
            manifest.capabilities.resources.iter().cloned().collect();
        for resource in descriptor
            .resources
            .iter()
            .filter(|r| declared_resources.contains(&r.name))
        {
            let reader = Arc::new(WasmResourceProxy::new(entry.clone()));
            self.host
                .register_resource(&resource.name, &resource.uri, resource.metadata.clone(), reader)
                .map_err(|e| CoreError::validation(&manifest.name, e.to_string()))?;
            snapshot.resources.insert(resource.name.clone());
        }

        let declared_prompts: std::collections::HashSet<_> =
            manifest.capabilities.prompts.iter().cloned().collect();
        for prompt in descriptor
            .prompts
            .iter()
            .filter(|p| declared_prompts.contains(&p.name))
        {
            let callback = Arc::new(WasmPromptProxy::new(entry.clone(), prompt.name.clone()));
            self.host
                .register_prompt(&prompt.name, prompt.config.clone(), callback)
                .map_err(|e| CoreError::validation(&manifest.name, e.to_string()))?;
            snapshot.prompts.insert(prompt.name.clone());
        }

        let accepted = self.registry.register_plugin_capabilities(&discovered.id, snapshot);
        record.transition(PluginState::Loaded)?;
        record.transition(PluginState::Active)?;
        record.capabilities = accepted;

        info!(
            plugin = %discovered.id,
            tools = record.capabilities.tools.len(),
            resources = record.capabilities.resources.len(),
            prompts = record.capabilities.prompts.len(),
            "plugin active"
        );
        Ok(record)
    }
}

pub(crate) fn fallback_manifest(id: &str) -> PluginManifest {
    PluginManifest {
        manifest_version: crate::manifest::SUPPORTED_MANIFEST_VERSION,
        name: id.to_string(),
        version: "0.0.0".into(),
        description: None,
        entry: "dist/plugin.wasm".into(),
        dist: crate::manifest::DistInfo::with_hash(""),
        dependencies: Default::default(),
        dependencies_policy: Default::default(),
        external_dependencies: Vec::new(),
        permissions: Default::default(),
        capabilities: Default::default(),
        signatures: Vec::new(),
    }
}
