//! Plugin manifest (v2): the on-disk JSON descriptor that drives discovery,
//! integrity verification, policy gating, and capability preflight.
//!
//! Grounded on `src/js/manifest/mod.rs`, which carries the same shape
//! (versioned manifest, declared capabilities, permission lists, wildcard
//! matching) for its hook-plugin system; this module generalizes it
//! to the dist-hash/signature/dependency-policy fields the full lifecycle
//! needs.

use std::collections::HashMap;
use std::path::Path;

use probeforge_api::CoreError;
use serde::{Deserialize, Serialize};

pub const SUPPORTED_MANIFEST_VERSION: u32 = 2;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginManifest {
    #[serde(rename = "manifestVersion")]
    pub manifest_version: u32,
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Relative path to the WASM entry module, e.g. `dist/plugin.wasm`.
    pub entry: String,
    pub dist: DistInfo,
    #[serde(default)]
    pub dependencies: HashMap<String, String>,
    #[serde(default, rename = "dependenciesPolicy")]
    pub dependencies_policy: DependenciesPolicy,
    #[serde(default, rename = "externalDependencies")]
    pub external_dependencies: Vec<String>,
    #[serde(default)]
    pub permissions: Permissions,
    pub capabilities: CapabilitiesDeclaration,
    #[serde(default)]
    pub signatures: Vec<SignatureEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistInfo {
    /// `sha256:<64 hex>` of the sorted dist directory. See `dist_hash`.
    pub hash: String,
    #[serde(default, rename = "fileCount")]
    pub file_count: Option<u64>,
    #[serde(default, rename = "totalBytes")]
    pub total_bytes: Option<u64>,
    /// `"all"` requires every file under `dist/` to also appear in
    /// `checksums.files`, individually verified (`STRICT_INTEGRITY`).
    #[serde(default)]
    pub coverage: Option<String>,
    #[serde(default)]
    pub checksums: Option<ChecksumManifest>,
}

impl DistInfo {
    pub fn with_hash(hash: impl Into<String>) -> Self {
        Self {
            hash: hash.into(),
            file_count: None,
            total_bytes: None,
            coverage: None,
            checksums: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChecksumManifest {
    pub files: Vec<FileChecksum>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileChecksum {
    pub path: String,
    pub alg: String,
    pub value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum DependenciesPolicy {
    #[default]
    BundledOnly,
    ExternalAllowlist,
    SandboxRequired,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Permissions {
    #[serde(default)]
    pub network: Vec<String>,
    #[serde(default)]
    pub filesystem: Vec<String>,
    #[serde(default)]
    pub env: Vec<String>,
    #[serde(default)]
    pub native: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CapabilitiesDeclaration {
    #[serde(default)]
    pub tools: Vec<String>,
    #[serde(default)]
    pub resources: Vec<String>,
    #[serde(default)]
    pub prompts: Vec<String>,
}

impl CapabilitiesDeclaration {
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty() && self.resources.is_empty() && self.prompts.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignatureEntry {
    #[serde(rename = "keyId")]
    pub key_id: String,
    pub algorithm: SignatureAlgorithm,
    /// base64-encoded raw signature bytes over the dist hash.
    pub signature: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum SignatureAlgorithm {
    Ed25519,
    EcdsaP256Sha256,
    RsaSha256,
}

impl PluginManifest {
    pub fn parse(raw: &str) -> Result<Self, CoreError> {
        let manifest: PluginManifest = serde_json::from_str(raw)
            .map_err(|e| CoreError::manifest(Path::new("<in-memory>"), e.to_string()))?;
        manifest.validate_shape()?;
        Ok(manifest)
    }

    pub fn load(path: &Path) -> Result<Self, CoreError> {
        let raw = std::fs::read_to_string(path)?;
        let manifest: PluginManifest = serde_json::from_str(&raw)
            .map_err(|e| CoreError::manifest(path, e.to_string()))?;
        manifest.validate_shape_at(path)?;
        Ok(manifest)
    }

    fn validate_shape(&self) -> Result<(), CoreError> {
        self.validate_shape_at(Path::new(&self.name))
    }

    fn validate_shape_at(&self, path: &Path) -> Result<(), CoreError> {
        if self.manifest_version != SUPPORTED_MANIFEST_VERSION {
            return Err(CoreError::manifest(
                path,
                format!(
                    "unsupported manifestVersion {} (expected {SUPPORTED_MANIFEST_VERSION})",
                    self.manifest_version
                ),
            ));
        }
        if self.name.trim().is_empty() {
            return Err(CoreError::manifest(path, "name must not be empty"));
        }
        if !self.entry.ends_with(".wasm") {
            return Err(CoreError::manifest(
                path,
                format!("entry '{}' must point at a .wasm module", self.entry),
            ));
        }
        if self.capabilities.is_empty() {
            return Err(CoreError::manifest(
                path,
                "capabilities must declare at least one tool, resource, or prompt",
            ));
        }
        if self.dependencies_policy == DependenciesPolicy::ExternalAllowlist
            && self.external_dependencies.is_empty()
        {
            return Err(CoreError::manifest(
                path,
                "dependenciesPolicy external-allowlist requires a non-empty externalDependencies list",
            ));
        }
        Ok(())
    }
}

/// Match a permission/capability wildcard pattern against a concrete name.
/// Supports a single trailing `*` (e.g. `net.dns.*`), matching the style of
/// hook-registry wildcard matching elsewhere in this tree.
pub fn matches_pattern(pattern: &str, name: &str) -> bool {
    match pattern.strip_suffix('*') {
        Some(prefix) => name.starts_with(prefix),
        None => pattern == name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_json() -> String {
        r#"{
            "manifestVersion": 2,
            "name": "net-probe",
            "version": "0.1.0",
            "entry": "dist/plugin.wasm",
            "dist": { "hash": "deadbeef" },
            "capabilities": { "tools": ["probe_host"] }
        }"#
        .to_string()
    }

    #[test]
    fn parses_minimal_manifest() {
        let manifest = PluginManifest::parse(&sample_json()).unwrap();
        assert_eq!(manifest.name, "net-probe");
        assert_eq!(manifest.dependencies_policy, DependenciesPolicy::BundledOnly);
    }

    #[test]
    fn rejects_non_wasm_entry() {
        let raw = sample_json().replace("dist/plugin.wasm", "dist/plugin.js");
        assert!(PluginManifest::parse(&raw).is_err());
    }

    #[test]
    fn rejects_empty_capabilities() {
        let raw = r#"{
            "manifestVersion": 2,
            "name": "net-probe",
            "version": "0.1.0",
            "entry": "dist/plugin.wasm",
            "dist": { "hash": "deadbeef" },
            "capabilities": {}
        }"#;
        assert!(PluginManifest::parse(raw).is_err());
    }

    #[test]
    fn wildcard_matching() {
        assert!(matches_pattern("net.dns.*", "net.dns.resolve"));
        assert!(!matches_pattern("net.dns.*", "net.http.fetch"));
        assert!(matches_pattern("exact.name", "exact.name"));
    }
}
