//! Centralized environment-flag evaluation.
//!
//! Every strict/permissive policy decision in the plugin lifecycle is
//! materialized once, here, rather than read from the environment ad hoc at
//! each call site. Tests build a `PolicyFlags` directly instead of touching
//! process environment.

use std::env;

fn truthy(raw: &str) -> bool {
    matches!(raw, "1" | "true" | "TRUE" | "yes" | "on")
}

fn flag(name: &str) -> bool {
    env::var(name).map(|v| truthy(&v)).unwrap_or(false)
}

#[derive(Debug, Clone, Default)]
pub struct PolicyFlags {
    pub strict_capabilities: bool,
    pub strict_integrity: bool,
    pub strict_sbom: bool,
    pub require_signatures: bool,
    pub allow_runtime_deps: bool,
    pub allow_native: bool,
    pub sandbox_available: bool,
    pub schema_path: Option<String>,
    pub trusted_key_ids: Vec<String>,
    pub trusted_keys_dir: Option<String>,
    pub debug_registry: bool,
    pub debug_adapter: bool,
    pub use_discovery: bool,
}

impl PolicyFlags {
    /// Read all recognized flags from the process environment.
    pub fn from_env() -> Self {
        let require_signatures = flag("REQUIRE_SIGNATURES") || flag("PLUGIN_REQUIRE_SIGNED");
        let trusted_key_ids = env::var("PLUGIN_TRUSTED_KEY_IDS")
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();

        Self {
            strict_capabilities: flag("STRICT_CAPABILITIES"),
            strict_integrity: flag("STRICT_INTEGRITY"),
            strict_sbom: flag("STRICT_SBOM"),
            require_signatures,
            allow_runtime_deps: flag("PLUGIN_ALLOW_RUNTIME_DEPS"),
            allow_native: flag("PLUGIN_ALLOW_NATIVE"),
            sandbox_available: flag("SANDBOX_AVAILABLE"),
            schema_path: env::var("SCHEMA_PATH").ok(),
            trusted_key_ids,
            trusted_keys_dir: env::var("PLUGIN_TRUSTED_KEYS_DIR").ok(),
            debug_registry: flag("DEBUG_REGISTRY"),
            debug_adapter: flag("DEBUG_ADAPTER"),
            use_discovery: flag("REGISTRY_USE_DISCOVERY"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truthy_recognizes_common_spellings() {
        for v in ["1", "true", "TRUE", "yes", "on"] {
            assert!(truthy(v), "{v} should be truthy");
        }
        for v in ["0", "false", "", "no"] {
            assert!(!truthy(v), "{v} should not be truthy");
        }
    }

    #[test]
    fn default_flags_are_all_off() {
        let flags = PolicyFlags::default();
        assert!(!flags.strict_capabilities);
        assert!(!flags.require_signatures);
        assert!(flags.trusted_key_ids.is_empty());
    }
}
