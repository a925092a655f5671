//! `[plugins]` configuration section.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Per-plugin override under `[plugins.entries.<id>]`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PluginEntryConfig {
    pub enabled: Option<bool>,
    #[serde(default)]
    pub config: serde_json::Value,
}

/// Top-level plugin system configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginsConfig {
    #[serde(default)]
    pub enabled: bool,
    /// IDs that are blocked regardless of anything else.
    #[serde(default)]
    pub deny: Vec<String>,
    /// When non-empty, only these IDs may load.
    #[serde(default)]
    pub allow: Vec<String>,
    #[serde(default)]
    pub entries: HashMap<String, PluginEntryConfig>,
    /// Extra plugin root directories to scan, beyond the standard locations.
    #[serde(default)]
    pub load_paths: Vec<String>,
    /// Directory plugins are installed into by `PluginManager::install`.
    #[serde(default = "default_install_dir")]
    pub install_dir: String,
}

fn default_install_dir() -> String {
    "~/.probeforge/plugins".into()
}

impl Default for PluginsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            deny: Vec::new(),
            allow: Vec::new(),
            entries: HashMap::new(),
            load_paths: Vec::new(),
            install_dir: default_install_dir(),
        }
    }
}

impl PluginsConfig {
    /// Whether `id` is permitted to load under the current allow/deny lists
    /// and per-entry override. Does not consider the system-wide `enabled` flag.
    pub fn resolve_enable(&self, id: &str) -> Result<(), String> {
        if self.deny.iter().any(|d| d == id) {
            return Err("blocked by denylist".into());
        }
        if !self.allow.is_empty() && !self.allow.iter().any(|a| a == id) {
            return Err("not in allowlist".into());
        }
        if let Some(entry) = self.entries.get(id) {
            if entry.enabled == Some(false) {
                return Err("disabled in config".into());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn denylist_wins_over_allowlist() {
        let cfg = PluginsConfig {
            allow: vec!["a".into()],
            deny: vec!["a".into()],
            ..Default::default()
        };
        assert!(cfg.resolve_enable("a").is_err());
    }

    #[test]
    fn empty_allowlist_permits_everything() {
        let cfg = PluginsConfig::default();
        assert!(cfg.resolve_enable("anything").is_ok());
    }

    #[test]
    fn per_entry_disable_wins() {
        let mut cfg = PluginsConfig::default();
        cfg.entries.insert(
            "a".into(),
            PluginEntryConfig {
                enabled: Some(false),
                config: serde_json::Value::Null,
            },
        );
        assert!(cfg.resolve_enable("a").is_err());
    }
}
