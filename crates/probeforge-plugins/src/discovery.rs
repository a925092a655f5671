//! Plugin Discovery: finds candidate plugin directories under the
//! configured install directory and any extra load paths.
//!
//! Grounded on `src/plugins/discovery.rs`-style walkers, which walk a fixed
//! set of root directories one level deep looking for a manifest file.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::manifest::PluginManifest;

pub const MANIFEST_FILENAME: &str = "mcp-plugin.json";

#[derive(Debug, Clone)]
pub struct DiscoveredPlugin {
    pub id: String,
    pub dir: PathBuf,
    pub manifest_path: PathBuf,
}

/// Scan each root directory one level deep for `<root>/<id>/mcp-plugin.json`.
/// Roots that don't exist are skipped quietly -- an optional load path not
/// being present yet is normal, not an error.
pub fn discover(roots: &[PathBuf]) -> Vec<DiscoveredPlugin> {
    let mut found = Vec::new();
    for root in roots {
        if !root.is_dir() {
            debug!(root = %root.display(), "plugin root does not exist, skipping");
            continue;
        }
        let entries = match std::fs::read_dir(root) {
            Ok(entries) => entries,
            Err(err) => {
                warn!(root = %root.display(), error = %err, "failed to read plugin root");
                continue;
            }
        };
        for entry in entries.flatten() {
            let dir = entry.path();
            if !dir.is_dir() {
                continue;
            }
            let manifest_path = dir.join(MANIFEST_FILENAME);
            if !manifest_path.is_file() {
                continue;
            }
            let Some(basename) = dir.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let id = PluginManifest::load(&manifest_path)
                .map(|m| m.name)
                .unwrap_or_else(|_| basename.to_string());
            found.push(DiscoveredPlugin {
                id,
                dir,
                manifest_path,
            });
        }
    }
    found
}

/// Expand `~` in a configured path to the process's home directory, the same
/// way a config loader resolves `install_dir`.
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = std::env::var_os("HOME") {
            return Path::new(&home).join(rest);
        }
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn discovers_only_directories_with_manifests() {
        let root = tempfile::tempdir().unwrap();
        let with_manifest = root.path().join("good-plugin");
        fs::create_dir_all(&with_manifest).unwrap();
        fs::write(with_manifest.join(MANIFEST_FILENAME), "").unwrap();

        let without_manifest = root.path().join("not-a-plugin");
        fs::create_dir_all(&without_manifest).unwrap();

        let found = discover(&[root.path().to_path_buf()]);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "good-plugin");
    }

    #[test]
    fn missing_root_is_not_an_error() {
        let found = discover(&[PathBuf::from("/nonexistent/probeforge-test-root")]);
        assert!(found.is_empty());
    }
}
