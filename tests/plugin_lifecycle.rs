//! Integration coverage for discovery, dependency ordering, and the
//! load/quarantine error path, exercised against real temp-directory
//! fixtures rather than mocks.

use std::fs;
use std::sync::Arc;

use probeforge::api::CoreError;
use probeforge::config::{PluginsConfig, PolicyFlags};
use probeforge::plugins::{discovery, PluginLoader, PluginManager, PluginState, TrustedKeyStore};
use probeforge::registry::CapabilityRegistry;
use probeforge::InMemorySessionHost;

fn write_plugin(root: &std::path::Path, id: &str, deps: &[&str]) {
    let dir = root.join(id);
    fs::create_dir_all(dir.join("dist")).unwrap();
    fs::write(dir.join("dist/plugin.wasm"), b"not a real wasm module").unwrap();

    let deps_json = deps
        .iter()
        .map(|d| format!("\"{d}\": \"*\""))
        .collect::<Vec<_>>()
        .join(",");

    let manifest = format!(
        r#"{{
            "manifestVersion": 2,
            "name": "{id}",
            "version": "0.1.0",
            "entry": "dist/plugin.wasm",
            "dist": {{ "hash": "sha256:deadbeef" }},
            "dependencies": {{ {deps_json} }},
            "capabilities": {{ "tools": ["{id}_tool"] }}
        }}"#
    );
    fs::write(dir.join("mcp-plugin.json"), manifest).unwrap();
}

fn manager_over(root: &std::path::Path) -> PluginManager {
    manager_over_with_policy(root, PolicyFlags::default())
}

fn manager_over_with_policy(root: &std::path::Path, policy: PolicyFlags) -> PluginManager {
    let host = InMemorySessionHost::new();
    let registry = Arc::new(CapabilityRegistry::new(host.clone()));
    let loader = Arc::new(PluginLoader::new(
        host,
        registry,
        TrustedKeyStore::empty(),
        policy,
    ));
    let config = PluginsConfig {
        install_dir: root.display().to_string(),
        ..PluginsConfig::default()
    };
    PluginManager::new(config, loader)
}

#[test]
fn discover_finds_only_manifest_bearing_directories() {
    let root = tempfile::tempdir().unwrap();
    write_plugin(root.path(), "p1", &[]);
    fs::create_dir_all(root.path().join("not-a-plugin")).unwrap();

    let found = discovery::discover(&[root.path().to_path_buf()]);
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, "p1");
}

#[tokio::test]
async fn load_with_bogus_wasm_bytes_ends_in_error_but_is_not_quarantined() {
    let root = tempfile::tempdir().unwrap();
    write_plugin(root.path(), "broken", &[]);

    let manager = manager_over(root.path());
    let results = manager.load_all().await;

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].state, PluginState::Error);
    assert!(results[0].last_error.is_some());

    // Quarantine is reserved for signature failures; a wasm instantiation
    // error leaves the plugin directory in place so an operator can inspect
    // or fix it without digging it out of `.quarantine`.
    let original_dir = root.path().join("broken");
    assert!(original_dir.exists(), "non-signature failures must not move the plugin directory");
    let quarantine_root = root.path().join(".quarantine");
    assert!(!quarantine_root.exists(), "non-signature failures must not create a quarantine directory");
}

#[tokio::test]
async fn load_with_missing_required_signature_is_quarantined() {
    let root = tempfile::tempdir().unwrap();
    write_plugin(root.path(), "unsigned", &[]);

    let policy = PolicyFlags {
        require_signatures: true,
        ..PolicyFlags::default()
    };
    let manager = manager_over_with_policy(root.path(), policy);
    let results = manager.load_all().await;

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].state, PluginState::Error);
    assert!(results[0].last_error.as_deref().unwrap_or("").contains("signature"));

    let original_dir = root.path().join("unsigned");
    assert!(!original_dir.exists(), "signature failures should have the plugin directory moved aside");
    let quarantine_root = root.path().join(".quarantine");
    let entries: Vec<_> = fs::read_dir(&quarantine_root).unwrap().collect();
    assert_eq!(entries.len(), 1);
}

#[tokio::test]
async fn batch_load_respects_dependency_order() {
    let root = tempfile::tempdir().unwrap();
    write_plugin(root.path(), "lib", &[]);
    write_plugin(root.path(), "app", &["lib"]);

    let manager = manager_over(root.path());
    let results = manager.load_all().await;

    // Both plugins fail to instantiate (bogus wasm bytes) but the manager
    // must still have attempted them in dependency order.
    let ids: Vec<_> = results.iter().map(|r| r.id.clone()).collect();
    let lib_pos = ids.iter().position(|id| id == "lib").unwrap();
    let app_pos = ids.iter().position(|id| id == "app").unwrap();
    assert!(lib_pos < app_pos, "lib must be attempted before its dependent app");
}

#[test]
fn manifest_rejects_dependency_cycle_members_by_name() {
    let err = CoreError::Cycle {
        members: vec!["a".into(), "b".into()],
    };
    let message = err.to_string();
    assert!(message.contains('a') && message.contains('b'));
}
