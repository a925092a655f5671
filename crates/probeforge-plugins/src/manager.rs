//! Plugin Manager: the single entry point for installing, loading,
//! reloading, unloading, and removing plugins, plus dependency-ordered batch
//! loading at startup.
//!
//! Grounded on the `src/clawhub` package client for the
//! fetch/verify/stage/finalize install pipeline, and on
//! `src/plugins/mod.rs` for the load/unload/reload surface. Per-plugin
//! mutations are serialized through a per-id `tokio::sync::Mutex` so a
//! reload triggered by the hot-reload watcher can never interleave with a
//! concurrent manual unload of the same plugin.

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::Mutex as SyncMutex;
use probeforge_api::CoreError;
use probeforge_config::PluginsConfig;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{error, info, warn};

use crate::discovery::{discover, expand_home, DiscoveredPlugin};
use crate::install::{stage_source, InstallOptions, InstallSource};
use crate::lock_file::{LockEntry, LockFile, LOCK_FILENAME};
use crate::loader::PluginLoader;
use crate::manifest::PluginManifest;
use crate::record::{PluginRecord, PluginState};

const QUARANTINE_DIR: &str = ".quarantine";

pub struct PluginManager {
    install_dir: PathBuf,
    load_paths: Vec<PathBuf>,
    config: PluginsConfig,
    loader: Arc<PluginLoader>,
    records: SyncMutex<HashMap<String, PluginRecord>>,
    per_plugin_locks: SyncMutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl PluginManager {
    pub fn new(config: PluginsConfig, loader: Arc<PluginLoader>) -> Self {
        let install_dir = expand_home(&config.install_dir);
        let load_paths = config.load_paths.iter().map(|p| expand_home(p)).collect();
        Self {
            install_dir,
            load_paths,
            config,
            loader,
            records: SyncMutex::new(HashMap::new()),
            per_plugin_locks: SyncMutex::new(HashMap::new()),
        }
    }

    /// Every directory the manager discovers and watches plugins under: the
    /// install directory plus any extra configured load paths.
    pub fn roots(&self) -> Vec<PathBuf> {
        let mut roots = vec![self.install_dir.clone()];
        roots.extend(self.load_paths.iter().cloned());
        roots
    }

    fn lock_for(&self, id: &str) -> Arc<AsyncMutex<()>> {
        self.per_plugin_locks
            .lock()
            .entry(id.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    pub fn records(&self) -> HashMap<String, PluginRecord> {
        self.records.lock().clone()
    }

    pub fn record(&self, id: &str) -> Option<PluginRecord> {
        self.records.lock().get(id).cloned()
    }

    /// Discover every plugin under the configured roots and load them in
    /// dependency order, so a plugin whose manifest names another plugin id
    /// as a dependency never loads before it.
    pub async fn load_all(&self) -> Vec<PluginRecord> {
        let discovered = discover(&self.roots());
        let order = match Self::dependency_order(&discovered) {
            Ok(order) => order,
            Err(err) => {
                error!(error = %err, "dependency graph rejected, falling back to discovery order");
                discovered.iter().map(|p| p.id.clone()).collect()
            }
        };
        let by_id: HashMap<_, _> = discovered.into_iter().map(|p| (p.id.clone(), p)).collect();

        let mut results = Vec::new();
        for id in order {
            let Some(plugin) = by_id.get(&id) else { continue };
            results.push(self.load_one(plugin).await);
        }
        results
    }

    fn dependency_order(plugins: &[DiscoveredPlugin]) -> Result<Vec<String>, CoreError> {
        let mut manifests = HashMap::new();
        for plugin in plugins {
            if let Ok(manifest) = PluginManifest::load(&plugin.manifest_path) {
                manifests.insert(plugin.id.clone(), manifest);
            }
        }

        let ids: HashSet<_> = manifests.keys().cloned().collect();
        let mut in_degree: HashMap<String, usize> = ids.iter().map(|id| (id.clone(), 0)).collect();
        let mut dependents: HashMap<String, Vec<String>> =
            ids.iter().map(|id| (id.clone(), Vec::new())).collect();

        for (id, manifest) in &manifests {
            for dep in manifest.dependencies.keys() {
                if ids.contains(dep) {
                    dependents.get_mut(dep).unwrap().push(id.clone());
                    *in_degree.get_mut(id).unwrap() += 1;
                }
            }
        }

        let mut queue: VecDeque<String> = in_degree
            .iter()
            .filter(|(_, degree)| **degree == 0)
            .map(|(id, _)| id.clone())
            .collect();
        let mut order = Vec::new();

        while let Some(id) = queue.pop_front() {
            order.push(id.clone());
            for dependent in dependents.get(&id).cloned().unwrap_or_default() {
                let degree = in_degree.get_mut(&dependent).unwrap();
                *degree -= 1;
                if *degree == 0 {
                    queue.push_back(dependent);
                }
            }
        }

        if order.len() != ids.len() {
            let stuck: Vec<String> = ids.difference(&order.iter().cloned().collect()).cloned().collect();
            return Err(CoreError::Cycle { members: stuck });
        }

        // Plugins with unreadable manifests still get a load attempt (and
        // fail loudly there) but have no declared dependencies to order by.
        for plugin in plugins {
            if !order.contains(&plugin.id) {
                order.push(plugin.id.clone());
            }
        }
        Ok(order)
    }

    pub async fn load_one(&self, plugin: &DiscoveredPlugin) -> PluginRecord {
        let lock = self.lock_for(&plugin.id);
        let _guard = lock.lock().await;

        if let Err(reason) = self.config.resolve_enable(&plugin.id) {
            info!(plugin = %plugin.id, reason = %reason, "plugin disabled by configuration");
            let manifest = PluginManifest::load(&plugin.manifest_path).ok();
            let mut record = PluginRecord::new(
                plugin.id.clone(),
                plugin.dir.clone(),
                manifest.unwrap_or_else(|| crate::loader::fallback_manifest(&plugin.id)),
            );
            record.transition(PluginState::Disabled).ok();
            self.records.lock().insert(plugin.id.clone(), record.clone());
            return record;
        }

        let loader = self.loader.clone();
        let plugin_owned = plugin.clone();
        let record = tokio::task::spawn_blocking(move || loader.load(&plugin_owned))
            .await
            .unwrap_or_else(|join_err| {
                let mut record = PluginRecord::new(
                    plugin.id.clone(),
                    plugin.dir.clone(),
                    crate::loader::fallback_manifest(&plugin.id),
                );
                record.fail(format!("loader task panicked: {join_err}"));
                record
            });

        if record.state == PluginState::Error {
            if record.signature_failure {
                self.quarantine(&plugin.dir, &record.id, record.last_error.as_deref().unwrap_or("unknown"));
            }
        } else if record.state != PluginState::Disabled {
            if let Err(err) = self.write_lock_entry(&record) {
                warn!(plugin = %record.id, error = %err, "failed to update lock file after load");
            }
        }

        self.records.lock().insert(plugin.id.clone(), record.clone());
        record
    }

    /// Write or update this plugin's lock entry after a successful load, so
    /// a later discovery pass can see what dist hash and signature state it
    /// was last loaded with, even when it arrived by `load_all()` rather
    /// than `install()`.
    fn write_lock_entry(&self, record: &PluginRecord) -> Result<(), CoreError> {
        std::fs::create_dir_all(&self.install_dir)?;
        let lock_path = self.install_dir.join(LOCK_FILENAME);
        let mut lock = LockFile::load(&lock_path)?;
        lock.upsert(LockEntry {
            id: record.id.clone(),
            version: record.manifest.version.clone(),
            source: record.dir.display().to_string(),
            dist_hash: record.manifest.dist.hash.clone(),
            installed_at_unix: now_unix(),
            signature_verified: !record.manifest.signatures.is_empty(),
        });
        lock.save(&lock_path)
    }

    pub async fn unload(&self, id: &str) -> Result<(), CoreError> {
        let lock = self.lock_for(id);
        let _guard = lock.lock().await;

        self.loader.registry().unregister_plugin_capabilities(id);
        let mut records = self.records.lock();
        if let Some(record) = records.get_mut(id) {
            record.transition(PluginState::Unloaded)?;
        }
        Ok(())
    }

    /// Reload a plugin: unload (removing its capabilities from the host
    /// first) then load fresh. Doing the removal through `unload` before
    /// re-running the loader is what keeps a renamed-but-still-present tool
    /// from tripping the host's duplicate-registration guard.
    pub async fn reload(&self, id: &str) -> Result<PluginRecord, CoreError> {
        let dir = {
            let records = self.records.lock();
            records.get(id).map(|r| r.dir.clone())
        };
        let Some(dir) = dir else {
            return Err(CoreError::State(format!("unknown plugin '{id}'")));
        };
        self.unload(id).await?;

        let manifest_path = dir.join(crate::discovery::MANIFEST_FILENAME);
        let discovered = DiscoveredPlugin {
            id: id.to_string(),
            dir,
            manifest_path,
        };
        let record = self.load_one(&discovered).await;
        info!(plugin = id, state = ?record.state, "plugin reloaded");
        Ok(record)
    }

    pub async fn install(
        &self,
        source: InstallSource,
        options: InstallOptions,
    ) -> Result<PluginRecord, CoreError> {
        let staged = stage_source(source).await?;
        let manifest = PluginManifest::load(&staged.manifest_path())?;
        let dist_dir = staged.path.join(
            Path::new(&manifest.entry).parent().unwrap_or_else(|| Path::new("dist")),
        );
        crate::dist_hash::verify_dist_hash(&manifest.name, &dist_dir, &manifest.dist.hash)?;

        let policy = self.loader.policy();
        if policy.strict_integrity && options.checksum.is_none() {
            return Err(CoreError::policy(
                &manifest.name,
                "checksum required by policy (STRICT_INTEGRITY) but none was supplied",
            ));
        }
        if let Some(checksum) = &options.checksum {
            crate::install::verify_checksum(&manifest.name, &dist_dir, checksum)?;
        }
        if policy.require_signatures && options.signature.is_none() {
            return Err(CoreError::policy(
                &manifest.name,
                "detached signature required by policy (REQUIRE_SIGNATURES) but none was supplied",
            ));
        }
        let signature_verified = if let Some(signature) = &options.signature {
            crate::install::verify_detached_signature(&manifest.name, &manifest.dist.hash, signature)?;
            true
        } else {
            !manifest.signatures.is_empty()
        };

        let final_dir = self.install_dir.join(&manifest.name);
        if final_dir.exists() {
            return Err(CoreError::manifest(
                &final_dir,
                format!("install destination '{}' already exists", final_dir.display()),
            ));
        }
        std::fs::create_dir_all(&self.install_dir)?;
        std::fs::rename(&staged.path, &final_dir)?;

        let manifest_path = final_dir.join(crate::discovery::MANIFEST_FILENAME);
        let discovered = DiscoveredPlugin {
            id: manifest.name.clone(),
            dir: final_dir,
            manifest_path,
        };
        let record = self.load_one(&discovered).await;

        let lock_path = self.install_dir.join(LOCK_FILENAME);
        let mut lock = LockFile::load(&lock_path)?;
        lock.upsert(LockEntry {
            id: manifest.name.clone(),
            version: manifest.version.clone(),
            source: staged.source_description.clone(),
            dist_hash: manifest.dist.hash.clone(),
            installed_at_unix: now_unix(),
            signature_verified,
        });
        lock.save(&lock_path)?;

        Ok(record)
    }

    pub async fn remove(&self, id: &str) -> Result<(), CoreError> {
        self.unload(id).await?;
        let dir = self.install_dir.join(id);
        if dir.exists() {
            std::fs::remove_dir_all(&dir)?;
        }
        let lock_path = self.install_dir.join(LOCK_FILENAME);
        let mut lock = LockFile::load(&lock_path)?;
        lock.remove(id);
        lock.save(&lock_path)?;
        self.records.lock().remove(id);
        Ok(())
    }

    /// Atomically move a failed plugin's directory aside so a bad drop
    /// can't keep crashing every subsequent discovery pass.
    fn quarantine(&self, dir: &Path, id: &str, reason: &str) {
        let quarantine_root = self.install_dir.join(QUARANTINE_DIR);
        if std::fs::create_dir_all(&quarantine_root).is_err() {
            return;
        }
        let dest = quarantine_root.join(format!("{id}-{}", now_unix()));
        match std::fs::rename(dir, &dest) {
            Ok(()) => warn!(plugin = id, reason, dest = %dest.display(), "plugin quarantined"),
            Err(err) => warn!(plugin = id, error = %err, "failed to quarantine plugin directory"),
        }
    }
}

fn now_unix() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
