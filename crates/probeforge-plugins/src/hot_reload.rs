//! Hot-Reload Manager: watches plugin directories for filesystem changes and
//! triggers a debounced reload.
//!
//! No crate already in the dependency tree watches the filesystem; other MCP
//! servers (`prismworks-ai-prism-mcp-rs`) reach for `notify` for exactly this
//! job, so that's what this module imports.
//! Debouncing is manual (`notify` emits one event per syscall, and editors
//! routinely fire several for a single save) rather than pulled from a
//! dedicated debounce crate, since the window only needs to key events by
//! plugin id, not general-purpose path coalescing.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::manager::PluginManager;
use crate::record::PluginRecord;

const DEBOUNCE: Duration = Duration::from_millis(400);

/// Invoked after a hot-reload-triggered `reload()` completes, with the
/// resulting record, regardless of whether it landed in `Active` or `Error`.
pub type AfterReloadCallback = Arc<dyn Fn(&PluginRecord) + Send + Sync>;

pub struct HotReloadManager {
    _watcher: RecommendedWatcher,
    disabled: Arc<Mutex<HashSet<String>>>,
}

impl HotReloadManager {
    /// Start watching `roots` (plugin install directory plus any extra load
    /// paths) and spawn a task that reloads through `manager` whenever a
    /// plugin's files settle for `DEBOUNCE`.
    pub fn start(roots: &[PathBuf], manager: Arc<PluginManager>) -> notify::Result<Self> {
        Self::start_with_callback(roots, manager, None)
    }

    /// Same as `start`, but invokes `after_reload` (if set) with the
    /// resulting record once each triggered reload completes.
    pub fn start_with_callback(
        roots: &[PathBuf],
        manager: Arc<PluginManager>,
        after_reload: Option<AfterReloadCallback>,
    ) -> notify::Result<Self> {
        let (tx, mut rx) = mpsc::unbounded_channel::<PathBuf>();

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            if let Ok(event) = res {
                for path in event.paths {
                    let _ = tx.send(path);
                }
            }
        })?;

        for root in roots {
            if root.is_dir() {
                if let Err(err) = watcher.watch(root, RecursiveMode::Recursive) {
                    warn!(root = %root.display(), error = %err, "failed to watch plugin root");
                }
            }
        }

        let roots_owned: Vec<PathBuf> = roots.to_vec();
        let disabled: Arc<Mutex<HashSet<String>>> = Arc::new(Mutex::new(HashSet::new()));
        let disabled_for_task = disabled.clone();
        tokio::spawn(async move {
            let mut pending: HashMap<String, Instant> = HashMap::new();
            loop {
                let timeout = tokio::time::sleep(Duration::from_millis(50));
                tokio::select! {
                    maybe_path = rx.recv() => {
                        let Some(path) = maybe_path else { break };
                        if let Some(id) = plugin_id_for_path(&roots_owned, &path) {
                            pending.insert(id, Instant::now() + DEBOUNCE);
                        }
                    }
                    _ = timeout => {}
                }

                let now = Instant::now();
                let ready: Vec<String> = pending
                    .iter()
                    .filter(|(_, due)| **due <= now)
                    .map(|(id, _)| id.clone())
                    .collect();
                for id in ready {
                    pending.remove(&id);
                    if disabled_for_task.lock().contains(&id) {
                        info!(plugin = %id, "hot-reload skipped: watching disabled for this plugin");
                        continue;
                    }
                    info!(plugin = %id, "hot-reload triggered");
                    match manager.reload(&id).await {
                        Ok(record) => {
                            if let Some(cb) = &after_reload {
                                cb(&record);
                            }
                        }
                        Err(err) => warn!(plugin = %id, error = %err, "hot-reload failed"),
                    }
                }
            }
        });

        Ok(Self {
            _watcher: watcher,
            disabled,
        })
    }

    /// Enable or disable watching for one plugin id without tearing down the
    /// whole watcher. A disabled plugin's filesystem events are still
    /// received and debounced, just never turned into a `reload()` call.
    pub fn set_plugin_watch_enabled(&self, id: &str, enabled: bool) {
        let mut disabled = self.disabled.lock();
        if enabled {
            disabled.remove(id);
        } else {
            disabled.insert(id.to_string());
        }
    }
}

/// Map a raw filesystem event path back to the plugin id that owns it: the
/// first path segment under whichever watched root contains it.
fn plugin_id_for_path(roots: &[PathBuf], path: &Path) -> Option<String> {
    for root in roots {
        if let Ok(rel) = path.strip_prefix(root) {
            if let Some(first) = rel.components().next() {
                return Some(first.as_os_str().to_string_lossy().to_string());
            }
        }
    }
    None
}
