//! `install.lock.json`: records what was actually installed, so a later
//! discovery pass can tell a plugin directory apart from one a user dropped
//! in by hand and distinguish a verified install from one that predates
//! signature enforcement being turned on.
//!
//! Grounded on the `src/clawhub` package-registry client, which keeps a
//! similar installed-package ledger alongside the packages themselves.

use std::collections::HashMap;
use std::io::Write;
use std::path::Path;

use probeforge_api::CoreError;
use serde::{Deserialize, Serialize};

pub const LOCK_FILENAME: &str = "install.lock.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockEntry {
    pub id: String,
    pub version: String,
    pub source: String,
    pub dist_hash: String,
    pub installed_at_unix: u64,
    pub signature_verified: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LockFile {
    pub entries: HashMap<String, LockEntry>,
}

impl LockFile {
    pub fn load(path: &Path) -> Result<Self, CoreError> {
        if !path.is_file() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)?;
        serde_json::from_str(&raw)
            .map_err(|e| CoreError::manifest(path, format!("invalid lock file: {e}")))
    }

    /// Write via a temp file in the same directory and rename into place, so
    /// a crash mid-write never leaves a truncated lock file behind.
    pub fn save(&self, path: &Path) -> Result<(), CoreError> {
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        let body = serde_json::to_vec_pretty(self)
            .map_err(|e| CoreError::manifest(path, format!("failed to serialize lock file: {e}")))?;
        tmp.write_all(&body)?;
        tmp.persist(path)
            .map_err(|e| CoreError::manifest(path, format!("failed to persist lock file: {e}")))?;
        Ok(())
    }

    pub fn upsert(&mut self, entry: LockEntry) {
        self.entries.insert(entry.id.clone(), entry);
    }

    pub fn remove(&mut self, id: &str) -> Option<LockEntry> {
        self.entries.remove(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_lock_file_loads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let lock = LockFile::load(&dir.path().join(LOCK_FILENAME)).unwrap();
        assert!(lock.entries.is_empty());
    }

    #[test]
    fn round_trips_through_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(LOCK_FILENAME);
        let mut lock = LockFile::default();
        lock.upsert(LockEntry {
            id: "net-probe".into(),
            version: "0.1.0".into(),
            source: "https://example.invalid/net-probe.zip".into(),
            dist_hash: "abc123".into(),
            installed_at_unix: 1_700_000_000,
            signature_verified: true,
        });
        lock.save(&path).unwrap();

        let reloaded = LockFile::load(&path).unwrap();
        assert_eq!(reloaded.entries.len(), 1);
        assert!(reloaded.entries["net-probe"].signature_verified);
    }
}
