//! Runtime plugin record and its state machine.
//!
//! `UNLOADED -> LOADING -> LOADED -> ACTIVE`, with `ERROR` reachable from
//! `LOADING` and `DISABLED` settable at any point by policy/config. Modeled
//! as an explicit enum with a `transition` guard rather than free-standing
//! bools, mirroring `src/plugins/mod.rs`-style plugin status tracking.

use std::path::PathBuf;
use std::time::SystemTime;

use probeforge_api::CoreError;
use probeforge_registry::CapabilitySnapshot;

use crate::manifest::PluginManifest;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PluginState {
    Unloaded,
    Loading,
    Loaded,
    Active,
    Error,
    Disabled,
}

impl PluginState {
    fn can_transition_to(self, next: PluginState) -> bool {
        use PluginState::*;
        matches!(
            (self, next),
            (Unloaded, Loading)
                | (Loading, Loaded)
                | (Loaded, Active)
                | (Loading, Error)
                | (Loaded, Error)
                | (Active, Error)
                | (Active, Unloaded)
                | (Loaded, Unloaded)
                | (Error, Unloaded)
                | (_, Disabled)
                | (Disabled, Unloaded)
        )
    }
}

#[derive(Debug, Clone)]
pub struct PluginRecord {
    pub id: String,
    pub dir: PathBuf,
    pub manifest: PluginManifest,
    pub state: PluginState,
    pub capabilities: CapabilitySnapshot,
    pub last_error: Option<String>,
    /// Set when the failure that moved this record to `Error` was a
    /// `CoreError::Signature`. Quarantine is scoped to this case only --
    /// an integrity, policy, validation, or instantiation failure leaves the
    /// plugin directory in place so its author can inspect and fix it.
    pub signature_failure: bool,
    pub loaded_at: Option<SystemTime>,
}

impl PluginRecord {
    pub fn new(id: impl Into<String>, dir: PathBuf, manifest: PluginManifest) -> Self {
        Self {
            id: id.into(),
            dir,
            manifest,
            state: PluginState::Unloaded,
            capabilities: CapabilitySnapshot::default(),
            last_error: None,
            signature_failure: false,
            loaded_at: None,
        }
    }

    pub fn transition(&mut self, next: PluginState) -> Result<(), CoreError> {
        if !self.state.can_transition_to(next) {
            return Err(CoreError::State(format!(
                "plugin '{}' cannot move from {:?} to {:?}",
                self.id, self.state, next
            )));
        }
        self.state = next;
        if next == PluginState::Loaded {
            self.loaded_at = Some(SystemTime::now());
        }
        if next != PluginState::Error {
            self.last_error = None;
            self.signature_failure = false;
        }
        Ok(())
    }

    pub fn fail(&mut self, message: impl Into<String>) {
        self.state = PluginState::Error;
        self.last_error = Some(message.into());
    }

    /// Fail with a `CoreError`, recording whether it was specifically a
    /// signature failure so the manager can scope quarantine correctly.
    pub fn fail_with(&mut self, err: &CoreError) {
        self.signature_failure = matches!(err, CoreError::Signature { .. });
        self.fail(err.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::{CapabilitiesDeclaration, DistInfo};

    fn manifest() -> PluginManifest {
        PluginManifest {
            manifest_version: 2,
            name: "p".into(),
            version: "0.1.0".into(),
            description: None,
            entry: "dist/plugin.wasm".into(),
            dist: DistInfo::with_hash("x"),
            dependencies: Default::default(),
            dependencies_policy: Default::default(),
            external_dependencies: Vec::new(),
            permissions: Default::default(),
            capabilities: CapabilitiesDeclaration {
                tools: vec!["t".into()],
                resources: vec![],
                prompts: vec![],
            },
            signatures: vec![],
        }
    }

    #[test]
    fn happy_path_transitions() {
        let mut record = PluginRecord::new("p", PathBuf::from("/tmp/p"), manifest());
        record.transition(PluginState::Loading).unwrap();
        record.transition(PluginState::Loaded).unwrap();
        record.transition(PluginState::Active).unwrap();
        assert_eq!(record.state, PluginState::Active);
        assert!(record.loaded_at.is_some());
    }

    #[test]
    fn cannot_skip_loading() {
        let mut record = PluginRecord::new("p", PathBuf::from("/tmp/p"), manifest());
        assert!(record.transition(PluginState::Active).is_err());
    }

    #[test]
    fn disabled_reachable_from_anywhere_and_recoverable() {
        let mut record = PluginRecord::new("p", PathBuf::from("/tmp/p"), manifest());
        record.transition(PluginState::Disabled).unwrap();
        record.transition(PluginState::Unloaded).unwrap();
        assert_eq!(record.state, PluginState::Unloaded);
    }
}
