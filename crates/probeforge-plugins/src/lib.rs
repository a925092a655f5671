//! WASM plugin system: discovery, manifest validation, integrity and
//! signature verification, policy gating, load/unload/reload, install, and
//! hot-reload, built on top of the capability registry.

pub mod capture;
pub mod discovery;
pub mod dist_hash;
pub mod hot_reload;
pub mod install;
pub mod loader;
pub mod lock_file;
pub mod manager;
pub mod manifest;
pub mod record;
pub mod signature;
pub mod wasm;

pub use discovery::{discover, DiscoveredPlugin};
pub use dist_hash::{compute_dist_hash, verify_coverage_all, verify_dist_hash};
pub use hot_reload::HotReloadManager;
pub use install::{DetachedSignature, InstallOptions, InstallSource, StagedPlugin};
pub use loader::PluginLoader;
pub use lock_file::{LockEntry, LockFile};
pub use manager::PluginManager;
pub use manifest::{
    CapabilitiesDeclaration, DependenciesPolicy, DistInfo, PluginManifest, Permissions,
    SignatureAlgorithm, SignatureEntry,
};
pub use record::{PluginRecord, PluginState};
pub use signature::{verify_manifest_signatures, TrustedKeyStore};
