//! probeforge: an extensible tool-server platform built around a dynamic
//! capability registry and a WASM plugin lifecycle.
//!
//! This crate wires together `probeforge-api` (host/tool traits),
//! `probeforge-config` (configuration and policy flags),
//! `probeforge-registry` (capability registry, schema adapter, tool
//! validation), `probeforge-plugins` (discovery, manifests, loader,
//! manager, hot reload), and `probeforge-management` (the read-only HTTP
//! surface) into one runnable application.

pub mod host;
pub mod observability;

pub use probeforge_api as api;
pub use probeforge_config as config;
pub use probeforge_management as management;
pub use probeforge_plugins as plugins;
pub use probeforge_registry as registry;

pub use host::InMemorySessionHost;
