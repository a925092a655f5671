//! Error taxonomy shared across the registry, schema adapter, and plugin
//! lifecycle. Kinds, not type hierarchies: every fallible operation in this
//! workspace returns one of these variants (or wraps one via `anyhow`).

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("manifest error in {path}: {message}")]
    Manifest { path: PathBuf, message: String },

    #[error("integrity error for {plugin_id}: {message}")]
    Integrity { plugin_id: String, message: String },

    #[error("policy error for {plugin_id}: {message}")]
    Policy { plugin_id: String, message: String },

    #[error("signature error for {plugin_id}: {message}")]
    Signature { plugin_id: String, message: String },

    #[error("validation error in module {module}: {message}")]
    Validation { module: String, message: String },

    #[error("dependency cycle detected: {members:?}")]
    Cycle { members: Vec<String> },

    #[error("state error: {0}")]
    State(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl CoreError {
    pub fn manifest(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Manifest {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn integrity(plugin_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Integrity {
            plugin_id: plugin_id.into(),
            message: message.into(),
        }
    }

    pub fn policy(plugin_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Policy {
            plugin_id: plugin_id.into(),
            message: message.into(),
        }
    }

    pub fn signature(plugin_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Signature {
            plugin_id: plugin_id.into(),
            message: message.into(),
        }
    }

    pub fn validation(module: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            module: module.into(),
            message: message.into(),
        }
    }
}
