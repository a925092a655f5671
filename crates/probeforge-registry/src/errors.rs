use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("module registration batch already open for '{0}'")]
    BatchAlreadyOpen(String),

    #[error("registerTool called with no open module batch")]
    NoActiveBatch,

    #[error("module '{0}' is already registered")]
    DuplicateModule(String),

    #[error("unknown plugin '{0}' in capability registry")]
    UnknownPlugin(String),
}

impl From<RegistryError> for probeforge_api::CoreError {
    fn from(err: RegistryError) -> Self {
        probeforge_api::CoreError::State(err.to_string())
    }
}
