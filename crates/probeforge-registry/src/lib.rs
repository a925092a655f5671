//! Capability registry, schema adapter, and tool validation manager.
//!
//! These three pieces sit between whatever discovers and loads a capability
//! (a built-in module, or a plugin's captured registrations) and the
//! session host that actually exposes it to clients.

pub mod capability;
pub mod errors;
pub mod registry;
pub mod schema_adapter;
pub mod validation;

pub use capability::{
    CapabilityDiff, CapabilitySnapshot, DiffSet, PromptRegistration, ResourceRegistration,
    ToolRegistration,
};
pub use errors::RegistryError;
pub use registry::{CapabilityRegistry, ModuleRecord, RegistryStats};
pub use schema_adapter::{
    adapt_tool_to_host, create_parameter_validator, derive_raw_shape, AdaptedTool, TypedField,
    TypedSchema, ValidationOutcome,
};
pub use validation::{
    BatchValidation, ToolCandidate, ToolValidationManager, ValidationFinding, ValidationInfo,
    ValidationMode,
};
