//! Tool Validation Manager: gatekeeps a batch of tool definitions before
//! `CapabilityRegistry::register_tool` ever sees them.
//!
//! Grounded on the name/description checks in `src/tools/traits.rs`-style
//! tool traits (a `Tool::spec()` is expected to carry a non-empty
//! description) and on the duplicate-skip behavior of
//! `src/plugins/registry.rs`'s `registeredTools` set, generalized here into
//! an explicit strict/permissive mode so a plugin batch can be rejected
//! outright under `STRICT_CAPABILITIES` instead of silently losing entries.

use std::collections::HashSet;

use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

static NAME_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z][a-zA-Z0-9_.-]{0,63}$").expect("static regex"));

const MIN_DESCRIPTION_LEN: usize = 8;

#[derive(Debug, Clone, PartialEq)]
pub enum ValidationMode {
    /// Any finding fails the whole batch.
    Strict,
    /// Offending entries are dropped and reported; the rest proceeds.
    Permissive,
}

#[derive(Debug, Clone)]
pub struct ToolCandidate {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

#[derive(Debug, Clone)]
pub struct ValidationFinding {
    pub tool: String,
    pub reason: String,
}

/// Non-blocking quality note -- never prevents a tool from being accepted,
/// in either validation mode.
#[derive(Debug, Clone)]
pub struct ValidationInfo {
    pub tool: String,
    pub note: String,
}

#[derive(Debug, Clone, Default)]
pub struct BatchValidation {
    pub accepted: Vec<String>,
    pub findings: Vec<ValidationFinding>,
    pub info: Vec<ValidationInfo>,
}

impl BatchValidation {
    pub fn ok(&self) -> bool {
        self.findings.is_empty()
    }
}

pub struct ToolValidationManager {
    mode: ValidationMode,
}

impl ToolValidationManager {
    pub fn new(mode: ValidationMode) -> Self {
        Self { mode }
    }

    /// Blocking checks: a bad name, or an `inputSchema` that isn't a typed
    /// schema/JSON-Schema object/raw shape at all.
    fn check_one(&self, candidate: &ToolCandidate) -> Option<String> {
        if !NAME_PATTERN.is_match(&candidate.name) {
            return Some(format!(
                "name '{}' does not match ^[a-zA-Z][a-zA-Z0-9_.-]{{0,63}}$",
                candidate.name
            ));
        }
        if !is_schema_shape_valid(&candidate.input_schema) {
            return Some(format!(
                "inputSchema for '{}' is not a typed schema, JSON-Schema object, or raw shape",
                candidate.name
            ));
        }
        None
    }

    /// Non-blocking quality notes: short/missing description, undeclared
    /// `required` list, or a property with no description. These are always
    /// informational, independent of mode.
    fn info_notes(&self, candidate: &ToolCandidate) -> Vec<String> {
        let mut notes = Vec::new();
        if candidate.description.trim().len() < MIN_DESCRIPTION_LEN {
            notes.push(format!(
                "description for '{}' is shorter than {MIN_DESCRIPTION_LEN} characters",
                candidate.name
            ));
        }
        if let Some(obj) = candidate.input_schema.as_object() {
            let properties = obj.get("properties").and_then(Value::as_object);
            if let Some(properties) = properties {
                if !properties.is_empty() && !obj.contains_key("required") {
                    notes.push(format!(
                        "inputSchema for '{}' declares properties but no required list",
                        candidate.name
                    ));
                }
                for (prop_name, prop_schema) in properties {
                    let has_description = prop_schema
                        .get("description")
                        .and_then(Value::as_str)
                        .is_some_and(|d| !d.trim().is_empty());
                    if !has_description {
                        notes.push(format!(
                            "property '{prop_name}' on '{}' has no description",
                            candidate.name
                        ));
                    }
                }
            }
        }
        notes
    }

    /// Validate a batch of candidate tool registrations, applying duplicate
    /// detection within the batch itself (a plugin declaring the same tool
    /// name twice is always a defect, independent of mode).
    pub fn validate_batch(&self, candidates: &[ToolCandidate]) -> BatchValidation {
        let mut result = BatchValidation::default();
        let mut seen = HashSet::new();
        let mut batch_duplicate = false;

        for candidate in candidates {
            if !seen.insert(candidate.name.clone()) {
                result.findings.push(ValidationFinding {
                    tool: candidate.name.clone(),
                    reason: "duplicate tool name within the same batch".into(),
                });
                batch_duplicate = true;
                continue;
            }
            result
                .info
                .extend(self.info_notes(candidate).into_iter().map(|note| ValidationInfo {
                    tool: candidate.name.clone(),
                    note,
                }));
            if let Some(reason) = self.check_one(candidate) {
                result.findings.push(ValidationFinding {
                    tool: candidate.name.clone(),
                    reason,
                });
                continue;
            }
            result.accepted.push(candidate.name.clone());
        }

        if self.mode == ValidationMode::Strict && (!result.findings.is_empty() || batch_duplicate) {
            result.accepted.clear();
        }
        result
    }
}

/// An `inputSchema` is acceptable when it's an object (a JSON-Schema
/// document, or a raw shape keyed by property name) or simply absent
/// (`Value::Null`, e.g. a tool with no parameters). Any other top-level
/// JSON value (string, number, array, bool) can't be a schema at all.
fn is_schema_shape_valid(schema: &Value) -> bool {
    matches!(schema, Value::Object(_) | Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn candidate(name: &str, description: &str) -> ToolCandidate {
        ToolCandidate {
            name: name.to_string(),
            description: description.to_string(),
            input_schema: json!({"type": "object", "properties": {}}),
        }
    }

    #[test]
    fn permissive_mode_drops_only_offenders() {
        let manager = ToolValidationManager::new(ValidationMode::Permissive);
        let batch = vec![
            candidate("probe_host", "probes a remote host for open ports"),
            candidate("1bad", "bad name, starts with a digit"),
        ];
        let result = manager.validate_batch(&batch);
        assert_eq!(result.accepted, vec!["probe_host".to_string()]);
        assert_eq!(result.findings.len(), 1);
    }

    #[test]
    fn strict_mode_fails_whole_batch_on_any_finding() {
        let manager = ToolValidationManager::new(ValidationMode::Strict);
        let batch = vec![
            candidate("probe_host", "probes a remote host for open ports"),
            candidate("1bad", "bad name, starts with a digit"),
        ];
        let result = manager.validate_batch(&batch);
        assert!(result.accepted.is_empty());
        assert!(!result.ok());
    }

    #[test]
    fn duplicate_names_always_flagged() {
        let manager = ToolValidationManager::new(ValidationMode::Permissive);
        let batch = vec![
            candidate("probe_host", "probes a remote host for open ports"),
            candidate("probe_host", "a second definition of the same name"),
        ];
        let result = manager.validate_batch(&batch);
        assert_eq!(result.accepted.len(), 1);
        assert_eq!(result.findings.len(), 1);
    }

    #[test]
    fn short_description_is_info_only_in_every_mode() {
        for mode in [ValidationMode::Permissive, ValidationMode::Strict] {
            let manager = ToolValidationManager::new(mode);
            let result = manager.validate_batch(&[candidate("probe_host", "short")]);
            assert_eq!(result.accepted, vec!["probe_host".to_string()]);
            assert!(result.findings.is_empty());
            assert_eq!(result.info.len(), 1);
        }
    }

    #[test]
    fn non_object_input_schema_is_rejected() {
        let manager = ToolValidationManager::new(ValidationMode::Permissive);
        let mut candidate = candidate("probe_host", "probes a remote host for open ports");
        candidate.input_schema = json!("not a schema");
        let result = manager.validate_batch(&[candidate]);
        assert!(result.accepted.is_empty());
        assert_eq!(result.findings.len(), 1);
    }

    #[test]
    fn properties_without_required_list_is_info_only() {
        let manager = ToolValidationManager::new(ValidationMode::Permissive);
        let mut candidate = candidate("probe_host", "probes a remote host for open ports");
        candidate.input_schema = json!({
            "type": "object",
            "properties": {"host": {"type": "string", "description": "target host"}},
        });
        let result = manager.validate_batch(&[candidate]);
        assert_eq!(result.accepted, vec!["probe_host".to_string()]);
        assert!(result.info.iter().any(|i| i.note.contains("no required list")));
    }

    #[test]
    fn property_missing_description_is_info_only() {
        let manager = ToolValidationManager::new(ValidationMode::Permissive);
        let mut candidate = candidate("probe_host", "probes a remote host for open ports");
        candidate.input_schema = json!({
            "type": "object",
            "properties": {"host": {"type": "string"}},
            "required": ["host"],
        });
        let result = manager.validate_batch(&[candidate]);
        assert_eq!(result.accepted, vec!["probe_host".to_string()]);
        assert!(result.info.iter().any(|i| i.note.contains("has no description")));
    }
}
