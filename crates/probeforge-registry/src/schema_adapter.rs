//! Schema Adapter: translates between the structural JSON Schema a plugin
//! manifest declares and the typed shape the host's tool-call pipeline wants
//! to validate arguments against.
//!
//! Grounded on `src/tools/schema.rs`-style schema walkers, which walk a typed
//! Rust description of a tool's parameters and emit a JSON Schema object for
//! export. The direction this module adds — structural schema back down to a
//! typed shape the validator can check cheaply without re-parsing JSON Schema
//! on every call — has no JSON-Schema-validator crate anywhere in the corpus,
//! so the conversion is hand-rolled here rather than reached for from a
//! registry crate that was never pulled in.

use std::collections::BTreeMap;

use serde_json::{Map, Value};
use tracing::warn;

/// A typed description of one parameter's shape, reduced from a JSON Schema
/// object. Lossy by design: only the constraints the validator actually
/// checks survive the round trip.
#[derive(Debug, Clone, PartialEq)]
pub enum TypedSchema {
    String {
        min_length: Option<usize>,
        max_length: Option<usize>,
        enum_values: Option<Vec<String>>,
    },
    Number {
        integer: bool,
        minimum: Option<f64>,
        maximum: Option<f64>,
    },
    Boolean,
    Array {
        items: Box<TypedSchema>,
        min_items: Option<usize>,
        max_items: Option<usize>,
    },
    Object {
        properties: BTreeMap<String, TypedField>,
    },
    /// Schema shapes this adapter does not narrow further: `{}`, `true`, or
    /// any `type` keyword it does not recognize. Always validates.
    Any,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypedField {
    pub schema: TypedSchema,
    pub required: bool,
    pub description: Option<String>,
}

/// A tool's input schema as declared by its manifest or captured registration
/// — either already structural JSON Schema, or produced by `schemars` from a
/// typed Rust description, in which case it is already structural by the time
/// it reaches this adapter.
pub struct AdaptedTool {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

/// Normalize a captured tool registration's schema into the canonical
/// structural form the host forwards to clients: strips `$schema` and
/// `definitions`/`$defs` (the host resolves refs itself), and defaults a
/// missing `type` to `"object"` since every top-level tool input is a single
/// JSON object of named arguments.
pub fn adapt_tool_to_host(name: &str, description: &str, raw_schema: &Value) -> AdaptedTool {
    let mut schema = match raw_schema {
        Value::Object(map) => map.clone(),
        _ => Map::new(),
    };
    schema.remove("$schema");
    schema.remove("$defs");
    schema.remove("definitions");
    schema
        .entry("type".to_string())
        .or_insert_with(|| Value::String("object".into()));
    if !schema.contains_key("properties") {
        schema.insert("properties".to_string(), Value::Object(Map::new()));
    }

    AdaptedTool {
        name: name.to_string(),
        description: description.to_string(),
        input_schema: Value::Object(schema),
    }
}

/// Convert a structural JSON Schema object into the typed shape
/// `create_parameter_validator` checks arguments against. Any node this
/// function can't interpret degrades to `TypedSchema::Any` rather than
/// failing the whole conversion — a manifest author's unusual schema should
/// not block the plugin from loading.
pub fn derive_raw_shape(schema: &Value) -> BTreeMap<String, TypedField> {
    let Value::Object(obj) = schema else {
        return BTreeMap::new();
    };
    let required: Vec<String> = obj
        .get("required")
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    let Some(Value::Object(properties)) = obj.get("properties") else {
        return BTreeMap::new();
    };

    properties
        .iter()
        .map(|(name, prop_schema)| {
            let description = prop_schema
                .get("description")
                .and_then(Value::as_str)
                .map(str::to_string);
            let field = TypedField {
                schema: node_to_typed(prop_schema),
                required: required.contains(name),
                description,
            };
            (name.clone(), field)
        })
        .collect()
}

fn node_to_typed(node: &Value) -> TypedSchema {
    let Value::Object(obj) = node else {
        return TypedSchema::Any;
    };

    let ty = obj.get("type").and_then(Value::as_str);
    match ty {
        Some("string") => TypedSchema::String {
            min_length: obj.get("minLength").and_then(Value::as_u64).map(|v| v as usize),
            max_length: obj.get("maxLength").and_then(Value::as_u64).map(|v| v as usize),
            enum_values: obj.get("enum").and_then(Value::as_array).map(|arr| {
                arr.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            }),
        },
        Some("integer") => TypedSchema::Number {
            integer: true,
            minimum: obj.get("minimum").and_then(Value::as_f64),
            maximum: obj.get("maximum").and_then(Value::as_f64),
        },
        Some("number") => TypedSchema::Number {
            integer: false,
            minimum: obj.get("minimum").and_then(Value::as_f64),
            maximum: obj.get("maximum").and_then(Value::as_f64),
        },
        Some("boolean") => TypedSchema::Boolean,
        Some("array") => {
            let items = obj
                .get("items")
                .map(node_to_typed)
                .unwrap_or(TypedSchema::Any);
            TypedSchema::Array {
                items: Box::new(items),
                min_items: obj.get("minItems").and_then(Value::as_u64).map(|v| v as usize),
                max_items: obj.get("maxItems").and_then(Value::as_u64).map(|v| v as usize),
            }
        }
        Some("object") => TypedSchema::Object {
            properties: derive_raw_shape(node),
        },
        Some(other) => {
            warn!(schema_type = other, "unrecognized schema type, treating as permissive");
            TypedSchema::Any
        }
        None => TypedSchema::Any,
    }
}

#[derive(Debug, Clone)]
pub enum ValidationOutcome {
    Valid,
    Invalid(Vec<String>),
}

/// Build a validator closure from a structural schema once, so repeated
/// tool calls don't re-walk JSON Schema on every invocation.
pub fn create_parameter_validator(schema: &Value) -> impl Fn(&Value) -> ValidationOutcome + Send + Sync + 'static {
    let shape = derive_raw_shape(schema);
    move |args: &Value| {
        let mut errors = Vec::new();
        let Value::Object(given) = args else {
            return ValidationOutcome::Invalid(vec!["arguments must be a JSON object".into()]);
        };
        for (name, field) in &shape {
            match given.get(name) {
                Some(value) => check_value(name, &field.schema, value, &mut errors),
                None if field.required => errors.push(format!("missing required field '{name}'")),
                None => {}
            }
        }
        if errors.is_empty() {
            ValidationOutcome::Valid
        } else {
            ValidationOutcome::Invalid(errors)
        }
    }
}

fn check_value(path: &str, schema: &TypedSchema, value: &Value, errors: &mut Vec<String>) {
    match schema {
        TypedSchema::String { min_length, max_length, enum_values } => {
            let Some(s) = value.as_str() else {
                errors.push(format!("'{path}' must be a string"));
                return;
            };
            if let Some(min) = min_length {
                if s.len() < *min {
                    errors.push(format!("'{path}' is shorter than minLength {min}"));
                }
            }
            if let Some(max) = max_length {
                if s.len() > *max {
                    errors.push(format!("'{path}' exceeds maxLength {max}"));
                }
            }
            if let Some(values) = enum_values {
                if !values.iter().any(|v| v == s) {
                    errors.push(format!("'{path}' is not one of the allowed values"));
                }
            }
        }
        TypedSchema::Number { integer, minimum, maximum } => {
            let Some(n) = value.as_f64() else {
                errors.push(format!("'{path}' must be a number"));
                return;
            };
            if *integer && n.fract() != 0.0 {
                errors.push(format!("'{path}' must be an integer"));
            }
            if let Some(min) = minimum {
                if n < *min {
                    errors.push(format!("'{path}' is below minimum {min}"));
                }
            }
            if let Some(max) = maximum {
                if n > *max {
                    errors.push(format!("'{path}' exceeds maximum {max}"));
                }
            }
        }
        TypedSchema::Boolean => {
            if !value.is_boolean() {
                errors.push(format!("'{path}' must be a boolean"));
            }
        }
        TypedSchema::Array { items, min_items, max_items } => {
            let Some(arr) = value.as_array() else {
                errors.push(format!("'{path}' must be an array"));
                return;
            };
            if let Some(min) = min_items {
                if arr.len() < *min {
                    errors.push(format!("'{path}' has fewer than minItems {min}"));
                }
            }
            if let Some(max) = max_items {
                if arr.len() > *max {
                    errors.push(format!("'{path}' has more than maxItems {max}"));
                }
            }
            for (idx, item) in arr.iter().enumerate() {
                check_value(&format!("{path}[{idx}]"), items, item, errors);
            }
        }
        TypedSchema::Object { properties } => {
            let Some(obj) = value.as_object() else {
                errors.push(format!("'{path}' must be an object"));
                return;
            };
            for (name, field) in properties {
                let nested_path = format!("{path}.{name}");
                match obj.get(name) {
                    Some(v) => check_value(&nested_path, &field.schema, v, errors),
                    None if field.required => {
                        errors.push(format!("missing required field '{nested_path}'"))
                    }
                    None => {}
                }
            }
        }
        TypedSchema::Any => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn derives_required_and_optional_fields() {
        let schema = json!({
            "type": "object",
            "properties": {
                "host": {"type": "string", "minLength": 1},
                "port": {"type": "integer", "minimum": 1, "maximum": 65535},
            },
            "required": ["host"],
        });
        let shape = derive_raw_shape(&schema);
        assert!(shape.get("host").unwrap().required);
        assert!(!shape.get("port").unwrap().required);
    }

    #[test]
    fn validator_rejects_missing_required_field() {
        let schema = json!({
            "type": "object",
            "properties": {"host": {"type": "string"}},
            "required": ["host"],
        });
        let validate = create_parameter_validator(&schema);
        match validate(&json!({})) {
            ValidationOutcome::Invalid(errors) => assert_eq!(errors.len(), 1),
            ValidationOutcome::Valid => panic!("expected validation failure"),
        }
    }

    #[test]
    fn validator_accepts_well_formed_input() {
        let schema = json!({
            "type": "object",
            "properties": {
                "host": {"type": "string"},
                "port": {"type": "integer", "minimum": 1},
            },
            "required": ["host"],
        });
        let validate = create_parameter_validator(&schema);
        let outcome = validate(&json!({"host": "localhost", "port": 9090}));
        assert!(matches!(outcome, ValidationOutcome::Valid));
    }

    #[test]
    fn unknown_schema_type_degrades_to_any() {
        let node = json!({"type": "whatever"});
        assert_eq!(node_to_typed(&node), TypedSchema::Any);
    }

    #[test]
    fn adapt_tool_to_host_strips_meta_keywords_and_defaults_type() {
        let raw = json!({"$schema": "http://json-schema.org/draft-07/schema#", "properties": {}});
        let adapted = adapt_tool_to_host("probe", "probes a host", &raw);
        assert_eq!(adapted.input_schema["type"], json!("object"));
        assert!(adapted.input_schema.get("$schema").is_none());
    }
}
