//! Thin facade over the Draft-4 JSON Schema engine.
//!
//! The facade owns two concerns the raw engine does not: the `type_loose`
//! toggle, which coerces string tokens such as `"1"` into the type the
//! schema expects before validation (used for URL-embedded parameters), and
//! collapsing the engine's error stream into at most one [`Status`] formed
//! from the first failure.

use jsonschema::{Draft, JSONSchema};
use serde_json::Value;
use talos_core::Status;

/// Toggles applied to a single validation call.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidationOptions {
    /// When true, string tokens are coerced to the schema's declared type
    /// before type checks. Used for path/query/header parameters, which
    /// always arrive as strings. JSON bodies and responses validate strictly.
    pub type_loose: bool,
}

impl ValidationOptions {
    /// Options for URL-embedded values: loose typing.
    #[must_use]
    pub fn loose() -> Self {
        Self { type_loose: true }
    }

    /// Options for structured bodies: strict typing.
    #[must_use]
    pub fn strict() -> Self {
        Self { type_loose: false }
    }
}

/// Validates values against JSON Schema sub-trees of the specification.
#[derive(Debug, Clone, Copy, Default)]
pub struct SchemaValidator;

impl SchemaValidator {
    /// Creates a schema validator.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Validates `value` against `schema`, producing at most one status
    /// formed from the first validation failure.
    ///
    /// A schema that itself fails to compile is a specification defect and
    /// surfaces as the generic internal status.
    #[must_use]
    pub fn validate(
        &self,
        value: &Value,
        schema: &Value,
        options: ValidationOptions,
    ) -> Option<Status> {
        let compiled = match JSONSchema::options()
            .with_draft(Draft::Draft4)
            .compile(schema)
        {
            Ok(compiled) => compiled,
            Err(e) => {
                tracing::error!(error = %e, "schema in specification does not compile");
                return Some(Status::internal_error());
            }
        };

        let effective = if options.type_loose {
            coerce(value, schema)
        } else {
            value.clone()
        };

        let result = match compiled.validate(&effective) {
            Ok(()) => None,
            Err(mut errors) => errors.next().map(|error| {
                let path = error.instance_path.to_string();
                let path = if path.is_empty() { "$".to_string() } else { path };
                Status::new("ERR11004", &[&path, &error.to_string()])
            }),
        };
        result
    }
}

/// Coerces string tokens towards the schema's declared type.
///
/// Only well-formed tokens convert; anything else is passed through
/// unchanged so the engine reports the type mismatch.
fn coerce(value: &Value, schema: &Value) -> Value {
    let declared = schema.get("type").and_then(Value::as_str);
    match (value, declared) {
        (Value::String(s), Some("integer")) => s
            .trim()
            .parse::<i64>()
            .map(Value::from)
            .unwrap_or_else(|_| value.clone()),
        (Value::String(s), Some("number")) => s
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .unwrap_or_else(|| value.clone()),
        (Value::String(s), Some("boolean")) => match s.trim().to_ascii_lowercase().as_str() {
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            _ => value.clone(),
        },
        (_, Some("array")) => {
            let item_schema = schema.get("items").unwrap_or(&Value::Null);
            let items = match value {
                Value::Array(items) => items.iter().map(|i| coerce(i, item_schema)).collect(),
                single => vec![coerce(single, item_schema)],
            };
            Value::Array(items)
        }
        (Value::Object(map), Some("object")) => {
            let properties = schema.get("properties");
            let coerced = map
                .iter()
                .map(|(key, val)| {
                    let prop_schema = properties
                        .and_then(|p| p.get(key))
                        .unwrap_or(&Value::Null);
                    (key.clone(), coerce(val, prop_schema))
                })
                .collect();
            Value::Object(coerced)
        }
        _ => value.clone(),
    }
}
