//! Per-primitive-type parameter validation.
//!
//! Parameters arrive as raw strings regardless of their declared type. The
//! validator dispatches on the schema's `type` keyword: the four primitives
//! are checked natively so failures carry the precise `ERR110xx` codes,
//! while `array` and `object` parameters delegate to the schema engine with
//! loose typing.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;
use talos_core::Status;

use crate::schema::{SchemaValidator, ValidationOptions};

/// The declared type of a parameter, read from its schema node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterType {
    /// `type: integer`
    Integer,
    /// `type: number`
    Number,
    /// `type: string` (also the fallback when no type is declared)
    String,
    /// `type: boolean`
    Boolean,
    /// `type: array`
    Array,
    /// `type: object`
    Object,
}

impl ParameterType {
    /// Reads the declared type from a schema node, defaulting to string.
    #[must_use]
    pub fn from_schema(schema: &Value) -> Self {
        match schema.get("type").and_then(Value::as_str) {
            Some("integer") => Self::Integer,
            Some("number") => Self::Number,
            Some("boolean") => Self::Boolean,
            Some("array") => Self::Array,
            Some("object") => Self::Object,
            _ => Self::String,
        }
    }
}

/// Validates raw parameter values against their declared schema.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParameterValidator {
    schema_validator: SchemaValidator,
}

impl ParameterValidator {
    /// Creates a parameter validator.
    #[must_use]
    pub fn new() -> Self {
        Self {
            schema_validator: SchemaValidator::new(),
        }
    }

    /// Validates one raw value.
    ///
    /// A missing or empty value passes unless the parameter is required
    /// (`ERR11001`). Otherwise the value is parsed per its declared type
    /// (`ERR11010` on failure) and checked against the schema's constraints
    /// (`ERR11011`/`ERR11012` for range violations).
    #[must_use]
    pub fn validate(
        &self,
        value: Option<&str>,
        name: &str,
        required: bool,
        schema: &Value,
    ) -> Option<Status> {
        let value = match value {
            Some(v) if !v.is_empty() => v,
            _ => {
                if required {
                    return Some(Status::new("ERR11001", &[name]));
                }
                return None;
            }
        };

        match ParameterType::from_schema(schema) {
            ParameterType::Integer => self.validate_integer(value, name, schema),
            ParameterType::Number => self.validate_number(value, name, schema),
            ParameterType::String => self.validate_string(value, name, schema),
            ParameterType::Boolean => validate_boolean(value, name),
            ParameterType::Array | ParameterType::Object => self.schema_validator.validate(
                &Value::String(value.to_string()),
                schema,
                ValidationOptions::loose(),
            ),
        }
    }

    fn validate_integer(&self, value: &str, name: &str, schema: &Value) -> Option<Status> {
        // i64 parsing rejects any fractional part, so "123.1" fails here.
        let Ok(parsed) = value.parse::<i64>() else {
            return Some(Status::new("ERR11010", &[name, value, "integer"]));
        };
        check_range(name, value, parsed as f64, schema)
    }

    fn validate_number(&self, value: &str, name: &str, schema: &Value) -> Option<Status> {
        let Ok(parsed) = value.parse::<f64>() else {
            return Some(Status::new("ERR11010", &[name, value, "number"]));
        };
        check_range(name, value, parsed, schema)
    }

    fn validate_string(&self, value: &str, name: &str, schema: &Value) -> Option<Status> {
        let length = value.chars().count();
        if let Some(min) = schema.get("minLength").and_then(Value::as_u64) {
            if (length as u64) < min {
                return Some(Status::new(
                    "ERR11010",
                    &[name, value, &format!("string of at least {min} characters")],
                ));
            }
        }
        if let Some(max) = schema.get("maxLength").and_then(Value::as_u64) {
            if (length as u64) > max {
                return Some(Status::new(
                    "ERR11010",
                    &[name, value, &format!("string of at most {max} characters")],
                ));
            }
        }
        if let Some(pattern) = schema.get("pattern").and_then(Value::as_str) {
            match Regex::new(pattern) {
                Ok(regex) => {
                    if !regex.is_match(value) {
                        return Some(Status::new(
                            "ERR11010",
                            &[name, value, &format!("string matching {pattern}")],
                        ));
                    }
                }
                Err(e) => {
                    tracing::error!(pattern, error = %e, "invalid pattern in specification");
                    return Some(Status::internal_error());
                }
            }
        }
        if let Some(allowed) = schema.get("enum").and_then(Value::as_array) {
            let found = allowed
                .iter()
                .any(|candidate| candidate.as_str() == Some(value));
            if !found {
                return Some(Status::new("ERR11010", &[name, value, "enumerated value"]));
            }
        }
        if let Some(format) = schema.get("format").and_then(Value::as_str) {
            if !format_matches(format, value) {
                return Some(Status::new("ERR11010", &[name, value, format]));
            }
        }
        None
    }
}

fn validate_boolean(value: &str, name: &str) -> Option<Status> {
    if value.eq_ignore_ascii_case("true") || value.eq_ignore_ascii_case("false") {
        None
    } else {
        Some(Status::new("ERR11010", &[name, value, "boolean"]))
    }
}

/// Applies `minimum`/`maximum` with draft-4 boolean or numeric exclusivity.
fn check_range(name: &str, raw: &str, value: f64, schema: &Value) -> Option<Status> {
    let (min, min_exclusive) = bound(schema, "minimum", "exclusiveMinimum");
    if let Some(min) = min {
        let below = if min_exclusive { value <= min } else { value < min };
        if below {
            return Some(Status::new("ERR11011", &[name, raw, &format_number(min)]));
        }
    }
    let (max, max_exclusive) = bound(schema, "maximum", "exclusiveMaximum");
    if let Some(max) = max {
        let above = if max_exclusive { value >= max } else { value > max };
        if above {
            return Some(Status::new("ERR11012", &[name, raw, &format_number(max)]));
        }
    }
    None
}

/// Reads a bound and its exclusivity. Draft 4 models exclusivity as a
/// boolean beside the bound; later drafts make the exclusive keyword carry
/// the bound itself. Both shapes appear in the wild, accept either.
fn bound(schema: &Value, key: &str, exclusive_key: &str) -> (Option<f64>, bool) {
    match schema.get(exclusive_key) {
        Some(Value::Bool(exclusive)) => (schema.get(key).and_then(Value::as_f64), *exclusive),
        Some(Value::Number(n)) => (n.as_f64(), true),
        _ => (schema.get(key).and_then(Value::as_f64), false),
    }
}

fn format_number(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

fn format_matches(format: &str, value: &str) -> bool {
    static DATE: OnceLock<Regex> = OnceLock::new();
    static DATE_TIME: OnceLock<Regex> = OnceLock::new();
    static UUID: OnceLock<Regex> = OnceLock::new();
    match format {
        "date" => DATE
            .get_or_init(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("static regex"))
            .is_match(value),
        "date-time" => DATE_TIME
            .get_or_init(|| {
                Regex::new(r"^\d{4}-\d{2}-\d{2}[Tt]\d{2}:\d{2}:\d{2}(\.\d+)?([Zz]|[+-]\d{2}:\d{2})$")
                    .expect("static regex")
            })
            .is_match(value),
        "uuid" => UUID
            .get_or_init(|| {
                Regex::new(r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$")
                    .expect("static regex")
            })
            .is_match(value),
        // Unknown formats are annotations, not constraints.
        _ => true,
    }
}
