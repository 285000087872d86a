//! Response validation against the operation + status + media-type schema.
//!
//! The schema lookup tries the status-code key first and falls back to the
//! `default` response. A response declared without a schema passes; an
//! undeclared response, or a body/schema presence mismatch, is
//! `ERR11018`.

use serde_json::Value;
use talos_core::Status;
use talos_spec::SpecOperation;

use crate::schema::{SchemaValidator, ValidationOptions};

const JSON_MEDIA_TYPE: &str = "application/json";
const GOOD_STATUS_CODE: &str = "200";
const DEFAULT_STATUS_CODE: &str = "default";

/// Validates structured response bodies against the specification.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseValidator {
    schema_validator: SchemaValidator,
}

impl ResponseValidator {
    /// Creates a response validator.
    #[must_use]
    pub fn new() -> Self {
        Self {
            schema_validator: SchemaValidator::new(),
        }
    }

    /// Convenience wrapper assuming status `"200"` and `application/json`.
    ///
    /// Prefer [`ResponseValidator::validate_response_content`] with the real
    /// status code; this default can mask mismatches for 201/204 responses.
    #[must_use]
    pub fn validate_response(
        &self,
        body: Option<&Value>,
        operation: &SpecOperation,
    ) -> Option<Status> {
        self.validate_response_content(body, operation, GOOD_STATUS_CODE, JSON_MEDIA_TYPE)
    }

    /// Validates a response body against the schema located by
    /// (operation, status code, media type).
    #[must_use]
    pub fn validate_response_content(
        &self,
        body: Option<&Value>,
        operation: &SpecOperation,
        status_code: &str,
        media_type: &str,
    ) -> Option<Status> {
        let mut schema = operation.response_schema(status_code, media_type);

        if schema.is_none() {
            // The status-code response exists but carries no schema: pass.
            if operation.has_response(status_code) {
                return None;
            }
            if !operation.has_response(DEFAULT_STATUS_CODE) {
                return Some(self.unexpected(operation));
            }
            schema = operation.response_schema(DEFAULT_STATUS_CODE, media_type);
        }

        match (body, schema) {
            (Some(body), Some(schema)) => {
                self.schema_validator
                    .validate(body, schema, ValidationOptions::strict())
            }
            (None, None) => None,
            _ => Some(self.unexpected(operation)),
        }
    }

    /// Parses a textual payload into the structured tree the validator
    /// expects: after trimming, `{` starts an object, `[` an array, anything
    /// else is not JSON content and yields `None`.
    #[must_use]
    pub fn parse_content(text: &str) -> Option<Value> {
        let trimmed = text.trim();
        if trimmed.starts_with('{') || trimmed.starts_with('[') {
            match serde_json::from_str(trimmed) {
                Ok(value) => Some(value),
                Err(e) => {
                    tracing::error!(error = %e, "cannot deserialise response content");
                    None
                }
            }
        } else {
            None
        }
    }

    fn unexpected(&self, operation: &SpecOperation) -> Status {
        Status::new(
            "ERR11018",
            &[operation.method(), operation.path_template().original()],
        )
    }
}
