//! Request validation for one resolved operation.
//!
//! Validation runs in a fixed order, path → query → header → body, and
//! short-circuits on the first non-passing status. The body is never read
//! here; the body-parsing collaborator materialises it into the exchange's
//! attachment slot before this validator runs.

use std::collections::HashMap;

use http::Request;
use percent_encoding::percent_decode_str;
use serde_json::Value;
use talos_core::Status;
use talos_spec::{NormalisedPath, SpecOperation};

use crate::parameter::ParameterValidator;
use crate::schema::{SchemaValidator, ValidationOptions};

/// The JSON media type bodies are validated under.
const JSON_MEDIA_TYPE: &str = "application/json";

/// Toggles affecting body validation, derived from configuration and the
/// body-parser collaborator's own state.
#[derive(Debug, Clone, Copy)]
pub struct RequestValidationOptions {
    /// Whether the body-parsing middleware is in the chain. When it is not,
    /// a required-but-absent body is logged instead of rejected.
    pub body_parser_enabled: bool,
    /// Skip body validation outright when no body attachment exists.
    pub skip_body_validation: bool,
}

impl Default for RequestValidationOptions {
    fn default() -> Self {
        Self {
            body_parser_enabled: true,
            skip_body_validation: false,
        }
    }
}

/// Orchestrates path, query, header and body validation for one operation.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestValidator {
    schema_validator: SchemaValidator,
    parameter_validator: ParameterValidator,
}

impl RequestValidator {
    /// Creates a request validator.
    #[must_use]
    pub fn new() -> Self {
        Self {
            schema_validator: SchemaValidator::new(),
            parameter_validator: ParameterValidator::new(),
        }
    }

    /// Validates the request against the operation.
    ///
    /// `body` is the attachment produced by the body-parsing collaborator,
    /// absent when no body arrived or the parser is not in the chain.
    #[must_use]
    pub fn validate_request<B>(
        &self,
        request_path: &NormalisedPath,
        request: &Request<B>,
        operation: &SpecOperation,
        body: Option<&Value>,
        options: RequestValidationOptions,
    ) -> Option<Status> {
        if let Some(status) = self.validate_path_parameters(request_path, operation) {
            return Some(status);
        }
        if let Some(status) = self.validate_query_parameters(request, operation) {
            return Some(status);
        }
        if let Some(status) = self.validate_headers(request, operation) {
            return Some(status);
        }
        if body.is_none() && options.skip_body_validation {
            return None;
        }
        self.validate_request_body(body, operation, options)
    }

    /// Validates every parameter segment of the template against the
    /// corresponding request segment.
    fn validate_path_parameters(
        &self,
        request_path: &NormalisedPath,
        operation: &SpecOperation,
    ) -> Option<Status> {
        let template = operation.path_template();
        for i in 0..template.len() {
            if !template.is_param(i) {
                continue;
            }
            let Some(param_name) = template.param_name(i) else {
                continue;
            };
            let raw = request_path.part(i).unwrap_or("");
            let value = match percent_decode_str(raw).decode_utf8() {
                Ok(decoded) => decoded.into_owned(),
                Err(_) => {
                    tracing::info!(segment = raw, "path parameter cannot be decoded, using raw value");
                    raw.to_string()
                }
            };
            if let Some(param) = operation.find_parameter("path", param_name) {
                if let Some(status) = self.schema_validator.validate(
                    &Value::String(value),
                    parameter_schema(param),
                    ValidationOptions::loose(),
                ) {
                    return Some(status);
                }
            }
        }
        None
    }

    fn validate_query_parameters<B>(
        &self,
        request: &Request<B>,
        operation: &SpecOperation,
    ) -> Option<Status> {
        let mut values: HashMap<String, Vec<String>> = HashMap::new();
        let query = request.uri().query().unwrap_or("");
        for (name, value) in form_urlencoded::parse(query.as_bytes()) {
            values.entry(name.into_owned()).or_default().push(value.into_owned());
        }

        for param in operation.parameters().filter(|p| is_in(p, "query")) {
            let Some(name) = parameter_name(param) else {
                continue;
            };
            let required = parameter_required(param);
            let schema = parameter_schema(param);
            match values.get(name).map(Vec::as_slice) {
                None | Some([]) => {
                    if required {
                        return Some(Status::new(
                            "ERR11000",
                            &[name, operation.path_template().original()],
                        ));
                    }
                }
                Some([single]) => {
                    if let Some(status) =
                        self.parameter_validator
                            .validate(Some(single.as_str()), name, required, schema)
                    {
                        return Some(status);
                    }
                }
                // Two or more values: validate the whole collection so array
                // constraints such as minItems apply.
                Some(many) => {
                    let collection =
                        Value::Array(many.iter().map(|v| Value::String(v.clone())).collect());
                    if let Some(status) = self.schema_validator.validate(
                        &collection,
                        schema,
                        ValidationOptions::loose(),
                    ) {
                        return Some(status);
                    }
                }
            }
        }
        None
    }

    /// Path-level header parameters are validated before operation-level
    /// ones.
    fn validate_headers<B>(
        &self,
        request: &Request<B>,
        operation: &SpecOperation,
    ) -> Option<Status> {
        for param in operation.path_parameters().filter(|p| is_in(p, "header")) {
            if let Some(status) = self.validate_header_parameter(request, operation, param) {
                return Some(status);
            }
        }
        for param in operation.parameters().filter(|p| is_in(p, "header")) {
            if let Some(status) = self.validate_header_parameter(request, operation, param) {
                return Some(status);
            }
        }
        None
    }

    fn validate_header_parameter<B>(
        &self,
        request: &Request<B>,
        operation: &SpecOperation,
        param: &Value,
    ) -> Option<Status> {
        let name = parameter_name(param)?;
        let required = parameter_required(param);
        let schema = parameter_schema(param);

        let values: Vec<&str> = request
            .headers()
            .get_all(name)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .collect();

        if values.is_empty() {
            if required {
                return Some(Status::new(
                    "ERR11017",
                    &[name, operation.path_template().original()],
                ));
            }
            return None;
        }
        for value in values {
            if let Some(status) =
                self.parameter_validator.validate(Some(value), name, required, schema)
            {
                return Some(status);
            }
        }
        None
    }

    fn validate_request_body(
        &self,
        body: Option<&Value>,
        operation: &SpecOperation,
        options: RequestValidationOptions,
    ) -> Option<Status> {
        let declares_body = operation.declares_request_body();

        if body.is_some() && !declares_body {
            return Some(Status::new(
                "ERR11013",
                &[operation.method(), operation.path_template().original()],
            ));
        }
        if !declares_body {
            return None;
        }

        let Some(body) = body else {
            if operation.request_body_required() {
                if options.body_parser_enabled {
                    return Some(Status::new(
                        "ERR11014",
                        &[operation.method(), operation.path_template().original()],
                    ));
                }
                tracing::warn!(
                    endpoint = %operation.endpoint(),
                    "no body attachment on exchange; body parser is likely missing from the chain"
                );
            }
            return None;
        };

        let Some(schema) = operation.request_body_schema(JSON_MEDIA_TYPE) else {
            return None;
        };
        self.schema_validator
            .validate(body, schema, ValidationOptions::strict())
    }
}

fn is_in(param: &Value, location: &str) -> bool {
    param
        .get("in")
        .and_then(Value::as_str)
        .is_some_and(|l| l.eq_ignore_ascii_case(location))
}

fn parameter_name(param: &Value) -> Option<&str> {
    param.get("name").and_then(Value::as_str)
}

fn parameter_required(param: &Value) -> bool {
    param.get("required").and_then(Value::as_bool).unwrap_or(false)
}

/// OpenAPI 3 parameters nest the schema; Swagger 2 parameters carry the
/// type keywords directly on the parameter object.
fn parameter_schema(param: &Value) -> &Value {
    param.get("schema").unwrap_or(param)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use talos_spec::NormalisedPath;

    fn operation(template: &str, method: &str, path_item: Value) -> SpecOperation {
        let op = path_item
            .get(method)
            .cloned()
            .expect("method present in path item");
        SpecOperation::new(NormalisedPath::new(template, ""), path_item, method, op)
    }

    fn pets_list_operation() -> SpecOperation {
        operation(
            "/pets",
            "get",
            json!({
                "get": {
                    "parameters": [
                        {"name": "limit", "in": "query", "required": true,
                         "schema": {"type": "integer", "minimum": 1, "maximum": 100}},
                        {"name": "tags", "in": "query", "required": false,
                         "schema": {"type": "array", "items": {"type": "string"}, "maxItems": 2}}
                    ],
                    "responses": {"200": {"description": "ok"}}
                }
            }),
        )
    }

    fn pets_create_operation() -> SpecOperation {
        operation(
            "/pets",
            "post",
            json!({
                "post": {
                    "requestBody": {
                        "required": true,
                        "content": {"application/json": {"schema": {
                            "type": "object",
                            "required": ["id", "name"],
                            "properties": {"id": {"type": "integer"}, "name": {"type": "string"}}
                        }}}
                    },
                    "responses": {"201": {"description": "created"}}
                }
            }),
        )
    }

    fn get_request(uri: &str) -> Request<()> {
        Request::builder().method("GET").uri(uri).body(()).expect("request")
    }

    #[test]
    fn missing_required_query_parameter_fails() {
        let validator = RequestValidator::new();
        let operation = pets_list_operation();
        let path = NormalisedPath::new("/pets", "");
        let status = validator
            .validate_request(&path, &get_request("/pets"), &operation, None, Default::default())
            .expect("missing query param");
        assert_eq!(status.code, "ERR11000");
    }

    #[test]
    fn single_query_value_is_validated_by_type() {
        let validator = RequestValidator::new();
        let operation = pets_list_operation();
        let path = NormalisedPath::new("/pets", "");

        assert!(validator
            .validate_request(&path, &get_request("/pets?limit=10"), &operation, None, Default::default())
            .is_none());

        let status = validator
            .validate_request(&path, &get_request("/pets?limit=abc"), &operation, None, Default::default())
            .expect("bad integer");
        assert_eq!(status.code, "ERR11010");

        let status = validator
            .validate_request(&path, &get_request("/pets?limit=0"), &operation, None, Default::default())
            .expect("below min");
        assert_eq!(status.code, "ERR11011");
    }

    #[test]
    fn repeated_query_values_validate_as_a_collection() {
        let validator = RequestValidator::new();
        let operation = pets_list_operation();
        let path = NormalisedPath::new("/pets", "");

        assert!(validator
            .validate_request(
                &path,
                &get_request("/pets?limit=1&tags=a&tags=b"),
                &operation,
                None,
                Default::default()
            )
            .is_none());

        let status = validator
            .validate_request(
                &path,
                &get_request("/pets?limit=1&tags=a&tags=b&tags=c"),
                &operation,
                None,
                Default::default(),
            )
            .expect("maxItems exceeded");
        assert_eq!(status.code, "ERR11004");
    }

    #[test]
    fn path_parameter_is_url_decoded_and_validated() {
        let validator = RequestValidator::new();
        let operation = operation(
            "/pets/{petId}",
            "get",
            json!({
                "get": {
                    "parameters": [
                        {"name": "petId", "in": "path", "required": true,
                         "schema": {"type": "integer"}}
                    ],
                    "responses": {"200": {"description": "ok"}}
                }
            }),
        );

        let path = NormalisedPath::new("/pets/42", "");
        assert!(validator
            .validate_request(&path, &get_request("/pets/42"), &operation, None, Default::default())
            .is_none());

        let path = NormalisedPath::new("/pets/%34%32", "");
        assert!(validator
            .validate_request(&path, &get_request("/pets/%34%32"), &operation, None, Default::default())
            .is_none());

        let path = NormalisedPath::new("/pets/abc", "");
        let status = validator
            .validate_request(&path, &get_request("/pets/abc"), &operation, None, Default::default())
            .expect("non-integer path param");
        assert_eq!(status.code, "ERR11004");
    }

    #[test]
    fn required_header_missing_fails_and_path_level_headers_run_first() {
        let validator = RequestValidator::new();
        let operation = operation(
            "/pets",
            "get",
            json!({
                "parameters": [
                    {"name": "X-Traceability-Id", "in": "header", "required": true,
                     "schema": {"type": "string"}}
                ],
                "get": {
                    "parameters": [
                        {"name": "X-Request-Source", "in": "header", "required": true,
                         "schema": {"type": "string"}}
                    ],
                    "responses": {"200": {"description": "ok"}}
                }
            }),
        );
        let path = NormalisedPath::new("/pets", "");

        // Both headers missing: the path-level one is reported.
        let status = validator
            .validate_request(&path, &get_request("/pets"), &operation, None, Default::default())
            .expect("missing header");
        assert_eq!(status.code, "ERR11017");
        assert!(status.description.contains("X-Traceability-Id"));

        let request = Request::builder()
            .method("GET")
            .uri("/pets")
            .header("X-Traceability-Id", "t-1")
            .header("X-Request-Source", "mobile")
            .body(())
            .expect("request");
        assert!(validator
            .validate_request(&path, &request, &operation, None, Default::default())
            .is_none());
    }

    #[test]
    fn body_present_but_undeclared_is_unexpected() {
        let validator = RequestValidator::new();
        let operation = pets_list_operation();
        let path = NormalisedPath::new("/pets", "");
        let body = json!({"anything": true});
        let status = validator
            .validate_request(
                &path,
                &get_request("/pets?limit=1"),
                &operation,
                Some(&body),
                Default::default(),
            )
            .expect("unexpected body");
        assert_eq!(status.code, "ERR11013");
    }

    #[test]
    fn required_body_missing_fails_when_parser_enabled() {
        let validator = RequestValidator::new();
        let operation = pets_create_operation();
        let path = NormalisedPath::new("/pets", "");
        let status = validator
            .validate_request(
                &path,
                &get_request("/pets"),
                &operation,
                None,
                RequestValidationOptions {
                    body_parser_enabled: true,
                    skip_body_validation: false,
                },
            )
            .expect("missing body");
        assert_eq!(status.code, "ERR11014");
    }

    #[test]
    fn required_body_missing_is_only_warned_when_parser_disabled() {
        let validator = RequestValidator::new();
        let operation = pets_create_operation();
        let path = NormalisedPath::new("/pets", "");
        assert!(validator
            .validate_request(
                &path,
                &get_request("/pets"),
                &operation,
                None,
                RequestValidationOptions {
                    body_parser_enabled: false,
                    skip_body_validation: false,
                },
            )
            .is_none());
    }

    #[test]
    fn skip_body_validation_bypasses_missing_body() {
        let validator = RequestValidator::new();
        let operation = pets_create_operation();
        let path = NormalisedPath::new("/pets", "");
        assert!(validator
            .validate_request(
                &path,
                &get_request("/pets"),
                &operation,
                None,
                RequestValidationOptions {
                    body_parser_enabled: true,
                    skip_body_validation: true,
                },
            )
            .is_none());
    }

    #[test]
    fn body_is_validated_strictly_against_the_json_schema() {
        let validator = RequestValidator::new();
        let operation = pets_create_operation();
        let path = NormalisedPath::new("/pets", "");

        let good = json!({"id": 1, "name": "rex"});
        assert!(validator
            .validate_request(&path, &get_request("/pets"), &operation, Some(&good), Default::default())
            .is_none());

        // String "abc" where an integer is required: strict typing rejects.
        let bad = json!({"id": "abc", "name": "rex"});
        let status = validator
            .validate_request(&path, &get_request("/pets"), &operation, Some(&bad), Default::default())
            .expect("schema failure");
        assert_eq!(status.code, "ERR11004");
        assert_eq!(status.status_code, 400);
    }
}
