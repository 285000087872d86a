//! The stable wire error taxonomy.
//!
//! Every failure path in the pipeline produces a [`Status`]: a small value
//! carrying the HTTP status code, a stable `ERRxxxxx` identifier, a short
//! machine-oriented message and a human-readable description. The set of
//! codes is closed; an unknown code degrades to the generic internal error
//! so a typo can never leak an unmapped response.

use http::StatusCode;
use serde::{Deserialize, Serialize};

/// A wire-level status object.
///
/// Serialises to the JSON envelope written as the body of every error
/// response:
///
/// ```json
/// {"statusCode": 401, "code": "ERR10001", "message": "AUTH_TOKEN_EXPIRED",
///  "description": "Jwt token in authorization header expired"}
/// ```
///
/// # Example
///
/// ```
/// use talos_core::Status;
///
/// let status = Status::new("ERR10002", &[]);
/// assert_eq!(status.status_code, 401);
/// assert_eq!(status.code, "ERR10002");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Status {
    /// The HTTP status code that accompanies this error.
    pub status_code: u16,
    /// The stable error identifier, e.g. `ERR10001`.
    pub code: String,
    /// Short machine-oriented message.
    pub message: String,
    /// Human-readable description with arguments interpolated.
    pub description: String,
}

/// One row of the status table: HTTP status, message, description template.
///
/// Description templates use `{}` placeholders filled positionally from the
/// arguments passed to [`Status::new`].
type StatusEntry = (u16, &'static str, &'static str);

fn lookup(code: &str) -> Option<StatusEntry> {
    let entry: StatusEntry = match code {
        "ERR10000" => (
            401,
            "INVALID_AUTH_TOKEN",
            "Incorrect signature or malformed token in authorization header",
        ),
        "ERR10001" => (401, "AUTH_TOKEN_EXPIRED", "Jwt token in authorization header expired"),
        "ERR10002" => (
            401,
            "MISSING_AUTH_TOKEN",
            "No Authorization header or the token is not bearer type",
        ),
        "ERR10003" => (
            401,
            "INVALID_SCOPE_TOKEN",
            "Incorrect signature or malformed token in scope token header",
        ),
        "ERR10004" => (401, "SCOPE_TOKEN_EXPIRED", "Scope token in scope token header expired"),
        "ERR10005" => (
            401,
            "AUTH_TOKEN_SCOPE_MISMATCH",
            "Scopes {} in authorization token do not match the scopes {} required by the endpoint",
        ),
        "ERR10006" => (
            401,
            "SCOPE_TOKEN_SCOPE_MISMATCH",
            "Scopes {} in scope token do not match the scopes {} required by the endpoint",
        ),
        "ERR10007" => (
            404,
            "INVALID_REQUEST_PATH",
            "Request path {} does not match any path defined in the specification",
        ),
        "ERR10008" => (
            405,
            "METHOD_NOT_ALLOWED",
            "Method {} is not defined for path {} in the specification",
        ),
        "ERR10010" => (
            500,
            "INTERNAL_SERVER_ERROR",
            "Unexpected error occurred while processing the request",
        ),
        "ERR11000" => (
            400,
            "VALIDATOR_REQUEST_PARAMETER_QUERY_MISSING",
            "Query parameter {} is required on path {} but not found in request",
        ),
        "ERR11001" => (
            400,
            "VALIDATOR_REQUEST_PARAMETER_MISSING",
            "Parameter {} is required but is missing",
        ),
        "ERR11004" => (400, "VALIDATOR_SCHEMA", "Schema validation failed at {}: {}"),
        "ERR11010" => (
            400,
            "VALIDATOR_REQUEST_PARAMETER_INVALID_FORMAT",
            "Parameter {} with value {} is not a valid {}",
        ),
        "ERR11011" => (
            400,
            "VALIDATOR_REQUEST_PARAMETER_NUMBER_BELOW_MIN",
            "Parameter {} with value {} is below the minimum {}",
        ),
        "ERR11012" => (
            400,
            "VALIDATOR_REQUEST_PARAMETER_NUMBER_ABOVE_MAX",
            "Parameter {} with value {} is above the maximum {}",
        ),
        "ERR11013" => (
            400,
            "VALIDATOR_REQUEST_BODY_UNEXPECTED",
            "A request body was provided but method {} on path {} does not declare one",
        ),
        "ERR11014" => (
            400,
            "VALIDATOR_REQUEST_BODY_MISSING",
            "Method {} on path {} requires a request body but none was provided",
        ),
        "ERR11017" => (
            400,
            "VALIDATOR_REQUEST_PARAMETER_HEADER_MISSING",
            "Header parameter {} is required on path {} but not found in request",
        ),
        "ERR11018" => (
            400,
            "VALIDATOR_RESPONSE_CONTENT_UNEXPECTED",
            "Response content for method {} on path {} does not match the specification",
        ),
        _ => return None,
    };
    Some(entry)
}

/// Fills `{}` placeholders in a template, left to right.
///
/// Surplus arguments are ignored; surplus placeholders stay literal so a
/// mismatched call site is visible in the output rather than panicking.
fn interpolate(template: &str, args: &[&str]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    let mut args = args.iter();
    while let Some(idx) = rest.find("{}") {
        out.push_str(&rest[..idx]);
        match args.next() {
            Some(arg) => out.push_str(arg),
            None => out.push_str("{}"),
        }
        rest = &rest[idx + 2..];
    }
    out.push_str(rest);
    out
}

impl Status {
    /// Creates a status from a code in the table, interpolating `args` into
    /// the description template.
    ///
    /// An unknown code falls back to the generic internal error (`ERR10010`,
    /// HTTP 500) so a miskeyed call site cannot produce an unmapped response.
    #[must_use]
    pub fn new(code: &str, args: &[&str]) -> Self {
        match lookup(code) {
            Some((status_code, message, template)) => Self {
                status_code,
                code: code.to_string(),
                message: message.to_string(),
                description: interpolate(template, args),
            },
            None => {
                tracing::error!(code, "unknown status code requested, degrading to ERR10010");
                Self::internal_error()
            }
        }
    }

    /// The generic internal error status (`ERR10010`, HTTP 500).
    #[must_use]
    pub fn internal_error() -> Self {
        let (status_code, message, template) =
            lookup("ERR10010").expect("ERR10010 is always in the table");
        Self {
            status_code,
            code: "ERR10010".to_string(),
            message: message.to_string(),
            description: template.to_string(),
        }
    }

    /// The HTTP status code as an [`http::StatusCode`].
    ///
    /// Table entries are always valid codes; a corrupt value degrades to 500.
    #[must_use]
    pub fn http_status(&self) -> StatusCode {
        StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}: {}", self.code, self.message, self.description)
    }
}
