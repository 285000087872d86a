//! # Talos Validator
//!
//! Validation of request and response shapes against the indexed
//! specification:
//!
//! - [`SchemaValidator`] — a thin facade over a Draft-4 JSON Schema engine
//!   with a `type_loose` toggle that coerces URL-embedded string tokens
//!   before type checks.
//! - [`ParameterValidator`] — per-primitive-type validation of path, query
//!   and header parameters with the stable `ERR110xx` taxonomy.
//! - [`RequestValidator`] — orchestrates path → query → header → body
//!   validation for one operation, short-circuiting on the first failure.
//! - [`ResponseValidator`] — checks outgoing payloads against the
//!   operation + status-code + media-type schema.
//!
//! All validators are stateless and cheap to share; every entry point
//! returns `Option<Status>` where `None` means the input passed.

#![doc(html_root_url = "https://docs.rs/talos-validator/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod parameter;
pub mod request;
pub mod response;
pub mod schema;

pub use parameter::{ParameterType, ParameterValidator};
pub use request::{RequestValidationOptions, RequestValidator};
pub use response::ResponseValidator;
pub use schema::{SchemaValidator, ValidationOptions};
