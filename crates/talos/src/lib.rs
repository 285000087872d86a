//! # Talos
//!
//! **API contract enforcement pipeline for HTTP services described by an
//! OpenAPI specification.**
//!
//! Talos sits in front of a business handler and enforces the contract on
//! every exchange:
//!
//! - resolve the incoming request to a specification operation,
//! - verify the bearer JWT and check its scopes against the operation's
//!   declared security requirements,
//! - validate the request's path, query and header parameters and JSON body
//!   against the operation's schemas,
//! - optionally validate the outgoing payload against the response schema
//!   for the produced status code.
//!
//! Every failure maps to a stable wire status
//! (`{"statusCode", "code", "message", "description"}`); stages either
//! forward or finalise, never both.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use talos::prelude::*;
//!
//! let spec = SpecIndex::from_file("openapi.yaml")?;
//! let engine = Arc::new(
//!     Engine::builder(spec)
//!         .validator_config(ValidatorConfig::from_file("validator.toml")?)
//!         .security_config(SecurityConfig::load("config")?)
//!         .build()?,
//! );
//! let chain = Chain::standard(&engine);
//!
//! // per exchange:
//! let mut ctx = ExchangeContext::new();
//! let response = chain.handle(&mut ctx, request, business_handler).await;
//! ```

#![doc(html_root_url = "https://docs.rs/talos/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

// Re-export the component crates.
pub use talos_core as core;
pub use talos_middleware as middleware;
pub use talos_security as security;
pub use talos_spec as spec;
pub use talos_validator as validator;

/// Convenient imports for hosts wiring the chain.
pub mod prelude {
    pub use talos_core::{SecurityConfig, Status, ValidatorConfig};
    pub use talos_middleware::{
        AuditContext, Chain, Engine, ExchangeContext, Middleware, Next, Request, RequestBody,
        Response, ResponseExt,
    };
    pub use talos_security::{Claims, JwtVerifier, KeyStore};
    pub use talos_spec::{NormalisedPath, SpecIndex, SpecOperation};
    pub use talos_validator::{RequestValidator, ResponseValidator, SchemaValidator};
}
