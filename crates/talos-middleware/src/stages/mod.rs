//! The enforcement stages.
//!
//! Execution order is fixed:
//!
//! 1. [`spec_match`] — resolve the request to a spec operation, seed the
//!    audit context (`ERR10007`/`ERR10008` on miss).
//! 2. [`jwt_verify`] — verify the bearer token, record claims, check scopes
//!    against the operation's security requirement.
//! 3. [`validation`] — request validation before the handler, response
//!    validation after it.

pub mod jwt_verify;
pub mod spec_match;
pub mod validation;

pub use jwt_verify::JwtVerifyMiddleware;
pub use spec_match::SpecMatchMiddleware;
pub use validation::{ResponseValidationMiddleware, ValidatorMiddleware};
