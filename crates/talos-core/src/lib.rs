//! # Talos Core
//!
//! Core types shared by every crate in the Talos contract enforcement
//! pipeline:
//!
//! - [`Status`] — the stable wire error taxonomy. Every failure surfaced to a
//!   client is a `Status` value serialised as
//!   `{"statusCode": ..., "code": "ERR...", "message": ..., "description": ...}`.
//! - [`ValidatorConfig`] / [`SecurityConfig`] — configuration snapshots for
//!   the validation and security modules, loadable from TOML or JSON files.
//!
//! The pipeline never leaks Rust error types over the wire; internal errors
//! are converted to the generic [`Status`] with code `ERR10010` at the
//! middleware boundary.

#![doc(html_root_url = "https://docs.rs/talos-core/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod config;
pub mod status;

pub use config::{ConfigError, JwtConfig, SecurityConfig, ValidatorConfig};
pub use status::Status;
