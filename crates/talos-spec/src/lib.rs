//! # Talos Spec
//!
//! The indexed, reference-resolved in-memory model of an OpenAPI document.
//!
//! This crate owns everything the pipeline needs to know about the
//! specification at request time:
//!
//! - [`NormalisedPath`] — request paths canonicalised against the base path,
//!   with parameter-segment detection.
//! - [`PathTemplate`] / [`RouterTable`] — compiled spec paths and
//!   longest-specific-match routing.
//! - [`SpecIndex`] — the parsed document with `$ref`s resolved, the base
//!   path, the declared OAuth2 scheme names and the interned
//!   [`SpecOperation`] handles.
//!
//! The index is built once at startup and never mutated afterwards, so it is
//! shared across worker threads without locking.

#![doc(html_root_url = "https://docs.rs/talos-spec/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod index;
pub mod path;
pub mod resolve;
pub mod router;

pub use index::{ResolveError, SpecError, SpecIndex, SpecOperation};
pub use path::NormalisedPath;
pub use router::{PathTemplate, RouterTable};
