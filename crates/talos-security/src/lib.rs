//! # Talos Security
//!
//! Bearer JWT verification for the contract enforcement pipeline:
//!
//! - [`Claims`] — decoded token claims with lenient `scope` handling (the
//!   claim may be a space-separated string or a list of strings).
//! - [`KeyStore`] — verification keys keyed by `kid`, sourced from local PEM
//!   files or JWKS endpoints fetched lazily and memoised; rotation is driven
//!   by `kid` misses.
//! - [`JwtVerifier`] — signature and claims verification with the three
//!   stable failure kinds `Malformed`, `SignatureInvalid` and `Expired`.
//! - [`matched_scopes`] — the documented any-of scope subset test.

#![doc(html_root_url = "https://docs.rs/talos-security/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod claims;
pub mod keys;
pub mod scope;
pub mod verifier;

pub use claims::{Claims, MalformedScopeClaim};
pub use keys::{KeyError, KeySource, KeyStore};
pub use scope::matched_scopes;
pub use verifier::{token_from_authorization, JwtError, JwtVerifier};
