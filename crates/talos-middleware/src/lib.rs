//! # Talos Middleware
//!
//! The ordered middleware chain that enforces the API contract on every
//! exchange:
//!
//! ```text
//! Request → SpecMatch → JwtVerify (+ scope check) → RequestValidation → Handler
//!                                                                          ↓
//! Response ←──────────────────── ResponseValidation ←─────────────────────┘
//! ```
//!
//! Each stage either forwards to the next one or finalises the exchange with
//! a [`talos_core::Status`] response — never both. Derived facts (the
//! matched operation, token claims) flow between stages through the
//! per-exchange [`AuditContext`].
//!
//! All shared state lives in the [`Engine`]: the spec index, the
//! configuration snapshots and the JWT verifier, built once at startup and
//! injected into every stage.

#![doc(html_root_url = "https://docs.rs/talos-middleware/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod chain;
pub mod context;
pub mod engine;
pub mod middleware;
pub mod stages;
pub mod types;

pub use chain::{Chain, ChainBuilder};
pub use context::{AuditContext, ExchangeContext};
pub use engine::{Engine, EngineBuilder, EngineError};
pub use middleware::{BoxFuture, Middleware, Next};
pub use types::{Request, RequestBody, Response, ResponseExt};
