//! The shared engine.
//!
//! One [`Engine`] value holds everything the chain shares across exchanges:
//! the spec index, the configuration snapshots and the JWT verifier. It is
//! built once at startup and injected into each stage, so two engines with
//! different specs can run side by side in one process.

use std::sync::Arc;

use thiserror::Error;

use talos_core::{SecurityConfig, ValidatorConfig};
use talos_security::{JwtVerifier, KeyError};
use talos_spec::SpecIndex;

/// Errors raised while assembling an engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The JWT verifier could not be constructed from configuration.
    #[error("failed to build jwt verifier: {0}")]
    Verifier(#[from] KeyError),
}

/// Build-once, read-many shared state for the enforcement chain.
#[derive(Debug)]
pub struct Engine {
    spec: Arc<SpecIndex>,
    validator_config: ValidatorConfig,
    security_config: SecurityConfig,
    verifier: Arc<JwtVerifier>,
    body_parser_enabled: bool,
}

impl Engine {
    /// Creates an engine builder over a spec index.
    #[must_use]
    pub fn builder(spec: SpecIndex) -> EngineBuilder {
        EngineBuilder {
            spec,
            validator_config: ValidatorConfig::default(),
            security_config: SecurityConfig::default(),
            verifier: None,
            body_parser_enabled: true,
        }
    }

    /// The spec index.
    #[must_use]
    pub fn spec(&self) -> &Arc<SpecIndex> {
        &self.spec
    }

    /// The validator configuration snapshot.
    #[must_use]
    pub fn validator_config(&self) -> &ValidatorConfig {
        &self.validator_config
    }

    /// The security configuration snapshot.
    #[must_use]
    pub fn security_config(&self) -> &SecurityConfig {
        &self.security_config
    }

    /// The JWT verifier.
    #[must_use]
    pub fn verifier(&self) -> &Arc<JwtVerifier> {
        &self.verifier
    }

    /// Whether the body-parsing collaborator is in the chain.
    #[must_use]
    pub fn body_parser_enabled(&self) -> bool {
        self.body_parser_enabled
    }
}

/// Builder for an [`Engine`].
pub struct EngineBuilder {
    spec: SpecIndex,
    validator_config: ValidatorConfig,
    security_config: SecurityConfig,
    verifier: Option<JwtVerifier>,
    body_parser_enabled: bool,
}

impl EngineBuilder {
    /// Sets the validator configuration.
    #[must_use]
    pub fn validator_config(mut self, config: ValidatorConfig) -> Self {
        self.validator_config = config;
        self
    }

    /// Sets the security configuration.
    #[must_use]
    pub fn security_config(mut self, config: SecurityConfig) -> Self {
        self.security_config = config;
        self
    }

    /// Overrides the verifier instead of deriving it from the security
    /// configuration. Used by tests and hosts with out-of-band key material.
    #[must_use]
    pub fn verifier(mut self, verifier: JwtVerifier) -> Self {
        self.verifier = Some(verifier);
        self
    }

    /// Records whether the body-parsing collaborator is wired into the
    /// chain. Defaults to true.
    #[must_use]
    pub fn body_parser_enabled(mut self, enabled: bool) -> Self {
        self.body_parser_enabled = enabled;
        self
    }

    /// Assembles the engine.
    ///
    /// When `bootstrapFromKeyService` is set, call
    /// [`JwtVerifier::bootstrap`] on the built engine's verifier before
    /// serving traffic.
    ///
    /// # Errors
    ///
    /// [`EngineError`] when the verifier cannot be derived from the
    /// configuration.
    pub fn build(self) -> Result<Engine, EngineError> {
        let verifier = match self.verifier {
            Some(verifier) => verifier,
            None => JwtVerifier::from_config(self.security_config.jwt.clone())?,
        };
        Ok(Engine {
            spec: Arc::new(self.spec),
            validator_config: self.validator_config,
            security_config: self.security_config,
            verifier: Arc::new(verifier),
            body_parser_enabled: self.body_parser_enabled,
        })
    }
}
