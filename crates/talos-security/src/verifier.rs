//! JWT signature and claims verification.

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, decode_header, Validation};
use serde_json::{Map, Value};
use thiserror::Error;

use talos_core::JwtConfig;

use crate::claims::Claims;
use crate::keys::KeyStore;

/// Verification failure kinds.
///
/// The middleware maps these onto the wire taxonomy: `Malformed` and
/// `SignatureInvalid` become the invalid-token status of whichever token was
/// being verified, `Expired` the corresponding expired status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum JwtError {
    /// The token cannot be decoded at all.
    #[error("token is malformed")]
    Malformed,
    /// The signature, key or a verified claim (`iss`, `aud`, `nbf`) failed.
    #[error("token signature or claims are invalid")]
    SignatureInvalid,
    /// The token is past its `exp` (with configured leeway applied).
    #[error("token has expired")]
    Expired,
}

/// Extracts the token from an `Authorization` header value.
///
/// Only the `Bearer <token>` shape yields a token; any other shape yields
/// `None`. The scheme comparison is case-insensitive.
#[must_use]
pub fn token_from_authorization(header: Option<&str>) -> Option<&str> {
    let (scheme, token) = header?.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

/// Verifies bearer tokens against the configured key material.
#[derive(Debug)]
pub struct JwtVerifier {
    keys: KeyStore,
    config: JwtConfig,
}

impl JwtVerifier {
    /// Builds a verifier, deriving the key store from the configuration.
    ///
    /// # Errors
    ///
    /// Propagates key store construction failures.
    pub fn from_config(config: JwtConfig) -> Result<Self, crate::keys::KeyError> {
        let keys = KeyStore::from_config(&config)?;
        Ok(Self { keys, config })
    }

    /// Builds a verifier over an explicitly constructed key store.
    #[must_use]
    pub fn with_key_store(config: JwtConfig, keys: KeyStore) -> Self {
        Self { keys, config }
    }

    /// The underlying key store.
    #[must_use]
    pub fn key_store(&self) -> &KeyStore {
        &self.keys
    }

    /// Eagerly loads all key sources. See [`KeyStore::bootstrap`].
    ///
    /// # Errors
    ///
    /// Propagates the first key loading failure.
    pub async fn bootstrap(&self) -> Result<(), crate::keys::KeyError> {
        self.keys.bootstrap().await
    }

    /// Verifies a token and returns its claims.
    ///
    /// The header is decoded to select a key by `kid` (the only configured
    /// key when `kid` is absent), the JOSE signature is verified, then
    /// `exp`, `nbf`, `iss` and `aud` are checked against configuration with
    /// the configured clock skew. `ignore_expiry` disables only the `exp`
    /// check.
    ///
    /// # Errors
    ///
    /// One of the three [`JwtError`] kinds. A key that cannot be obtained
    /// (unknown `kid`, JWKS fetch failure or timeout) is reported as
    /// [`JwtError::SignatureInvalid`].
    pub async fn verify(&self, token: &str, ignore_expiry: bool) -> Result<Claims, JwtError> {
        let header = decode_header(token).map_err(|e| {
            tracing::debug!(error = %e, "token header does not decode");
            JwtError::Malformed
        })?;

        let key = self
            .keys
            .decoding_key(header.kid.as_deref())
            .await
            .map_err(|e| {
                tracing::error!(error = %e, kid = ?header.kid, "no verification key for token");
                JwtError::SignatureInvalid
            })?;

        let mut validation = Validation::new(header.alg);
        validation.leeway = self.config.clock_skew_in_seconds;
        validation.validate_exp = !ignore_expiry;
        validation.validate_nbf = true;

        let mut required: Vec<&str> = Vec::new();
        if validation.validate_exp {
            required.push("exp");
        }
        if let Some(issuer) = &self.config.issuer {
            validation.set_issuer(&[issuer]);
            required.push("iss");
        }
        if let Some(audience) = &self.config.audience {
            validation.set_audience(&[audience]);
            required.push("aud");
        }
        validation.set_required_spec_claims(&required);

        match decode::<Map<String, Value>>(token, &key, &validation) {
            Ok(data) => Ok(Claims::new(data.claims)),
            Err(e) => Err(classify(e.kind())),
        }
    }
}

fn classify(kind: &ErrorKind) -> JwtError {
    match kind {
        ErrorKind::ExpiredSignature => JwtError::Expired,
        ErrorKind::InvalidToken
        | ErrorKind::Base64(_)
        | ErrorKind::Json(_)
        | ErrorKind::Utf8(_) => JwtError::Malformed,
        _ => JwtError::SignatureInvalid,
    }
}
