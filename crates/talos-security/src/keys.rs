//! Verification key cache.
//!
//! Keys are configured per `kid` as either a local PEM public key path or a
//! JWKS endpoint URL. JWKS endpoints are fetched lazily the first time a
//! `kid` served by them is needed and memoised afterwards; a later `kid`
//! miss triggers a refetch, which is how key rotation is picked up. Readers
//! go through an [`tokio::sync::RwLock`] so they never observe a partially
//! updated map.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::DecodingKey;
use thiserror::Error;
use tokio::sync::RwLock;

use talos_core::JwtConfig;

/// Errors raised while obtaining a verification key.
#[derive(Debug, Error)]
pub enum KeyError {
    /// No key source or cached key matches the requested `kid`.
    #[error("no verification key available for kid {kid:?}")]
    UnknownKid {
        /// The `kid` from the token header, if any.
        kid: Option<String>,
    },

    /// A local key file could not be read.
    #[error("failed to read key file {path}: {source}")]
    Io {
        /// The offending path.
        path: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Key material could not be parsed.
    #[error("failed to parse verification key for kid {kid}: {message}")]
    InvalidKey {
        /// The `kid` the material belongs to.
        kid: String,
        /// Parser diagnostic.
        message: String,
    },

    /// A JWKS endpoint could not be fetched or decoded.
    #[error("jwks fetch from {url} failed: {message}")]
    Fetch {
        /// The endpoint URL.
        url: String,
        /// Transport or decode diagnostic.
        message: String,
    },

    /// The HTTP client could not be constructed.
    #[error("failed to build jwks http client: {0}")]
    Client(String),
}

/// Where the key material for one `kid` comes from.
#[derive(Debug, Clone)]
pub enum KeySource {
    /// A local PEM public key file.
    LocalPem(PathBuf),
    /// A JWKS endpoint. One endpoint may serve several `kid`s.
    Jwks(String),
}

impl KeySource {
    /// Interprets a `jwt.certificate` config value: `http(s)` URLs are JWKS
    /// endpoints, anything else is a local path.
    #[must_use]
    pub fn from_config_value(value: &str) -> Self {
        if value.starts_with("http://") || value.starts_with("https://") {
            Self::Jwks(value.to_string())
        } else {
            Self::LocalPem(PathBuf::from(value))
        }
    }
}

/// The read-mostly cache of decoding keys.
pub struct KeyStore {
    sources: BTreeMap<String, KeySource>,
    keys: RwLock<HashMap<String, Arc<DecodingKey>>>,
    client: reqwest::Client,
}

// Manual impl: key material itself carries no Debug.
impl std::fmt::Debug for KeyStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyStore")
            .field("sources", &self.sources)
            .finish_non_exhaustive()
    }
}

impl KeyStore {
    /// Builds a key store from the `jwt` configuration section.
    ///
    /// # Errors
    ///
    /// [`KeyError::Client`] when the JWKS HTTP client cannot be built.
    pub fn from_config(config: &JwtConfig) -> Result<Self, KeyError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.key_fetch_timeout_secs()))
            .build()
            .map_err(|e| KeyError::Client(e.to_string()))?;
        let sources = config
            .certificate
            .iter()
            .map(|(kid, value)| (kid.clone(), KeySource::from_config_value(value)))
            .collect();
        Ok(Self {
            sources,
            keys: RwLock::new(HashMap::new()),
            client,
        })
    }

    /// Seeds a decoding key directly, bypassing the configured sources.
    ///
    /// Used by tests and by hosts that obtain key material out of band.
    #[must_use]
    pub fn with_key(mut self, kid: &str, key: DecodingKey) -> Self {
        self.keys
            .get_mut()
            .insert(kid.to_string(), Arc::new(key));
        self
    }

    /// Resolves the decoding key for a token header.
    ///
    /// With no `kid` in the header, the single configured key is used; more
    /// than one candidate without a `kid` is unresolvable. A cache miss for
    /// a known JWKS-served `kid` triggers a refetch before giving up.
    ///
    /// # Errors
    ///
    /// [`KeyError`] when no key can be produced for the `kid`.
    pub async fn decoding_key(&self, kid: Option<&str>) -> Result<Arc<DecodingKey>, KeyError> {
        let kid = match kid {
            Some(kid) => kid.to_string(),
            None => self.sole_kid().await.ok_or(KeyError::UnknownKid { kid: None })?,
        };

        if let Some(key) = self.keys.read().await.get(&kid) {
            return Ok(key.clone());
        }

        match self.sources.get(&kid) {
            Some(KeySource::LocalPem(path)) => {
                let key = load_pem(&kid, path)?;
                let key = Arc::new(key);
                self.keys.write().await.insert(kid, key.clone());
                Ok(key)
            }
            Some(KeySource::Jwks(url)) => {
                self.refresh_jwks(url).await?;
                self.keys
                    .read()
                    .await
                    .get(&kid)
                    .cloned()
                    .ok_or(KeyError::UnknownKid { kid: Some(kid) })
            }
            None => {
                // Unknown kid: the signing key may have rotated on one of
                // the JWKS endpoints since the last fetch.
                self.refresh_all_jwks().await;
                self.keys
                    .read()
                    .await
                    .get(&kid)
                    .cloned()
                    .ok_or(KeyError::UnknownKid { kid: Some(kid) })
            }
        }
    }

    /// Eagerly loads every configured key source.
    ///
    /// Called at startup when `bootstrapFromKeyService` is set, so the first
    /// request does not pay the JWKS fetch latency.
    ///
    /// # Errors
    ///
    /// The first [`KeyError`] encountered; sources after it are not loaded.
    pub async fn bootstrap(&self) -> Result<(), KeyError> {
        for (kid, source) in &self.sources {
            match source {
                KeySource::LocalPem(path) => {
                    let key = load_pem(kid, path)?;
                    self.keys.write().await.insert(kid.clone(), Arc::new(key));
                }
                KeySource::Jwks(url) => self.refresh_jwks(url).await?,
            }
        }
        tracing::info!(key_count = self.keys.read().await.len(), "key store bootstrapped");
        Ok(())
    }

    async fn sole_kid(&self) -> Option<String> {
        if self.sources.len() == 1 {
            return self.sources.keys().next().cloned();
        }
        let keys = self.keys.read().await;
        if keys.len() == 1 {
            return keys.keys().next().cloned();
        }
        None
    }

    async fn refresh_jwks(&self, url: &str) -> Result<(), KeyError> {
        let jwks: JwkSet = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| KeyError::Fetch {
                url: url.to_string(),
                message: e.to_string(),
            })?
            .json()
            .await
            .map_err(|e| KeyError::Fetch {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        let mut parsed = HashMap::new();
        for jwk in &jwks.keys {
            let Some(kid) = jwk.common.key_id.clone() else {
                tracing::warn!(url, "jwks key without kid skipped");
                continue;
            };
            match DecodingKey::from_jwk(jwk) {
                Ok(key) => {
                    parsed.insert(kid, Arc::new(key));
                }
                Err(e) => {
                    tracing::warn!(url, kid, error = %e, "unparseable jwk skipped");
                }
            }
        }
        tracing::info!(url, key_count = parsed.len(), "jwks fetched");

        let mut keys = self.keys.write().await;
        keys.extend(parsed);
        Ok(())
    }

    async fn refresh_all_jwks(&self) {
        for source in self.sources.values() {
            if let KeySource::Jwks(url) = source {
                if let Err(e) = self.refresh_jwks(url).await {
                    tracing::warn!(error = %e, "jwks refresh failed");
                }
            }
        }
    }
}

/// Parses a PEM public key, accepting RSA, EC and Ed25519 material.
fn load_pem(kid: &str, path: &std::path::Path) -> Result<DecodingKey, KeyError> {
    let pem = std::fs::read(path).map_err(|source| KeyError::Io {
        path: path.display().to_string(),
        source,
    })?;
    DecodingKey::from_rsa_pem(&pem)
        .or_else(|_| DecodingKey::from_ec_pem(&pem))
        .or_else(|_| DecodingKey::from_ed_pem(&pem))
        .map_err(|e| KeyError::InvalidKey {
            kid: kid.to_string(),
            message: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_value_selects_source_kind() {
        assert!(matches!(
            KeySource::from_config_value("https://issuer.example.com/jwks.json"),
            KeySource::Jwks(_)
        ));
        assert!(matches!(
            KeySource::from_config_value("certs/primary.pem"),
            KeySource::LocalPem(_)
        ));
    }

    #[tokio::test]
    async fn seeded_key_is_served_from_cache() {
        let store = KeyStore::from_config(&JwtConfig::default())
            .expect("store")
            .with_key("100", DecodingKey::from_secret(b"secret"));
        assert!(store.decoding_key(Some("100")).await.is_ok());
    }

    #[tokio::test]
    async fn sole_cached_key_is_used_when_kid_absent() {
        let store = KeyStore::from_config(&JwtConfig::default())
            .expect("store")
            .with_key("100", DecodingKey::from_secret(b"secret"));
        assert!(store.decoding_key(None).await.is_ok());
    }

    #[tokio::test]
    async fn unknown_kid_without_sources_is_an_error() {
        let store = KeyStore::from_config(&JwtConfig::default()).expect("store");
        let err = store.decoding_key(Some("nope")).await.err().expect("unknown kid");
        assert!(matches!(err, KeyError::UnknownKid { .. }));
    }

    #[tokio::test]
    async fn ambiguous_missing_kid_is_an_error() {
        let store = KeyStore::from_config(&JwtConfig::default())
            .expect("store")
            .with_key("100", DecodingKey::from_secret(b"one"))
            .with_key("101", DecodingKey::from_secret(b"two"));
        let err = store.decoding_key(None).await.err().expect("ambiguous");
        assert!(matches!(err, KeyError::UnknownKid { kid: None }));
    }

    #[tokio::test]
    async fn missing_local_pem_reports_io_error() {
        let config: JwtConfig = serde_json::from_str(
            r#"{"certificate": {"100": "/definitely/not/there.pem"}}"#,
        )
        .expect("config");
        let store = KeyStore::from_config(&config).expect("store");
        let err = store.decoding_key(Some("100")).await.err().expect("missing file");
        assert!(matches!(err, KeyError::Io { .. }));
    }
}
