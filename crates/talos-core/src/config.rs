//! Configuration snapshots for the validation and security modules.
//!
//! Configuration is loaded once at startup and treated as immutable for the
//! life of the process. Files may be TOML or JSON; the format is selected by
//! extension. The security module reads `openapi-security.{toml,json}` first
//! and falls back to `security.{toml,json}` in the same directory.
//!
//! Option names on disk are camelCase to match the documented external
//! interface (`enableVerifyJwt`, `skipBodyValidation`, ...).

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while loading configuration files.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read config file {path}: {source}")]
    Io {
        /// The offending path.
        path: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The file contents could not be parsed.
    #[error("failed to parse config file {path}: {message}")]
    Parse {
        /// The offending path.
        path: String,
        /// Parser diagnostic.
        message: String,
    },

    /// The file extension is not `.toml` or `.json`.
    #[error("unsupported config format for {path}, expected .toml or .json")]
    UnsupportedFormat {
        /// The offending path.
        path: String,
    },

    /// None of the candidate files exist.
    #[error("no config file found, tried: {tried}")]
    NotFound {
        /// The candidate paths that were probed.
        tried: String,
    },
}

/// Configuration for the request/response validation module.
///
/// Maps to `validator.{toml,json}`:
///
/// ```toml
/// enabled = true
/// logError = true
/// skipBodyValidation = false
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct ValidatorConfig {
    /// Whether the validation middleware runs at all. Defaults to `false`.
    pub enabled: bool,
    /// Emit every produced status to the logger at `error` level.
    pub log_error: bool,
    /// Skip body validation outright when no body attachment exists.
    pub skip_body_validation: bool,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            log_error: false,
            skip_body_validation: false,
        }
    }
}

impl ValidatorConfig {
    /// Loads the validator configuration from a file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file is missing, unreadable or invalid.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        load_file(path.as_ref())
    }
}

/// JWT verification settings nested under `[jwt]` in the security config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct JwtConfig {
    /// Verification key sources keyed by `kid`. A value is either a path to
    /// a local PEM public key or an `http(s)` JWKS endpoint URL.
    pub certificate: BTreeMap<String, String>,
    /// Leeway in seconds applied to `exp` and `nbf` checks.
    pub clock_skew_in_seconds: u64,
    /// Expected `iss` claim, checked when present.
    pub issuer: Option<String>,
    /// Expected `aud` claim, checked when present.
    pub audience: Option<String>,
    /// Timeout for a JWKS endpoint fetch, in seconds. Defaults to 5.
    pub key_fetch_timeout_in_seconds: Option<u64>,
}

impl JwtConfig {
    /// Default JWKS fetch timeout when none is configured.
    pub const DEFAULT_KEY_FETCH_TIMEOUT_SECS: u64 = 5;

    /// The effective JWKS fetch timeout.
    #[must_use]
    pub fn key_fetch_timeout_secs(&self) -> u64 {
        self.key_fetch_timeout_in_seconds
            .unwrap_or(Self::DEFAULT_KEY_FETCH_TIMEOUT_SECS)
    }
}

/// Configuration for the security module.
///
/// Maps to `openapi-security.{toml,json}` with a fallback to
/// `security.{toml,json}`:
///
/// ```toml
/// enableVerifyJwt = true
/// enableVerifyScope = true
/// enableExtractScopeToken = true
///
/// [jwt]
/// clockSkewInSeconds = 60
/// [jwt.certificate]
/// "100" = "certs/primary.pem"
/// "101" = "https://issuer.example.com/.well-known/jwks.json"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct SecurityConfig {
    /// Verify the bearer token on every request.
    pub enable_verify_jwt: bool,
    /// Check token scopes against the operation's security requirement.
    pub enable_verify_scope: bool,
    /// Look for a secondary `X-Scope-Token` header and verify it.
    pub enable_extract_scope_token: bool,
    /// Prefetch all JWKS key sources at startup instead of lazily.
    pub bootstrap_from_key_service: bool,
    /// JWT verification settings.
    pub jwt: JwtConfig,
}

impl SecurityConfig {
    /// File stems probed by [`SecurityConfig::load`], in priority order.
    pub const CONFIG_STEMS: [&'static str; 2] = ["openapi-security", "security"];

    /// Loads the security configuration from a file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file is missing, unreadable or invalid.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        load_file(path.as_ref())
    }

    /// Loads the security configuration from a directory.
    ///
    /// Probes `openapi-security.toml`, `openapi-security.json`,
    /// `security.toml`, `security.json` in that order and loads the first
    /// that exists.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NotFound`] when no candidate exists, or a
    /// parse/IO error for the first candidate that does.
    pub fn load<P: AsRef<Path>>(dir: P) -> Result<Self, ConfigError> {
        let dir = dir.as_ref();
        let mut tried = Vec::new();
        for stem in Self::CONFIG_STEMS {
            for ext in ["toml", "json"] {
                let candidate = dir.join(format!("{stem}.{ext}"));
                if candidate.is_file() {
                    return load_file(&candidate);
                }
                tried.push(candidate.display().to_string());
            }
        }
        Err(ConfigError::NotFound {
            tried: tried.join(", "),
        })
    }
}

/// Loads and deserialises a TOML or JSON config file by extension.
fn load_file<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let parsed = match path.extension().and_then(|e| e.to_str()) {
        Some("toml") => toml::from_str(&text).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?,
        Some("json") => serde_json::from_str(&text).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?,
        _ => {
            return Err(ConfigError::UnsupportedFormat {
                path: path.display().to_string(),
            })
        }
    };
    tracing::debug!(path = %path.display(), "loaded configuration file");
    Ok(parsed)
}
