//! The Spec Index: parsed document, base path, security schemes, router.
//!
//! Built once at startup from a YAML or JSON OpenAPI 3 (or Swagger 2)
//! document and immutable thereafter. Operations are interned as
//! [`Arc<SpecOperation>`] handles so request-time resolution hands out a
//! reference, never a copy.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;

use crate::path::NormalisedPath;
use crate::resolve::resolve_document;
use crate::router::{PathTemplate, RouterTable};

/// HTTP verbs recognised as operation keys on a path item, in spec order.
const HTTP_METHODS: [&str; 8] = [
    "get", "put", "post", "delete", "options", "head", "patch", "trace",
];

/// Errors raised while loading and indexing a specification document.
#[derive(Debug, Error)]
pub enum SpecError {
    /// The document is not valid YAML/JSON.
    #[error("failed to parse specification: {0}")]
    Parse(String),

    /// A file could not be read.
    #[error("failed to read specification file {path}: {source}")]
    Io {
        /// The offending path.
        path: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A `$ref` points at nothing.
    #[error("unresolvable $ref {0}")]
    MissingRefTarget(String),

    /// An external `$ref` was found but no base directory is available.
    #[error("external $ref {0} cannot be resolved without a base directory")]
    ExternalRefUnsupported(String),

    /// The document has no `paths` object.
    #[error("specification has no paths object")]
    NoPaths,
}

/// Request-time resolution failures, mapped to ERR10007/ERR10008 upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveError {
    /// No path template matches the request path.
    PathNotFound,
    /// A template matches but the path item declares no such method.
    MethodNotAllowed,
}

/// An interned handle to one method-on-a-path entry of the specification.
///
/// Handed out by reference from the [`SpecIndex`]; the audit context keeps a
/// clone of the `Arc` for the life of the exchange.
#[derive(Debug, Clone)]
pub struct SpecOperation {
    path_template: NormalisedPath,
    path_item: Value,
    method: String,
    operation: Value,
}

impl SpecOperation {
    /// Creates an operation handle. `method` is stored lowercased.
    #[must_use]
    pub fn new(path_template: NormalisedPath, path_item: Value, method: &str, operation: Value) -> Self {
        Self {
            path_template,
            path_item,
            method: method.to_ascii_lowercase(),
            operation,
        }
    }

    /// The spec path template this operation lives under.
    #[must_use]
    pub fn path_template(&self) -> &NormalisedPath {
        &self.path_template
    }

    /// The resolved path item object.
    #[must_use]
    pub fn path_item(&self) -> &Value {
        &self.path_item
    }

    /// The lowercase HTTP verb.
    #[must_use]
    pub fn method(&self) -> &str {
        &self.method
    }

    /// The resolved operation object.
    #[must_use]
    pub fn operation(&self) -> &Value {
        &self.operation
    }

    /// The audit endpoint string, `"<normalisedPath>@<method>"`.
    #[must_use]
    pub fn endpoint(&self) -> String {
        format!("{}@{}", self.path_template.normalised(), self.method)
    }

    /// Operation-level parameter objects.
    pub fn parameters(&self) -> impl Iterator<Item = &Value> {
        self.operation
            .get("parameters")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
    }

    /// Path-level parameter objects, shared by every operation on the path.
    pub fn path_parameters(&self) -> impl Iterator<Item = &Value> {
        self.path_item
            .get("parameters")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
    }

    /// Finds a declared parameter by location and case-insensitive name,
    /// searching operation-level parameters first, then path-level ones.
    #[must_use]
    pub fn find_parameter(&self, location: &str, name: &str) -> Option<&Value> {
        self.parameters()
            .chain(self.path_parameters())
            .find(|p| {
                p.get("in").and_then(Value::as_str).is_some_and(|l| l.eq_ignore_ascii_case(location))
                    && p.get("name")
                        .and_then(Value::as_str)
                        .is_some_and(|n| n.eq_ignore_ascii_case(name))
            })
    }

    /// The declared request body object, if any (OpenAPI 3).
    #[must_use]
    pub fn request_body(&self) -> Option<&Value> {
        self.operation.get("requestBody").filter(|v| v.is_object())
    }

    /// Whether the request body is declared required.
    ///
    /// Covers both the OpenAPI 3 `requestBody.required` flag and the
    /// Swagger 2 `in: body` parameter.
    #[must_use]
    pub fn request_body_required(&self) -> bool {
        if let Some(body) = self.request_body() {
            return body.get("required").and_then(Value::as_bool).unwrap_or(false);
        }
        self.body_parameter()
            .and_then(|p| p.get("required"))
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// Whether the operation declares any request body at all.
    #[must_use]
    pub fn declares_request_body(&self) -> bool {
        self.request_body().is_some() || self.body_parameter().is_some()
    }

    /// The request body schema for a media type.
    ///
    /// OpenAPI 3: `requestBody.content.<media>.schema`; Swagger 2: the
    /// schema of the `in: body` parameter.
    #[must_use]
    pub fn request_body_schema(&self, media_type: &str) -> Option<&Value> {
        if let Some(body) = self.request_body() {
            return body
                .get("content")
                .and_then(|c| c.get(media_type))
                .and_then(|m| m.get("schema"));
        }
        self.body_parameter().and_then(|p| p.get("schema"))
    }

    /// The responses object.
    #[must_use]
    pub fn responses(&self) -> Option<&Value> {
        self.operation.get("responses").filter(|v| v.is_object())
    }

    /// Whether a response is declared for the status-code key.
    #[must_use]
    pub fn has_response(&self, status_code: &str) -> bool {
        self.responses()
            .and_then(|r| r.get(status_code))
            .is_some()
    }

    /// The response schema for a status-code key and media type.
    ///
    /// OpenAPI 3: `responses.<status>.content.<media>.schema`; Swagger 2:
    /// `responses.<status>.schema`.
    #[must_use]
    pub fn response_schema(&self, status_code: &str, media_type: &str) -> Option<&Value> {
        let response = self.responses()?.get(status_code)?;
        if let Some(schema) = response
            .get("content")
            .and_then(|c| c.get(media_type))
            .and_then(|m| m.get("schema"))
        {
            return Some(schema);
        }
        response.get("schema")
    }

    /// The operation's security requirements, if declared.
    #[must_use]
    pub fn security_requirements(&self) -> Option<&Vec<Value>> {
        self.operation.get("security").and_then(Value::as_array)
    }

    fn body_parameter(&self) -> Option<&Value> {
        self.parameters()
            .find(|p| p.get("in").and_then(Value::as_str) == Some("body"))
    }
}

/// The process-wide, build-once index over the specification document.
#[derive(Debug)]
pub struct SpecIndex {
    document: Value,
    openapi3: bool,
    base_path: String,
    oauth2_names: Vec<String>,
    router: RouterTable,
    operations: HashMap<String, Arc<SpecOperation>>,
}

impl SpecIndex {
    /// Parses and indexes a YAML or JSON document.
    ///
    /// External `$ref`s are rejected here since there is no base directory;
    /// use [`SpecIndex::from_file`] for multi-file specifications.
    ///
    /// # Errors
    ///
    /// Returns [`SpecError`] on parse or `$ref` resolution failure.
    pub fn from_str(text: &str) -> Result<Self, SpecError> {
        let document: Value =
            serde_yaml::from_str(text).map_err(|e| SpecError::Parse(e.to_string()))?;
        Self::from_value(&document, None)
    }

    /// Loads, parses and indexes a specification file.
    ///
    /// External `$ref`s are resolved relative to the file's directory.
    ///
    /// # Errors
    ///
    /// Returns [`SpecError`] on I/O, parse or `$ref` resolution failure.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SpecError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| SpecError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let document: Value =
            serde_yaml::from_str(&text).map_err(|e| SpecError::Parse(e.to_string()))?;
        Self::from_value(&document, path.parent())
    }

    fn from_value(raw: &Value, base_dir: Option<&Path>) -> Result<Self, SpecError> {
        let document = resolve_document(raw, base_dir)?;
        let openapi3 = document.get("openapi").is_some();
        let base_path = extract_base_path(&document, openapi3);
        let oauth2_names = extract_oauth2_names(&document, openapi3);

        let paths = document
            .get("paths")
            .and_then(Value::as_object)
            .ok_or(SpecError::NoPaths)?;

        let router = RouterTable::new(paths.keys());

        let mut operations = HashMap::new();
        for (template, path_item) in paths {
            let Some(item) = path_item.as_object() else {
                continue;
            };
            for method in HTTP_METHODS {
                if let Some(operation) = item.get(method).filter(|v| v.is_object()) {
                    let handle = SpecOperation::new(
                        NormalisedPath::new(template, ""),
                        path_item.clone(),
                        method,
                        operation.clone(),
                    );
                    operations.insert(operation_key(template, method), Arc::new(handle));
                }
            }
        }

        tracing::info!(
            openapi3,
            base_path = %base_path,
            operation_count = operations.len(),
            "specification indexed"
        );

        Ok(Self {
            document,
            openapi3,
            base_path,
            oauth2_names,
            router,
            operations,
        })
    }

    /// Whether the document is OpenAPI 3 (as opposed to Swagger 2).
    #[must_use]
    pub fn is_openapi3(&self) -> bool {
        self.openapi3
    }

    /// The base path stripped from incoming request URIs.
    #[must_use]
    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    /// Names of the declared `oauth2` security schemes, in document order.
    #[must_use]
    pub fn oauth2_names(&self) -> &[String] {
        &self.oauth2_names
    }

    /// The resolved root document.
    #[must_use]
    pub fn document(&self) -> &Value {
        &self.document
    }

    /// Canonicalises a raw request path against this spec's base path.
    #[must_use]
    pub fn normalise(&self, raw_path: &str) -> NormalisedPath {
        NormalisedPath::new(raw_path, &self.base_path)
    }

    /// Finds the most specific spec template matching the request path.
    #[must_use]
    pub fn find_matching_api_path(&self, request: &NormalisedPath) -> Option<&PathTemplate> {
        self.router.find_matching_api_path(request)
    }

    /// The resolved path item for a template's original text.
    #[must_use]
    pub fn path_item(&self, template: &str) -> Option<&Value> {
        self.document.get("paths").and_then(|p| p.get(template))
    }

    /// The interned operation handle for a template and lowercase method.
    #[must_use]
    pub fn operation(&self, template: &str, method: &str) -> Option<Arc<SpecOperation>> {
        self.operations
            .get(&operation_key(template, &method.to_ascii_lowercase()))
            .cloned()
    }

    /// Resolves a normalised request path and method to an operation handle.
    ///
    /// # Errors
    ///
    /// [`ResolveError::PathNotFound`] when no template matches,
    /// [`ResolveError::MethodNotAllowed`] when the matched path item does not
    /// declare the method.
    pub fn resolve(
        &self,
        request: &NormalisedPath,
        method: &str,
    ) -> Result<Arc<SpecOperation>, ResolveError> {
        let template = self
            .find_matching_api_path(request)
            .ok_or(ResolveError::PathNotFound)?;
        self.operation(template.original(), method)
            .ok_or(ResolveError::MethodNotAllowed)
    }

    /// Every declared endpoint as `"<basePath><path>@<method>"`, in document
    /// order.
    #[must_use]
    pub fn endpoints(&self) -> Vec<String> {
        let Some(paths) = self.document.get("paths").and_then(Value::as_object) else {
            return Vec::new();
        };
        let mut endpoints = Vec::new();
        for (template, path_item) in paths {
            let Some(item) = path_item.as_object() else {
                continue;
            };
            for method in HTTP_METHODS {
                if item.get(method).is_some_and(Value::is_object) {
                    endpoints.push(format!("{}{}@{}", self.base_path, template, method));
                }
            }
        }
        endpoints
    }
}

fn operation_key(template: &str, method: &str) -> String {
    format!("{template}@{method}")
}

/// OpenAPI 3: path component of the first server URL. Swagger 2: the
/// top-level `basePath`. A bare `/` collapses to the empty base path.
fn extract_base_path(document: &Value, openapi3: bool) -> String {
    let raw = if openapi3 {
        document
            .get("servers")
            .and_then(Value::as_array)
            .and_then(|servers| servers.first())
            .and_then(|server| server.get("url"))
            .and_then(Value::as_str)
            .map(url_path)
            .unwrap_or_default()
    } else {
        document
            .get("basePath")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };
    let trimmed = raw.trim_end_matches('/');
    trimmed.to_string()
}

/// Extracts the path component from a server URL, which may be a bare path.
fn url_path(url: &str) -> String {
    match url.find("://") {
        Some(idx) => {
            let after_scheme = &url[idx + 3..];
            match after_scheme.find('/') {
                Some(slash) => after_scheme[slash..].to_string(),
                None => String::new(),
            }
        }
        None => url.to_string(),
    }
}

fn extract_oauth2_names(document: &Value, openapi3: bool) -> Vec<String> {
    let schemes = if openapi3 {
        document
            .get("components")
            .and_then(|c| c.get("securitySchemes"))
    } else {
        document.get("securityDefinitions")
    };
    schemes
        .and_then(Value::as_object)
        .map(|map| {
            map.iter()
                .filter(|(_, scheme)| {
                    scheme.get("type").and_then(Value::as_str) == Some("oauth2")
                })
                .map(|(name, _)| name.clone())
                .collect()
        })
        .unwrap_or_default()
}
