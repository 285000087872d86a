//! Canonicalised request paths.
//!
//! A [`NormalisedPath`] is the request URI with the configured base path
//! stripped and a leading slash guaranteed. Splitting keeps the leading empty
//! segment produced by the leading slash so segment indices line up with the
//! spec's path templates, and drops trailing empty segments so `/pets` and
//! `/pets/` compare equal.

/// An immutable, canonicalised request path.
///
/// # Example
///
/// ```
/// use talos_spec::NormalisedPath;
///
/// let path = NormalisedPath::new("/v1/pets/{petId}", "/v1");
/// assert_eq!(path.normalised(), "/pets/{petId}");
/// assert_eq!(path.parts(), &["", "pets", "{petId}"]);
/// assert!(path.is_param(2));
/// assert_eq!(path.param_name(2), Some("petId"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NormalisedPath {
    original: String,
    normalised: String,
    parts: Vec<String>,
}

impl NormalisedPath {
    /// Canonicalises `path` against `base_path`.
    ///
    /// A single occurrence of `base_path` is stripped from the start when it
    /// is non-empty, then a leading `/` is prepended if missing.
    #[must_use]
    pub fn new(path: &str, base_path: &str) -> Self {
        let normalised = normalise(path, base_path);
        let parts = split_parts(&normalised);
        Self {
            original: path.to_string(),
            normalised,
            parts,
        }
    }

    /// The ordered segments of the normalised form.
    ///
    /// The leading empty segment from the leading slash is retained, so
    /// `parts()[0]` is always `""` and indices align with spec templates.
    #[must_use]
    pub fn parts(&self) -> &[String] {
        &self.parts
    }

    /// The segment at `index`, if any.
    #[must_use]
    pub fn part(&self, index: usize) -> Option<&str> {
        self.parts.get(index).map(String::as_str)
    }

    /// Whether the segment at `index` is a `{name}` parameter segment.
    #[must_use]
    pub fn is_param(&self, index: usize) -> bool {
        matches!(self.part(index), Some(part) if part.starts_with('{') && part.ends_with('}') && part.len() >= 2)
    }

    /// The parameter name enclosed by the segment at `index`, if it is a
    /// parameter segment.
    #[must_use]
    pub fn param_name(&self, index: usize) -> Option<&str> {
        if !self.is_param(index) {
            return None;
        }
        self.part(index).map(|part| &part[1..part.len() - 1])
    }

    /// The path as received, before base-path stripping.
    #[must_use]
    pub fn original(&self) -> &str {
        &self.original
    }

    /// The canonical form: base path stripped, leading slash guaranteed.
    #[must_use]
    pub fn normalised(&self) -> &str {
        &self.normalised
    }

    /// Number of segments, counting the leading empty one.
    #[must_use]
    pub fn len(&self) -> usize {
        self.parts.len()
    }

    /// Whether the path has no segments. Never true in practice since the
    /// leading slash always yields one empty segment.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }
}

impl std::fmt::Display for NormalisedPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.normalised)
    }
}

fn normalise(path: &str, base_path: &str) -> String {
    let stripped = if !base_path.is_empty() {
        path.strip_prefix(base_path).unwrap_or(path)
    } else {
        path
    };
    if stripped.starts_with('/') {
        stripped.to_string()
    } else {
        format!("/{stripped}")
    }
}

/// Splits on `/` keeping the leading empty segment but not trailing ones.
fn split_parts(normalised: &str) -> Vec<String> {
    let mut parts: Vec<String> = normalised.split('/').map(str::to_string).collect();
    while parts.len() > 1 && parts.last().is_some_and(String::is_empty) {
        parts.pop();
    }
    parts
}
