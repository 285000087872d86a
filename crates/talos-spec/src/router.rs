//! Longest-specific-match path routing.
//!
//! Spec paths are compiled once into [`PathTemplate`]s and kept sorted by
//! specificity: templates with more literal segments sort first, further ties
//! broken by lexicographic comparison of the template text so matches are
//! stable and test-reproducible. Matching is then a first-hit scan over the
//! sorted list.

use crate::path::NormalisedPath;

/// A compiled spec path: literal and parameter segments plus the original
/// textual form as it appears in the specification.
#[derive(Debug, Clone)]
pub struct PathTemplate {
    path: NormalisedPath,
    literal_count: usize,
}

impl PathTemplate {
    /// Compiles a spec path template such as `/pets/{petId}`.
    #[must_use]
    pub fn new(template: &str) -> Self {
        let path = NormalisedPath::new(template, "");
        let literal_count = (0..path.len()).filter(|&i| !path.is_param(i)).count();
        Self {
            path,
            literal_count,
        }
    }

    /// The template as a [`NormalisedPath`].
    #[must_use]
    pub fn path(&self) -> &NormalisedPath {
        &self.path
    }

    /// The template text as written in the specification. Needed to look the
    /// path object back up in the document.
    #[must_use]
    pub fn original(&self) -> &str {
        self.path.original()
    }

    /// Number of non-parameter segments, the specificity measure.
    #[must_use]
    pub fn literal_count(&self) -> usize {
        self.literal_count
    }

    /// Whether this template matches the request path.
    ///
    /// Part counts must be equal; a literal segment matches only byte-equal
    /// request segments; a parameter segment matches any non-empty segment.
    #[must_use]
    pub fn matches(&self, request: &NormalisedPath) -> bool {
        if self.path.len() != request.len() {
            return false;
        }
        (0..self.path.len()).all(|i| {
            if self.path.is_param(i) {
                request.part(i).is_some_and(|part| !part.is_empty())
            } else {
                self.path.part(i) == request.part(i)
            }
        })
    }
}

/// The set of compiled path templates, sorted by specificity.
#[derive(Debug, Clone, Default)]
pub struct RouterTable {
    templates: Vec<PathTemplate>,
}

impl RouterTable {
    /// Compiles and sorts the given spec path templates.
    #[must_use]
    pub fn new<I, S>(templates: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut templates: Vec<PathTemplate> = templates
            .into_iter()
            .map(|t| PathTemplate::new(t.as_ref()))
            .collect();
        templates.sort_by(|a, b| {
            b.literal_count()
                .cmp(&a.literal_count())
                .then_with(|| a.original().cmp(b.original()))
        });
        Self { templates }
    }

    /// Finds the most specific template matching the request path.
    ///
    /// Method filtering is the caller's concern; a path can match here and
    /// still yield method-not-allowed once the operation is looked up.
    #[must_use]
    pub fn find_matching_api_path(&self, request: &NormalisedPath) -> Option<&PathTemplate> {
        self.templates.iter().find(|t| t.matches(request))
    }

    /// All templates in specificity order.
    #[must_use]
    pub fn templates(&self) -> &[PathTemplate] {
        &self.templates
    }

    /// Number of compiled templates.
    #[must_use]
    pub fn len(&self) -> usize {
        self.templates.len()
    }

    /// Whether the table holds no templates.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}
