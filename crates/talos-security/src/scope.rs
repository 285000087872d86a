//! The scope subset test.

/// Checks the scopes carried by a token against the scopes the operation
/// requires.
///
/// When the spec requires no scopes the check accepts. Otherwise at least
/// one required scope must appear in the presented list — an intentional
/// any-of match, not full subset containment.
#[must_use]
pub fn matched_scopes(token_scopes: &[String], spec_scopes: Option<&[String]>) -> bool {
    match spec_scopes {
        None => true,
        Some(spec) if spec.is_empty() => true,
        Some(spec) => spec.iter().any(|required| token_scopes.contains(required)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scopes(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn empty_spec_scopes_accept_anything() {
        assert!(matched_scopes(&scopes(&[]), None));
        assert!(matched_scopes(&scopes(&[]), Some(&[])));
        assert!(matched_scopes(&scopes(&["read"]), Some(&[])));
    }

    #[test]
    fn one_overlapping_scope_is_enough() {
        let spec = scopes(&["read", "write"]);
        assert!(matched_scopes(&scopes(&["read"]), Some(&spec)));
    }

    #[test]
    fn disjoint_scopes_reject() {
        let spec = scopes(&["read", "write"]);
        assert!(!matched_scopes(&scopes(&["delete"]), Some(&spec)));
    }

    #[test]
    fn empty_token_scopes_reject_when_spec_requires_any() {
        let spec = scopes(&["read"]);
        assert!(!matched_scopes(&scopes(&[]), Some(&spec)));
    }
}
