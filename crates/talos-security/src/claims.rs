//! Decoded JWT claims.

use serde_json::{Map, Value};
use thiserror::Error;

/// The `scope` claim has a shape the verifier cannot accept.
///
/// Callers map this onto the invalid-token status for whichever token the
/// claim came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("scope claim is neither a string nor a list of strings")]
pub struct MalformedScopeClaim;

/// A mapping from claim name to value, as decoded from a verified token.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Claims(Map<String, Value>);

impl Claims {
    /// Wraps a decoded claim map.
    #[must_use]
    pub fn new(claims: Map<String, Value>) -> Self {
        Self(claims)
    }

    /// The raw claim value, if present.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// A claim as a string, if present and textual.
    #[must_use]
    pub fn string_claim(&self, name: &str) -> Option<String> {
        self.0.get(name).and_then(Value::as_str).map(str::to_string)
    }

    /// Decodes the `scope` claim.
    ///
    /// Both wire shapes are accepted: a space-separated string
    /// (`"read:pets write:pets"`) and a list of strings. An absent claim is
    /// an empty scope list.
    ///
    /// # Errors
    ///
    /// [`MalformedScopeClaim`] for any other shape, including a list with
    /// non-string elements.
    pub fn scopes(&self) -> Result<Vec<String>, MalformedScopeClaim> {
        match self.0.get("scope") {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(Value::String(joined)) => {
                Ok(joined.split_whitespace().map(str::to_string).collect())
            }
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| {
                    item.as_str()
                        .map(str::to_string)
                        .ok_or(MalformedScopeClaim)
                })
                .collect(),
            Some(_) => Err(MalformedScopeClaim),
        }
    }

    /// The underlying claim map.
    #[must_use]
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}

impl From<Map<String, Value>> for Claims {
    fn from(claims: Map<String, Value>) -> Self {
        Self(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn claims(value: Value) -> Claims {
        match value {
            Value::Object(map) => Claims::new(map),
            _ => panic!("claims fixture must be an object"),
        }
    }

    #[test]
    fn scope_as_space_separated_string() {
        let claims = claims(json!({"scope": "read:pets write:pets"}));
        assert_eq!(claims.scopes().unwrap(), vec!["read:pets", "write:pets"]);
    }

    #[test]
    fn scope_as_list_of_strings() {
        let claims = claims(json!({"scope": ["read:pets", "write:pets"]}));
        assert_eq!(claims.scopes().unwrap(), vec!["read:pets", "write:pets"]);
    }

    #[test]
    fn absent_scope_is_empty() {
        let claims = claims(json!({"sub": "alice"}));
        assert_eq!(claims.scopes().unwrap(), Vec::<String>::new());
    }

    #[test]
    fn non_string_list_element_is_malformed() {
        let claims = claims(json!({"scope": ["read:pets", 42]}));
        assert_eq!(claims.scopes(), Err(MalformedScopeClaim));
    }

    #[test]
    fn numeric_scope_is_malformed() {
        let claims = claims(json!({"scope": 7}));
        assert_eq!(claims.scopes(), Err(MalformedScopeClaim));
    }

    #[test]
    fn string_claim_reads_textual_values_only() {
        let claims = claims(json!({"client_id": "app-1", "exp": 123}));
        assert_eq!(claims.string_claim("client_id"), Some("app-1".to_string()));
        assert_eq!(claims.string_claim("exp"), None);
        assert_eq!(claims.string_claim("missing"), None);
    }
}
