//! `$ref` resolution.
//!
//! The document is expanded once at startup: every internal `#/...` pointer
//! is replaced inline by its target, and external `file#/pointer` references
//! are loaded relative to the spec's directory. Circular references are
//! detected through a visitation stack and replaced with a
//! `{"$circularRef": "<pointer>"}` marker node instead of recursing forever.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use crate::index::SpecError;

/// Expands every `$ref` in `root`, returning the resolved document.
///
/// `base_dir` is the directory external references are resolved against;
/// without one, an external reference is an error.
pub(crate) fn resolve_document(root: &Value, base_dir: Option<&Path>) -> Result<Value, SpecError> {
    let mut resolver = Resolver {
        base_dir,
        external: HashMap::new(),
    };
    let mut stack = Vec::new();
    resolver.expand(root, root, None, &mut stack)
}

struct Resolver<'a> {
    base_dir: Option<&'a Path>,
    /// Loaded external documents, keyed by canonical path.
    external: HashMap<PathBuf, Value>,
}

impl Resolver<'_> {
    fn expand(
        &mut self,
        node: &Value,
        root: &Value,
        file: Option<&Path>,
        stack: &mut Vec<String>,
    ) -> Result<Value, SpecError> {
        match node {
            Value::Object(map) => {
                if let Some(Value::String(reference)) = map.get("$ref") {
                    return self.expand_ref(reference, root, file, stack);
                }
                let mut out = Map::with_capacity(map.len());
                for (key, value) in map {
                    out.insert(key.clone(), self.expand(value, root, file, stack)?);
                }
                Ok(Value::Object(out))
            }
            Value::Array(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(self.expand(item, root, file, stack)?);
                }
                Ok(Value::Array(out))
            }
            other => Ok(other.clone()),
        }
    }

    fn expand_ref(
        &mut self,
        reference: &str,
        root: &Value,
        file: Option<&Path>,
        stack: &mut Vec<String>,
    ) -> Result<Value, SpecError> {
        if let Some(pointer) = reference.strip_prefix('#') {
            let key = format!("{}#{}", file.map(|p| p.display().to_string()).unwrap_or_default(), pointer);
            if stack.contains(&key) {
                tracing::debug!(reference, "circular $ref replaced with marker");
                return Ok(circular_marker(reference));
            }
            let target = root
                .pointer(pointer)
                .ok_or_else(|| SpecError::MissingRefTarget(reference.to_string()))?;
            stack.push(key);
            let expanded = self.expand(target, root, file, stack)?;
            stack.pop();
            return Ok(expanded);
        }

        // External reference: "<relative-path>#<pointer>" or bare path.
        let (rel_path, pointer) = match reference.split_once('#') {
            Some((path, pointer)) => (path, pointer),
            None => (reference, ""),
        };
        let base = match file.and_then(Path::parent).or(self.base_dir) {
            Some(dir) => dir.to_path_buf(),
            None => return Err(SpecError::ExternalRefUnsupported(reference.to_string())),
        };
        let path = base.join(rel_path);
        let doc = self.load_external(&path)?;
        let key = format!("{}#{}", path.display(), pointer);
        if stack.contains(&key) {
            tracing::debug!(reference, "circular external $ref replaced with marker");
            return Ok(circular_marker(reference));
        }
        let target = if pointer.is_empty() {
            doc.clone()
        } else {
            doc.pointer(pointer)
                .ok_or_else(|| SpecError::MissingRefTarget(reference.to_string()))?
                .clone()
        };
        stack.push(key);
        let expanded = self.expand(&target, &doc, Some(&path), stack)?;
        stack.pop();
        Ok(expanded)
    }

    fn load_external(&mut self, path: &Path) -> Result<Value, SpecError> {
        if let Some(doc) = self.external.get(path) {
            return Ok(doc.clone());
        }
        let text = fs::read_to_string(path).map_err(|source| SpecError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let doc: Value =
            serde_yaml::from_str(&text).map_err(|e| SpecError::Parse(e.to_string()))?;
        self.external.insert(path.to_path_buf(), doc.clone());
        Ok(doc)
    }
}

fn circular_marker(reference: &str) -> Value {
    let mut marker = Map::with_capacity(1);
    marker.insert(
        "$circularRef".to_string(),
        Value::String(reference.to_string()),
    );
    Value::Object(marker)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn internal_ref_is_inlined() {
        let doc = json!({
            "definitions": {"Pet": {"type": "object"}},
            "schema": {"$ref": "#/definitions/Pet"}
        });
        let resolved = resolve_document(&doc, None).expect("resolves");
        assert_eq!(resolved["schema"], json!({"type": "object"}));
    }

    #[test]
    fn nested_refs_resolve_transitively() {
        let doc = json!({
            "definitions": {
                "Id": {"type": "integer"},
                "Pet": {"properties": {"id": {"$ref": "#/definitions/Id"}}}
            },
            "schema": {"$ref": "#/definitions/Pet"}
        });
        let resolved = resolve_document(&doc, None).expect("resolves");
        assert_eq!(
            resolved["schema"]["properties"]["id"],
            json!({"type": "integer"})
        );
    }

    #[test]
    fn circular_ref_becomes_marker() {
        let doc = json!({
            "definitions": {
                "Node": {
                    "properties": {"next": {"$ref": "#/definitions/Node"}}
                }
            },
            "schema": {"$ref": "#/definitions/Node"}
        });
        let resolved = resolve_document(&doc, None).expect("resolves");
        assert_eq!(
            resolved["schema"]["properties"]["next"],
            json!({"$circularRef": "#/definitions/Node"})
        );
    }

    #[test]
    fn missing_target_is_an_error() {
        let doc = json!({"schema": {"$ref": "#/definitions/Nope"}});
        let err = resolve_document(&doc, None).expect_err("missing target");
        assert!(matches!(err, SpecError::MissingRefTarget(_)));
    }

    #[test]
    fn external_ref_without_base_dir_is_an_error() {
        let doc = json!({"schema": {"$ref": "common.yaml#/Pet"}});
        let err = resolve_document(&doc, None).expect_err("no base dir");
        assert!(matches!(err, SpecError::ExternalRefUnsupported(_)));
    }

    #[test]
    fn external_ref_is_loaded_relative_to_base_dir() {
        let dir = std::env::temp_dir().join(format!("talos-refs-{}", std::process::id()));
        std::fs::create_dir_all(&dir).expect("temp dir");
        std::fs::write(
            dir.join("common.yaml"),
            "Pet:\n  type: object\n  properties:\n    name:\n      type: string\n",
        )
        .expect("write");

        let doc = json!({"schema": {"$ref": "common.yaml#/Pet"}});
        let resolved = resolve_document(&doc, Some(&dir)).expect("resolves");
        assert_eq!(resolved["schema"]["type"], json!("object"));

        std::fs::remove_dir_all(&dir).ok();
    }
}
