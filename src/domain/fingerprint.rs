use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::domain::value_objects::Fingerprint;

/// Compute a SHA-256 fingerprint of a JSON document.
///
/// Algorithm:
/// 1. The document is rewritten with every object's keys sorted, so the
///    insertion order kept by the parser does not leak into the hash.
/// 2. The canonical document is serialised to compact JSON and hashed.
pub fn fingerprint(doc: &Value) -> Fingerprint {
    let canonical = canonicalize(doc);
    let content = serde_json::to_string(&canonical).unwrap_or_default();
    let hash = Sha256::digest(content.as_bytes());
    Fingerprint(format!("{:x}", hash))
}

fn canonicalize(v: &Value) -> Value {
    match v {
        Value::Object(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_by_key(|(k, _)| *k);
            Value::Object(
                entries
                    .into_iter()
                    .map(|(k, v)| (k.clone(), canonicalize(v)))
                    .collect(),
            )
        }
        Value::Array(arr) => Value::Array(arr.iter().map(canonicalize).collect()),
        _ => v.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn same_document_same_fingerprint() {
        let doc = json!({"a": 1, "b": [1, 2]});
        assert_eq!(fingerprint(&doc), fingerprint(&doc));
    }

    #[test]
    fn different_documents_differ() {
        assert_ne!(fingerprint(&json!({"a": 1})), fingerprint(&json!({"a": 2})));
    }

    #[test]
    fn key_order_independent() {
        let a = json!({"a": 1, "b": {"x": 1, "y": 2}});
        let b = json!({"b": {"y": 2, "x": 1}, "a": 1});
        assert_eq!(fingerprint(&a), fingerprint(&b));
    }

    #[test]
    fn array_order_matters() {
        assert_ne!(fingerprint(&json!([1, 2])), fingerprint(&json!([2, 1])));
    }
}
