use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::domain::path::{JsonPath, PathError};

/// Classification of one divergence between template and customer data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DiffKind {
    /// Present in the template, absent from the customer data.
    Missing,
    /// Present in the customer data, absent from the template.
    Unexpected,
    TypeMismatch,
    ValueMismatch,
    /// Both sides are arrays of different length. `expected`/`actual` hold
    /// the two lengths.
    LengthMismatch,
}

impl DiffKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiffKind::Missing => "missing",
            DiffKind::Unexpected => "unexpected",
            DiffKind::TypeMismatch => "typeMismatch",
            DiffKind::ValueMismatch => "valueMismatch",
            DiffKind::LengthMismatch => "lengthMismatch",
        }
    }

    /// Parse the store's spelling. Unknown names yield `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "missing" => Some(DiffKind::Missing),
            "unexpected" => Some(DiffKind::Unexpected),
            "typeMismatch" => Some(DiffKind::TypeMismatch),
            "valueMismatch" => Some(DiffKind::ValueMismatch),
            "lengthMismatch" => Some(DiffKind::LengthMismatch),
            _ => None,
        }
    }

    pub fn default_severity(&self) -> Severity {
        match self {
            DiffKind::TypeMismatch => Severity::Error,
            DiffKind::Missing | DiffKind::LengthMismatch => Severity::Warn,
            DiffKind::ValueMismatch | DiffKind::Unexpected => Severity::Info,
        }
    }

    /// Recommended operator action for this kind of divergence.
    pub fn suggestion(&self) -> &'static str {
        match self {
            DiffKind::Missing => "Add from template",
            DiffKind::Unexpected => "Remove or keep",
            DiffKind::TypeMismatch => "Change type to match template",
            DiffKind::ValueMismatch => "Update value from template",
            DiffKind::LengthMismatch => "Adjust length",
        }
    }
}

impl fmt::Display for DiffKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Advisory only; nothing in the reconciler depends on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warn,
    Error,
}

/// One divergence at one path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiffItem {
    pub path: JsonPath,
    pub kind: DiffKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl DiffItem {
    pub fn new(
        path: JsonPath,
        kind: DiffKind,
        expected: Option<Value>,
        actual: Option<Value>,
    ) -> Self {
        Self {
            path,
            kind,
            expected,
            actual,
            severity: Some(kind.default_severity()),
            suggestion: Some(kind.suggestion().to_string()),
        }
    }

    /// `true` when the item describes a whole array or object rather than a
    /// scalar leaf.
    pub fn is_container(&self) -> bool {
        let structured = |v: &Option<Value>| matches!(v, Some(Value::Array(_) | Value::Object(_)));
        self.kind == DiffKind::LengthMismatch || structured(&self.expected) || structured(&self.actual)
    }
}

/// A diff record as delivered by the store.
///
/// The classification arrives as either `kind` or `type`, and the path may
/// be in query or pointer form. [`RawDiffItem::normalize`] folds both into a
/// [`DiffItem`], failing only on a malformed path.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawDiffItem {
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default, rename = "type")]
    pub type_: Option<String>,
    #[serde(default)]
    pub expected: Option<Value>,
    #[serde(default)]
    pub actual: Option<Value>,
    #[serde(default)]
    pub severity: Option<Severity>,
    #[serde(default)]
    pub suggestion: Option<String>,
}

impl RawDiffItem {
    pub fn normalize(self) -> Result<DiffItem, PathError> {
        let label = self.type_.or(self.kind);
        let kind = match label.as_deref().and_then(DiffKind::parse) {
            Some(kind) => kind,
            None => {
                if let Some(other) = &label {
                    tracing::warn!(kind = %other, path = %self.path, "unknown diff kind, treating as valueMismatch");
                }
                DiffKind::ValueMismatch
            }
        };

        Ok(DiffItem {
            path: JsonPath::parse(&self.path)?,
            kind,
            expected: self.expected,
            actual: self.actual,
            severity: self.severity,
            suggestion: self.suggestion,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn raw_item_accepts_type_or_kind() {
        let by_kind: RawDiffItem =
            serde_json::from_value(json!({"path": "$.a.b", "kind": "missing"})).unwrap();
        let by_type: RawDiffItem =
            serde_json::from_value(json!({"path": "$.a.b", "type": "missing"})).unwrap();

        let a = by_kind.normalize().unwrap();
        let b = by_type.normalize().unwrap();
        assert_eq!(a, b);
        assert_eq!(a.kind, DiffKind::Missing);
        assert_eq!(a.path.as_str(), "/a/b");
    }

    #[test]
    fn raw_item_defaults_to_value_mismatch() {
        let raw: RawDiffItem =
            serde_json::from_value(json!({"path": "/x", "expected": 1, "actual": 2})).unwrap();
        assert_eq!(raw.normalize().unwrap().kind, DiffKind::ValueMismatch);

        let odd: RawDiffItem =
            serde_json::from_value(json!({"path": "/x", "kind": "weird"})).unwrap();
        assert_eq!(odd.normalize().unwrap().kind, DiffKind::ValueMismatch);
    }

    #[test]
    fn raw_item_with_malformed_path_is_rejected() {
        let raw: RawDiffItem =
            serde_json::from_value(json!({"path": "$.a[x]", "kind": "missing"})).unwrap();
        assert!(matches!(raw.normalize(), Err(PathError::Malformed(_))));
    }

    #[test]
    fn serialises_kind_in_camel_case() {
        let item = DiffItem::new(
            JsonPath::from_pointer("/a"),
            DiffKind::TypeMismatch,
            Some(json!(1)),
            Some(json!("1")),
        );
        let out = serde_json::to_value(&item).unwrap();
        assert_eq!(out["kind"], json!("typeMismatch"));
        assert_eq!(out["path"], json!("/a"));
        assert_eq!(out["severity"], json!("error"));
    }

    #[test]
    fn container_detection() {
        let leaf = DiffItem::new(JsonPath::from_pointer("/a"), DiffKind::ValueMismatch, Some(json!(1)), Some(json!(2)));
        let len = DiffItem::new(JsonPath::from_pointer("/t"), DiffKind::LengthMismatch, Some(json!(3)), Some(json!(2)));
        let obj = DiffItem::new(JsonPath::from_pointer("/o"), DiffKind::Missing, Some(json!({"x": 1})), None);
        assert!(!leaf.is_container());
        assert!(len.is_container());
        assert!(obj.is_container());
    }
}
