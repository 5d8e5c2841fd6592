use serde_json::{Map, Value};

use crate::domain::{
    diff_item::{DiffItem, DiffKind},
    path::JsonPath,
    ports::Differ,
};

// ─── Tree Differ (implementation of the port) ───

/// Structural comparison of a template tree against customer data.
///
/// Items come out in pre-order: for an object, the template's keys in their
/// declared order first, then keys only the customer has. Arrays are compared
/// index by index over the overlapping range; no attempt is made to match
/// reordered elements.
#[derive(Default)]
pub struct TreeDiffer;

impl TreeDiffer {
    pub fn new() -> Self {
        Self
    }
}

impl Differ for TreeDiffer {
    fn diff(&self, template: &Value, customer_data: &Value) -> Vec<DiffItem> {
        let mut out = Vec::new();
        walk(template, Some(customer_data), &JsonPath::root(), &mut out);
        out
    }
}

/// `customer` is `None` when the key is absent (as opposed to present and
/// `null`).
fn walk(template: &Value, customer: Option<&Value>, path: &JsonPath, out: &mut Vec<DiffItem>) {
    match (template, customer) {
        (_, None) => out.push(DiffItem::new(
            path.clone(),
            DiffKind::Missing,
            Some(template.clone()),
            None,
        )),
        (Value::Object(t), Some(Value::Object(c))) => walk_object(t, c, path, out),
        (Value::Object(_), Some(other)) => out.push(type_mismatch(path, template, other)),
        (Value::Array(t), Some(Value::Array(c))) => {
            if t.len() != c.len() {
                out.push(DiffItem::new(
                    path.clone(),
                    DiffKind::LengthMismatch,
                    Some(Value::from(t.len())),
                    Some(Value::from(c.len())),
                ));
            }
            for (idx, (tv, cv)) in t.iter().zip(c.iter()).enumerate() {
                walk(tv, Some(cv), &path.join(idx), out);
            }
        }
        (Value::Array(_), Some(other)) => out.push(type_mismatch(path, template, other)),
        (_, Some(actual)) => {
            if json_type(template) != json_type(actual) {
                out.push(type_mismatch(path, template, actual));
            } else if !json_equal(template, actual) {
                out.push(DiffItem::new(
                    path.clone(),
                    DiffKind::ValueMismatch,
                    Some(template.clone()),
                    Some(actual.clone()),
                ));
            }
        }
    }
}

fn walk_object(
    template: &Map<String, Value>,
    customer: &Map<String, Value>,
    path: &JsonPath,
    out: &mut Vec<DiffItem>,
) {
    for (key, tv) in template {
        walk(tv, customer.get(key), &path.join(key), out);
    }
    for (key, cv) in customer {
        if !template.contains_key(key) {
            out.push(DiffItem::new(
                path.join(key),
                DiffKind::Unexpected,
                None,
                Some(cv.clone()),
            ));
        }
    }
}

fn type_mismatch(path: &JsonPath, expected: &Value, actual: &Value) -> DiffItem {
    DiffItem::new(
        path.clone(),
        DiffKind::TypeMismatch,
        Some(expected.clone()),
        Some(actual.clone()),
    )
}

#[derive(Debug, PartialEq, Eq)]
enum JsonType {
    Null,
    Bool,
    Number,
    String,
    Array,
    Object,
}

fn json_type(v: &Value) -> JsonType {
    match v {
        Value::Null => JsonType::Null,
        Value::Bool(_) => JsonType::Bool,
        Value::Number(_) => JsonType::Number,
        Value::String(_) => JsonType::String,
        Value::Array(_) => JsonType::Array,
        Value::Object(_) => JsonType::Object,
    }
}

/// Deep equality where numbers compare by value (`1 == 1.0`) and object key
/// order is irrelevant.
fn json_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(na), Value::Number(nb)) => {
            if na.is_f64() || nb.is_f64() {
                na.as_f64() == nb.as_f64()
            } else {
                na == nb
            }
        }
        (Value::Array(xa), Value::Array(xb)) => {
            xa.len() == xb.len() && xa.iter().zip(xb).all(|(x, y)| json_equal(x, y))
        }
        (Value::Object(ma), Value::Object(mb)) => {
            ma.len() == mb.len()
                && ma
                    .iter()
                    .all(|(k, v)| mb.get(k).is_some_and(|w| json_equal(v, w)))
        }
        _ => a == b,
    }
}
