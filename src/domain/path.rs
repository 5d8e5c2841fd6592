use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::fmt;
use thiserror::Error;

// ─── JsonPath ────────────────────────────────────────────────────────────────

/// A location inside a JSON document, stored in pointer form.
///
/// The root is the empty string; `/` is accepted on input and normalised to
/// it. Every other path starts with `/` and joins its segments with `/`
/// (`/items/0/price`). Segments are not escaped: keys are expected to be
/// identifier-like and never contain `/`.
///
/// The store speaks query form (`$.items[0].price`); convert at the boundary
/// with [`JsonPath::to_query_form`] / [`JsonPath::parse`]. Deserialisation
/// goes through [`JsonPath::parse`], so a malformed query path fails the
/// decode.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(into = "String")]
pub struct JsonPath(String);

impl JsonPath {
    pub fn root() -> Self {
        Self(String::new())
    }

    /// Parse a path in either notation. Strings starting with `$` must be
    /// well-formed query form; anything else is read as pointer form.
    pub fn parse(raw: &str) -> Result<Self, PathError> {
        if raw.starts_with('$') {
            parse_query_form(raw)
        } else {
            Ok(Self::from_pointer(raw))
        }
    }

    pub fn from_pointer(raw: &str) -> Self {
        let trimmed = raw.trim_end_matches('/');
        if trimmed.is_empty() {
            return Self::root();
        }
        if trimmed.starts_with('/') {
            Self(trimmed.to_string())
        } else {
            Self(format!("/{trimmed}"))
        }
    }

    pub fn from_query_form(raw: &str) -> Self {
        Self::from_pointer(&to_pointer_form(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/').skip(1)
    }

    /// Child path for an object key or an array index.
    pub fn join(&self, segment: impl fmt::Display) -> Self {
        Self(format!("{}/{}", self.0, segment))
    }

    pub fn to_query_form(&self) -> String {
        to_query_form(&self.0)
    }
}

impl fmt::Display for JsonPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            f.write_str("/")
        } else {
            f.write_str(&self.0)
        }
    }
}

/// Paths written in code. Query form is converted without validation; use
/// [`JsonPath::parse`] for anything read from outside.
impl From<&str> for JsonPath {
    fn from(raw: &str) -> Self {
        if raw.starts_with('$') {
            Self::from_query_form(raw)
        } else {
            Self::from_pointer(raw)
        }
    }
}

impl<'de> Deserialize<'de> for JsonPath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        JsonPath::parse(&raw).map_err(serde::de::Error::custom)
    }
}

impl From<JsonPath> for String {
    fn from(path: JsonPath) -> Self {
        path.0
    }
}

/// Segment-wise ordering; index segments compare numerically so `/a/10`
/// sorts after `/a/9`.
impl Ord for JsonPath {
    fn cmp(&self, other: &Self) -> Ordering {
        let mut lhs = self.segments();
        let mut rhs = other.segments();
        loop {
            match (lhs.next(), rhs.next()) {
                (None, None) => return Ordering::Equal,
                (None, Some(_)) => return Ordering::Less,
                (Some(_), None) => return Ordering::Greater,
                (Some(a), Some(b)) => {
                    let ord = match (as_index(a), as_index(b)) {
                        (Some(x), Some(y)) => x.cmp(&y),
                        _ => a.cmp(b),
                    };
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
            }
        }
    }
}

impl PartialOrd for JsonPath {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// ─── PathError ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    #[error("cannot descend into scalar at {at} (segment `{segment}`)")]
    ThroughScalar { at: String, segment: String },

    #[error("segment `{segment}` at {at} is not an array index")]
    NotAnIndex { at: String, segment: String },

    #[error("index {index} at {at} is too far past the end of a {len}-element array")]
    OutOfRange { at: String, index: usize, len: usize },

    #[error("malformed path: {0}")]
    Malformed(String),
}

// ─── Notation conversion ─────────────────────────────────────────────────────

/// Most null slots a single write may pad an array with.
pub const MAX_ARRAY_PADDING: usize = 1024;

fn as_index(segment: &str) -> Option<usize> {
    if segment.is_empty() || !segment.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    segment.parse().ok()
}

/// `/items/0/price` → `$.items[0].price`. The root (`""` or `/`) maps to `$`.
pub fn to_query_form(pointer: &str) -> String {
    let mut out = String::from("$");
    for segment in pointer.split('/').filter(|s| !s.is_empty()) {
        if as_index(segment).is_some() {
            out.push('[');
            out.push_str(segment);
            out.push(']');
        } else {
            out.push('.');
            out.push_str(segment);
        }
    }
    out
}

/// `$.items[0].price` → `/items/0/price`. `$` maps to the root `""`.
///
/// Input without a leading `$` is assumed to be pointer form already and is
/// returned unchanged.
pub fn to_pointer_form(query: &str) -> String {
    let Some(rest) = query.strip_prefix('$') else {
        return query.to_string();
    };
    let mut out = String::with_capacity(rest.len() + 1);
    let mut chars = rest.chars();
    while let Some(c) = chars.next() {
        match c {
            '.' => out.push('/'),
            '[' => {
                out.push('/');
                for d in chars.by_ref() {
                    if d == ']' {
                        break;
                    }
                    out.push(d);
                }
            }
            _ => out.push(c),
        }
    }
    out
}

/// Strict variant of [`to_pointer_form`] used on untrusted input.
pub fn parse_query_form(query: &str) -> Result<JsonPath, PathError> {
    let Some(rest) = query.strip_prefix('$') else {
        return Err(PathError::Malformed(query.to_string()));
    };
    let mut bracket = false;
    let mut digits = 0usize;
    for c in rest.chars() {
        match (bracket, c) {
            (false, '[') => {
                bracket = true;
                digits = 0;
            }
            (true, ']') if digits > 0 => bracket = false,
            (true, d) if d.is_ascii_digit() => digits += 1,
            (true, _) | (false, ']') => return Err(PathError::Malformed(query.to_string())),
            _ => {}
        }
    }
    if bracket || rest.contains("..") || rest.ends_with('.') {
        return Err(PathError::Malformed(query.to_string()));
    }
    Ok(JsonPath::from_query_form(query))
}

// ─── Traversal ───────────────────────────────────────────────────────────────

/// Value at `path`, or `None` when any step is absent, null or a scalar.
pub fn get_at_path<'a>(root: &'a Value, path: &JsonPath) -> Option<&'a Value> {
    let mut current = root;
    for segment in path.segments() {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(as_index(segment)?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Write `value` at `path`, creating missing (or null) intermediates.
///
/// A new intermediate is an array when the segment after it is an index,
/// otherwise an object. Setting the root is a no-op.
pub fn set_at_path(root: &mut Value, path: &JsonPath, value: Value) -> Result<(), PathError> {
    let segments: Vec<&str> = path.segments().collect();
    let Some((last, parents)) = segments.split_last() else {
        return Ok(());
    };

    let mut current = root;
    let mut walked = JsonPath::root();
    for (i, segment) in parents.iter().enumerate() {
        let next_is_index = as_index(segments[i + 1]).is_some();
        current = child_slot(current, &walked, segment, next_is_index)?;
        walked = walked.join(segment);
    }

    if current.is_null() {
        *current = if as_index(last).is_some() {
            Value::Array(Vec::new())
        } else {
            Value::Object(Map::new())
        };
    }

    match current {
        Value::Object(map) => {
            map.insert((*last).to_string(), value);
            Ok(())
        }
        Value::Array(items) => {
            *padded_slot(items, &walked, last)? = value;
            Ok(())
        }
        _ => Err(PathError::ThroughScalar {
            at: walked.to_string(),
            segment: (*last).to_string(),
        }),
    }
}

fn child_slot<'a>(
    current: &'a mut Value,
    at: &JsonPath,
    segment: &str,
    next_is_index: bool,
) -> Result<&'a mut Value, PathError> {
    let fresh = || {
        if next_is_index {
            Value::Array(Vec::new())
        } else {
            Value::Object(Map::new())
        }
    };

    if current.is_null() {
        *current = if as_index(segment).is_some() {
            Value::Array(Vec::new())
        } else {
            Value::Object(Map::new())
        };
    }

    match current {
        Value::Object(map) => {
            let slot = map.entry(segment.to_string()).or_insert_with(fresh);
            if slot.is_null() {
                *slot = fresh();
            }
            Ok(slot)
        }
        Value::Array(items) => {
            let slot = padded_slot(items, at, segment)?;
            if slot.is_null() {
                *slot = fresh();
            }
            Ok(slot)
        }
        _ => Err(PathError::ThroughScalar {
            at: at.to_string(),
            segment: segment.to_string(),
        }),
    }
}

/// Slot `segment` of `items`, growing the array with nulls when the index is
/// past the end by at most [`MAX_ARRAY_PADDING`].
fn padded_slot<'a>(
    items: &'a mut Vec<Value>,
    at: &JsonPath,
    segment: &str,
) -> Result<&'a mut Value, PathError> {
    let idx = as_index(segment).ok_or_else(|| PathError::NotAnIndex {
        at: at.to_string(),
        segment: segment.to_string(),
    })?;
    let len = items.len();
    if idx >= len {
        let gap = idx - len;
        let new_len = idx
            .checked_add(1)
            .filter(|_| gap <= MAX_ARRAY_PADDING)
            .ok_or_else(|| PathError::OutOfRange {
                at: at.to_string(),
                index: idx,
                len,
            })?;
        items.resize(new_len, Value::Null);
    }
    Ok(&mut items[idx])
}

/// Delete the slot at `path`, returning the removed value.
///
/// Object keys are removed in place, preserving the order of the remaining
/// keys; array elements shift down. Absent targets yield `Ok(None)`.
pub fn remove_at_path(root: &mut Value, path: &JsonPath) -> Result<Option<Value>, PathError> {
    let segments: Vec<&str> = path.segments().collect();
    let Some((last, parents)) = segments.split_last() else {
        return Ok(None);
    };

    let mut current = root;
    let mut walked = JsonPath::root();
    for segment in parents {
        let next = match current {
            Value::Object(map) => map.get_mut(*segment),
            Value::Array(items) => match as_index(segment) {
                Some(idx) => items.get_mut(idx),
                None => {
                    return Err(PathError::NotAnIndex {
                        at: walked.to_string(),
                        segment: (*segment).to_string(),
                    })
                }
            },
            Value::Null => None,
            _ => {
                return Err(PathError::ThroughScalar {
                    at: walked.to_string(),
                    segment: (*segment).to_string(),
                })
            }
        };
        match next {
            Some(v) => current = v,
            None => return Ok(None),
        }
        walked = walked.join(segment);
    }

    match current {
        Value::Object(map) => Ok(map.shift_remove(*last)),
        Value::Array(items) => {
            let idx = as_index(last).ok_or_else(|| PathError::NotAnIndex {
                at: walked.to_string(),
                segment: (*last).to_string(),
            })?;
            Ok((idx < items.len()).then(|| items.remove(idx)))
        }
        Value::Null => Ok(None),
        _ => Err(PathError::ThroughScalar {
            at: walked.to_string(),
            segment: (*last).to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn p(s: &str) -> JsonPath {
        JsonPath::from_pointer(s)
    }

    // ── notation ──

    #[test]
    fn query_form_of_nested_index() {
        assert_eq!(to_query_form("/items/0/price"), "$.items[0].price");
        assert_eq!(to_pointer_form("$.items[0].price"), "/items/0/price");
    }

    #[test]
    fn root_maps_to_dollar_and_back() {
        assert_eq!(to_query_form(""), "$");
        assert_eq!(to_query_form("/"), "$");
        assert_eq!(to_pointer_form("$"), "");
        assert!(JsonPath::from_query_form("$").is_root());
    }

    #[test]
    fn round_trips_both_directions() {
        let pointers = [
            "/a",
            "/user/name",
            "/items/0/price",
            "/matrix/3/12/cell",
            "/0/first",
            "/tags/2",
        ];
        for ptr in pointers {
            assert_eq!(to_pointer_form(&to_query_form(ptr)), ptr, "pointer {ptr}");
            let query = to_query_form(ptr);
            assert_eq!(to_query_form(&to_pointer_form(&query)), query, "query {query}");
        }
    }

    #[test]
    fn parse_accepts_either_notation() {
        assert_eq!(JsonPath::parse("$.a.b[1]").unwrap(), p("/a/b/1"));
        assert_eq!(JsonPath::parse("/a/b/1").unwrap(), p("/a/b/1"));
        assert_eq!(JsonPath::parse("a/b").unwrap(), p("/a/b"));
        assert!(JsonPath::parse("/").unwrap().is_root());
        assert!(JsonPath::parse("$.a[1").is_err());
    }

    #[test]
    fn deserialising_rejects_malformed_query_paths() {
        for bad in ["$.a[1", "$.a[x]", "$.a..b"] {
            let err = serde_json::from_value::<JsonPath>(json!(bad)).unwrap_err();
            assert!(err.to_string().contains("malformed path"), "{bad}: {err}");
        }
        let ok: JsonPath = serde_json::from_value(json!("$.a[2].b")).unwrap();
        assert_eq!(ok, p("/a/2/b"));
    }

    #[test]
    fn strict_query_parse_rejects_garbage() {
        assert!(parse_query_form("$.a[x]").is_err());
        assert!(parse_query_form("$.a[1").is_err());
        assert!(parse_query_form("a.b").is_err());
        assert!(parse_query_form("$.a..b").is_err());
        assert_eq!(parse_query_form("$.a[10].b").unwrap(), p("/a/10/b"));
    }

    #[test]
    fn ordering_is_numeric_for_indices() {
        let mut paths = vec![p("/a/10"), p("/a/9"), p("/a"), p("/b")];
        paths.sort();
        assert_eq!(paths, vec![p("/a"), p("/a/9"), p("/a/10"), p("/b")]);
    }

    // ── get ──

    #[test]
    fn get_walks_objects_and_arrays() {
        let doc = json!({"items": [{"price": 5}]});
        assert_eq!(get_at_path(&doc, &p("/items/0/price")), Some(&json!(5)));
        assert_eq!(get_at_path(&doc, &JsonPath::root()), Some(&doc));
    }

    #[test]
    fn get_halts_on_null_scalar_or_absent() {
        let doc = json!({"a": null, "b": 3, "c": [1]});
        assert_eq!(get_at_path(&doc, &p("/a/x")), None);
        assert_eq!(get_at_path(&doc, &p("/b/x")), None);
        assert_eq!(get_at_path(&doc, &p("/missing")), None);
        assert_eq!(get_at_path(&doc, &p("/c/5")), None);
        assert_eq!(get_at_path(&doc, &p("/c/x")), None);
        assert_eq!(get_at_path(&doc, &p("/a")), Some(&Value::Null));
    }

    // ── set ──

    #[test]
    fn set_creates_intermediates_by_next_segment() {
        let mut doc = json!({});
        set_at_path(&mut doc, &p("/list/0/name"), json!("x")).unwrap();
        set_at_path(&mut doc, &p("/cfg/mode"), json!("on")).unwrap();
        assert_eq!(doc, json!({"list": [{"name": "x"}], "cfg": {"mode": "on"}}));
    }

    #[test]
    fn set_replaces_null_intermediate() {
        let mut doc = json!({"a": null});
        set_at_path(&mut doc, &p("/a/b"), json!(1)).unwrap();
        assert_eq!(doc, json!({"a": {"b": 1}}));
    }

    #[test]
    fn set_at_root_is_noop() {
        let mut doc = json!({"a": 1});
        set_at_path(&mut doc, &JsonPath::root(), json!("ignored")).unwrap();
        assert_eq!(doc, json!({"a": 1}));
    }

    #[test]
    fn set_pads_arrays_with_null() {
        let mut doc = json!({"a": [1]});
        set_at_path(&mut doc, &p("/a/3"), json!(4)).unwrap();
        assert_eq!(doc, json!({"a": [1, null, null, 4]}));
    }

    #[test]
    fn set_refuses_indices_far_past_the_end() {
        let mut doc = json!({"a": [1]});
        let err = set_at_path(&mut doc, &p("/a/18446744073709551615"), json!(1)).unwrap_err();
        assert!(matches!(err, PathError::OutOfRange { len: 1, .. }), "{err}");

        let err = set_at_path(&mut doc, &p("/a/1000000000/x"), json!(1)).unwrap_err();
        assert!(matches!(err, PathError::OutOfRange { .. }), "{err}");
        assert_eq!(doc, json!({"a": [1]}));

        set_at_path(&mut doc, &p(&format!("/a/{}", 1 + MAX_ARRAY_PADDING)), json!(2)).unwrap();
        assert_eq!(doc["a"].as_array().unwrap().len(), MAX_ARRAY_PADDING + 2);
    }

    #[test]
    fn set_refuses_to_traverse_scalars() {
        let mut doc = json!({"a": 5});
        let err = set_at_path(&mut doc, &p("/a/b"), json!(1)).unwrap_err();
        assert!(matches!(err, PathError::ThroughScalar { .. }));
        assert_eq!(doc, json!({"a": 5}));
    }

    #[test]
    fn set_refuses_key_on_array() {
        let mut doc = json!({"a": [1, 2]});
        let err = set_at_path(&mut doc, &p("/a/name"), json!(1)).unwrap_err();
        assert!(matches!(err, PathError::NotAnIndex { .. }));
    }

    #[test]
    fn set_keeps_key_order() {
        let mut doc = json!({"a": 1, "b": 2, "c": 3});
        set_at_path(&mut doc, &p("/b"), json!(20)).unwrap();
        let keys: Vec<_> = doc.as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys, ["a", "b", "c"]);
    }

    // ── remove ──

    #[test]
    fn remove_deletes_key_and_preserves_order() {
        let mut doc = json!({"a": 1, "b": 2, "c": 3});
        assert_eq!(remove_at_path(&mut doc, &p("/a")).unwrap(), Some(json!(1)));
        let keys: Vec<_> = doc.as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys, ["b", "c"]);
    }

    #[test]
    fn remove_array_element_and_absent_targets() {
        let mut doc = json!({"t": ["x", "y"]});
        assert_eq!(remove_at_path(&mut doc, &p("/t/0")).unwrap(), Some(json!("x")));
        assert_eq!(remove_at_path(&mut doc, &p("/t/7")).unwrap(), None);
        assert_eq!(remove_at_path(&mut doc, &p("/nope/deeper")).unwrap(), None);
        assert_eq!(doc, json!({"t": ["y"]}));
    }
}
