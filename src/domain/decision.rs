use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

use crate::domain::path::JsonPath;

/// Resolution chosen for a single path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DecisionAction {
    /// Use the template's value (older store builds spell it `applaTemplate`).
    #[serde(alias = "applaTemplate")]
    ApplyTemplate,
    /// Leave the customer value alone. Resolved locally, never submitted.
    KeepCustomer,
    /// Use the explicit `value` carried by the decision.
    Set,
    Remove,
}

impl DecisionAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionAction::ApplyTemplate => "applyTemplate",
            DecisionAction::KeepCustomer => "keepCustomer",
            DecisionAction::Set => "set",
            DecisionAction::Remove => "remove",
        }
    }

    pub fn is_submittable(&self) -> bool {
        !matches!(self, DecisionAction::KeepCustomer)
    }
}

impl fmt::Display for DecisionAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A decision as stored in the pending set and exchanged with the store.
///
/// `path` deserialises from either notation. `value` is required when
/// `action` is [`DecisionAction::Set`]; the reconciler rejects a `set`
/// without one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub path: JsonPath,
    pub action: DecisionAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

impl Decision {
    pub fn new(path: JsonPath, action: DecisionAction) -> Self {
        Self {
            path,
            action,
            value: None,
        }
    }

    pub fn apply_template(path: impl Into<JsonPath>) -> Self {
        Self::new(path.into(), DecisionAction::ApplyTemplate)
    }

    pub fn keep_customer(path: impl Into<JsonPath>) -> Self {
        Self::new(path.into(), DecisionAction::KeepCustomer)
    }

    pub fn set(path: impl Into<JsonPath>, value: Value) -> Self {
        Self {
            path: path.into(),
            action: DecisionAction::Set,
            value: Some(value),
        }
    }

    pub fn remove(path: impl Into<JsonPath>) -> Self {
        Self::new(path.into(), DecisionAction::Remove)
    }

    /// Store-facing shape: query-form path, value only for `set`.
    pub fn to_wire(&self) -> WireDecision {
        WireDecision {
            path: self.path.to_query_form(),
            action: self.action,
            value: match self.action {
                DecisionAction::Set => self.value.clone(),
                _ => None,
            },
        }
    }
}

/// Decision as submitted to the store. Paths are in query form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireDecision {
    pub path: String,
    pub action: DecisionAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

/// What the operator asked for: a decision, or clearing a previous one.
#[derive(Debug, Clone, PartialEq)]
pub enum UiAction {
    Decide(DecisionAction, Option<Value>),
    Undo,
}

/// Operator intent for one path, as collected by the presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "UiDecisionRepr", into = "UiDecisionRepr")]
pub struct UiDecision {
    pub path: JsonPath,
    pub action: UiAction,
}

impl UiDecision {
    pub fn decide(decision: Decision) -> Self {
        Self {
            path: decision.path,
            action: UiAction::Decide(decision.action, decision.value),
        }
    }

    pub fn undo(path: impl Into<JsonPath>) -> Self {
        Self {
            path: path.into(),
            action: UiAction::Undo,
        }
    }
}

impl From<Decision> for UiDecision {
    fn from(decision: Decision) -> Self {
        Self::decide(decision)
    }
}

#[derive(Serialize, Deserialize)]
struct UiDecisionRepr {
    path: JsonPath,
    action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    value: Option<Value>,
}

impl TryFrom<UiDecisionRepr> for UiDecision {
    type Error = String;

    fn try_from(repr: UiDecisionRepr) -> Result<Self, Self::Error> {
        if repr.action == "undo" {
            if repr.value.is_some() {
                return Err(format!("undo at {} must not carry a value", repr.path));
            }
            return Ok(UiDecision::undo(repr.path));
        }
        let action: DecisionAction =
            serde_json::from_value(Value::String(repr.action.clone()))
                .map_err(|_| format!("unknown action `{}`", repr.action))?;
        Ok(UiDecision {
            path: repr.path,
            action: UiAction::Decide(action, repr.value),
        })
    }
}

impl From<UiDecision> for UiDecisionRepr {
    fn from(ui: UiDecision) -> Self {
        match ui.action {
            UiAction::Undo => UiDecisionRepr {
                path: ui.path,
                action: "undo".to_string(),
                value: None,
            },
            UiAction::Decide(action, value) => UiDecisionRepr {
                path: ui.path,
                action: action.to_string(),
                value,
            },
        }
    }
}

// ─── PendingDecisions ────────────────────────────────────────────────────────

/// The not-yet-submitted decisions of one session, one per path.
///
/// Recording a decision replaces whatever was recorded for the same path
/// before; recording an undo removes the entry. Iteration is in path order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PendingDecisions(BTreeMap<JsonPath, Decision>);

impl PendingDecisions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply operator intent. Returns the decision it replaced or removed.
    pub fn record(&mut self, ui: UiDecision) -> Option<Decision> {
        match ui.action {
            UiAction::Undo => self.0.remove(&ui.path),
            UiAction::Decide(action, value) => {
                let decision = Decision {
                    path: ui.path.clone(),
                    action,
                    value,
                };
                self.0.insert(ui.path, decision)
            }
        }
    }

    pub fn get(&self, path: &JsonPath) -> Option<&Decision> {
        self.0.get(path)
    }

    pub fn contains(&self, path: &JsonPath) -> bool {
        self.0.contains_key(path)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Decision> {
        self.0.values()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }
}

impl FromIterator<Decision> for PendingDecisions {
    fn from_iter<I: IntoIterator<Item = Decision>>(iter: I) -> Self {
        let mut set = PendingDecisions::new();
        for decision in iter {
            set.record(UiDecision::decide(decision));
        }
        set
    }
}
