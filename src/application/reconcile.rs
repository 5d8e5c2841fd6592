use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::domain::{
    decision::{Decision, DecisionAction, PendingDecisions},
    error::ValidationError,
    fingerprint::fingerprint,
    path::{get_at_path, remove_at_path, set_at_path, JsonPath},
    value_objects::Fingerprint,
};

/// A decision that was dropped, with the reason.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RejectedDecision {
    pub decision: Decision,
    #[serde(serialize_with = "as_display")]
    pub reason: ValidationError,
}

fn as_display<S: serde::Serializer>(e: &ValidationError, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(e)
}

/// Result of folding a pending set into a document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReconcileOutcome {
    /// The document to persist.
    pub document: Value,
    /// Decisions to hand to the store, in application order.
    pub submitted: Vec<Decision>,
    /// `keepCustomer` paths: resolved without any change.
    pub resolved_locally: Vec<JsonPath>,
    pub rejected: Vec<RejectedDecision>,
    pub before: Fingerprint,
    pub after: Fingerprint,
}

impl ReconcileOutcome {
    pub fn document_changed(&self) -> bool {
        self.before != self.after
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Reconciler
// ─────────────────────────────────────────────────────────────────────────────

/// Materialises a set of per-path decisions into a new customer document.
///
/// # Algorithm
/// 1. Writes first, in path order: `applyTemplate` copies the template value
///    at the path (or removes the slot when the template has none), `set`
///    writes the supplied value.
/// 2. Then `remove` decisions, deepest/highest path first, so removing array
///    elements does not shift the indices of later removals.
/// 3. `keepCustomer` never touches the document and is never submitted.
///
/// A decision that cannot be applied (a `set` without a value, a path that
/// runs through a scalar) is rejected on its own; the rest of the batch still
/// applies. The whole operation is a pure function of its inputs.
pub struct Reconciler;

impl Reconciler {
    pub fn new() -> Self {
        Self
    }

    pub fn reconcile(
        &self,
        customer_data: &Value,
        template: &Value,
        decisions: &PendingDecisions,
    ) -> ReconcileOutcome {
        let mut document = customer_data.clone();
        let mut submitted = Vec::new();
        let mut resolved_locally = Vec::new();
        let mut rejected = Vec::new();
        let mut removals: Vec<&Decision> = Vec::new();

        for decision in decisions.iter() {
            let applied = match decision.action {
                DecisionAction::KeepCustomer => {
                    resolved_locally.push(decision.path.clone());
                    continue;
                }
                DecisionAction::Remove => {
                    removals.push(decision);
                    continue;
                }
                DecisionAction::ApplyTemplate => match get_at_path(template, &decision.path) {
                    Some(expected) => write(&mut document, &decision.path, expected.clone()),
                    None => {
                        removals.push(decision);
                        continue;
                    }
                },
                DecisionAction::Set => match &decision.value {
                    Some(value) => write(&mut document, &decision.path, value.clone()),
                    None => Err(ValidationError::MissingValue {
                        path: decision.path.clone(),
                    }),
                },
            };
            settle(decision, applied, &mut submitted, &mut rejected);
        }

        removals.sort_by(|a, b| b.path.cmp(&a.path));
        for decision in removals {
            let applied = erase(&mut document, &decision.path);
            settle(decision, applied, &mut submitted, &mut rejected);
        }

        let before = fingerprint(customer_data);
        let after = fingerprint(&document);
        debug!(
            submitted = submitted.len(),
            resolved = resolved_locally.len(),
            rejected = rejected.len(),
            changed = before != after,
            "reconciled decisions"
        );

        ReconcileOutcome {
            document,
            submitted,
            resolved_locally,
            rejected,
            before,
            after,
        }
    }
}

impl Default for Reconciler {
    fn default() -> Self {
        Self::new()
    }
}

fn write(doc: &mut Value, path: &JsonPath, value: Value) -> Result<(), ValidationError> {
    set_at_path(doc, path, value).map_err(|source| ValidationError::Path {
        path: path.clone(),
        source,
    })
}

fn erase(doc: &mut Value, path: &JsonPath) -> Result<(), ValidationError> {
    remove_at_path(doc, path)
        .map(|_| ())
        .map_err(|source| ValidationError::Path {
            path: path.clone(),
            source,
        })
}

fn settle(
    decision: &Decision,
    applied: Result<(), ValidationError>,
    submitted: &mut Vec<Decision>,
    rejected: &mut Vec<RejectedDecision>,
) {
    match applied {
        Ok(()) => submitted.push(decision.clone()),
        Err(reason) => {
            warn!(path = %decision.path, action = %decision.action, %reason, "decision rejected");
            rejected.push(RejectedDecision {
                decision: decision.clone(),
                reason,
            });
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
