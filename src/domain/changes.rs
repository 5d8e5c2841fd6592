use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::domain::decision::{Decision, WireDecision};
use crate::domain::diff_item::RawDiffItem;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeSetStatus {
    Pending,
    Applied,
    Failed,
}

/// Everything one save sends to the store.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionBatch {
    pub batch_id: Uuid,
    pub decisions: Vec<WireDecision>,
    /// The reconciled document the decisions produce.
    pub payload: Value,
}

impl DecisionBatch {
    pub fn new<'a>(decisions: impl IntoIterator<Item = &'a Decision>, payload: Value) -> Self {
        Self {
            batch_id: Uuid::new_v4(),
            decisions: decisions.into_iter().map(Decision::to_wire).collect(),
            payload,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.decisions.is_empty()
    }
}

/// Store acknowledgement of a submitted batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyReceipt {
    pub change_set_id: String,
    pub status: ChangeSetStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Server-side diff response to a payload check.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RemoteDiffResponse {
    #[serde(default)]
    pub diffs: Vec<RawDiffItem>,
    #[serde(default)]
    pub status: Option<String>,
}

/// One entry of a customer's change history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeCard {
    pub id: String,
    pub customer_id: String,
    pub status: ChangeSetStatus,
    pub created_utc: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub applied_utc: Option<DateTime<Utc>>,
    pub decision_count: usize,
    #[serde(default)]
    pub decisions: Vec<Decision>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChangeList {
    pub total: usize,
    pub items: Vec<ChangeCard>,
}

/// Full record of one change, as returned by the store's detail endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeDetails {
    #[serde(flatten)]
    pub card: ChangeCard,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
