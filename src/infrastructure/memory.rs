use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use std::collections::{BTreeMap, VecDeque};
use std::sync::Mutex;
use uuid::Uuid;

use crate::domain::changes::{
    ApplyReceipt, ChangeCard, ChangeDetails, ChangeList, ChangeSetStatus, DecisionBatch,
    RemoteDiffResponse,
};
use crate::domain::decision::Decision;
use crate::domain::error::{Resource, StoreError};
use crate::domain::path::JsonPath;
use crate::domain::ports::PayloadStore;
use crate::domain::value_objects::CustomerId;

#[derive(Default)]
struct State {
    templates: BTreeMap<String, Value>,
    saved: BTreeMap<String, Value>,
    latest: BTreeMap<String, Value>,
    checks: BTreeMap<String, RemoteDiffResponse>,
    changes: Vec<ChangeDetails>,
    /// `None` lets one call through.
    failures: VecDeque<Option<StoreError>>,
}

/// In-process implementation of [`PayloadStore`].
///
/// Submitted batches replace the customer's saved payload with the batch
/// payload and are recorded as applied change cards, newest first in
/// history. Queued failures (see [`MemoryPayloadStore::fail_next`] and
/// [`MemoryPayloadStore::fail_after`]) are returned by the next store calls
/// in order.
#[derive(Default)]
pub struct MemoryPayloadStore {
    state: Mutex<State>,
}

impl MemoryPayloadStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_template(&self, id: &str, template: Value) {
        self.with(|s| s.templates.insert(id.to_string(), template));
    }

    pub fn put_saved_payload(&self, customer: &str, payload: Value) {
        self.with(|s| s.saved.insert(customer.to_string(), payload));
    }

    pub fn put_latest_payload(&self, customer: &str, payload: Value) {
        self.with(|s| s.latest.insert(customer.to_string(), payload));
    }

    /// Canned response for [`PayloadStore::check_payload`].
    pub fn put_remote_check(&self, customer: &str, response: RemoteDiffResponse) {
        self.with(|s| s.checks.insert(customer.to_string(), response));
    }

    pub fn fail_next(&self, error: StoreError) {
        self.with(|s| s.failures.push_back(Some(error)));
    }

    /// Let `calls` store calls succeed, then fail the one after.
    pub fn fail_after(&self, calls: usize, error: StoreError) {
        self.with(|s| {
            s.failures.extend(std::iter::repeat_with(|| None).take(calls));
            s.failures.push_back(Some(error));
        });
    }

    pub fn saved_payload(&self, customer: &str) -> Option<Value> {
        self.with(|s| s.saved.get(customer).cloned())
    }

    pub fn submitted_batches(&self) -> usize {
        self.with(|s| s.changes.len())
    }

    fn with<R>(&self, f: impl FnOnce(&mut State) -> R) -> R {
        let mut guard = self
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut guard)
    }

    fn call<R>(&self, f: impl FnOnce(&mut State) -> Result<R, StoreError>) -> Result<R, StoreError> {
        self.with(|s| match s.failures.pop_front() {
            Some(Some(err)) => Err(err),
            _ => f(s),
        })
    }
}

#[async_trait]
impl PayloadStore for MemoryPayloadStore {
    async fn fetch_template(&self, template_id: &str) -> Result<Value, StoreError> {
        self.call(|s| {
            s.templates
                .get(template_id)
                .cloned()
                .ok_or_else(|| StoreError::not_found(Resource::Template, template_id))
        })
    }

    async fn fetch_saved_payload(&self, customer: &CustomerId) -> Result<Value, StoreError> {
        self.call(|s| {
            s.saved
                .get(customer.as_str())
                .cloned()
                .ok_or_else(|| StoreError::not_found(Resource::SavedPayload, customer.as_str()))
        })
    }

    async fn fetch_latest_payload(&self, customer: &CustomerId) -> Result<Value, StoreError> {
        self.call(|s| {
            s.latest
                .get(customer.as_str())
                .cloned()
                .ok_or_else(|| StoreError::not_found(Resource::LatestPayload, customer.as_str()))
        })
    }

    async fn check_payload(
        &self,
        customer: &CustomerId,
        _payload: &Value,
        _should_log: bool,
    ) -> Result<RemoteDiffResponse, StoreError> {
        self.call(|s| {
            s.checks
                .get(customer.as_str())
                .cloned()
                .ok_or_else(|| StoreError::not_found(Resource::Template, customer.as_str()))
        })
    }

    async fn submit_decisions(
        &self,
        customer: &CustomerId,
        batch: &DecisionBatch,
    ) -> Result<ApplyReceipt, StoreError> {
        self.call(|s| {
            let decisions = batch
                .decisions
                .iter()
                .map(|w| {
                    let path = JsonPath::parse(&w.path).map_err(|e| StoreError::Decode {
                        message: e.to_string(),
                    })?;
                    Ok(Decision {
                        path,
                        action: w.action,
                        value: w.value.clone(),
                    })
                })
                .collect::<Result<Vec<_>, StoreError>>()?;

            s.saved
                .insert(customer.as_str().to_string(), batch.payload.clone());

            let now = Utc::now();
            let id = Uuid::new_v4().simple().to_string();
            s.changes.push(ChangeDetails {
                card: ChangeCard {
                    id: id.clone(),
                    customer_id: customer.as_str().to_string(),
                    status: ChangeSetStatus::Applied,
                    created_utc: now,
                    applied_utc: Some(now),
                    decision_count: decisions.len(),
                    decisions,
                },
                payload: Some(batch.payload.clone()),
                error: None,
            });

            Ok(ApplyReceipt {
                change_set_id: id,
                status: ChangeSetStatus::Applied,
                error: None,
            })
        })
    }

    async fn save_payload(&self, customer: &CustomerId, payload: &Value) -> Result<(), StoreError> {
        self.call(|s| {
            s.saved
                .insert(customer.as_str().to_string(), payload.clone());
            Ok(())
        })
    }

    async fn fetch_change_history(
        &self,
        customer: &CustomerId,
        page: usize,
        page_size: usize,
    ) -> Result<ChangeList, StoreError> {
        self.call(|s| {
            let mine: Vec<&ChangeDetails> = s
                .changes
                .iter()
                .rev()
                .filter(|c| c.card.customer_id == customer.as_str())
                .collect();
            let skip = page.saturating_sub(1).saturating_mul(page_size);
            Ok(ChangeList {
                total: mine.len(),
                items: mine
                    .into_iter()
                    .skip(skip)
                    .take(page_size)
                    .map(|c| c.card.clone())
                    .collect(),
            })
        })
    }

    async fn fetch_change(&self, id: &str) -> Result<ChangeDetails, StoreError> {
        self.call(|s| {
            s.changes
                .iter()
                .find(|c| c.card.id == id)
                .cloned()
                .ok_or_else(|| StoreError::not_found(Resource::Change, id))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn submit_updates_saved_payload_and_history() {
        let store = MemoryPayloadStore::new();
        let customer = CustomerId::from("acme");
        let decisions = [Decision::apply_template("/a")];
        let batch = DecisionBatch::new(decisions.iter(), json!({"a": 1}));

        let receipt = store.submit_decisions(&customer, &batch).await.unwrap();
        assert_eq!(receipt.status, ChangeSetStatus::Applied);
        assert_eq!(store.saved_payload("acme"), Some(json!({"a": 1})));

        let history = store.fetch_change_history(&customer, 1, 20).await.unwrap();
        assert_eq!(history.total, 1);
        assert_eq!(history.items[0].decisions[0].path.as_str(), "/a");

        let details = store.fetch_change(&receipt.change_set_id).await.unwrap();
        assert_eq!(details.payload, Some(json!({"a": 1})));
    }

    #[tokio::test]
    async fn queued_failures_come_first() {
        let store = MemoryPayloadStore::new();
        store.put_template("t", json!({}));
        store.fail_next(StoreError::transport("down"));

        assert!(store.fetch_template("t").await.is_err());
        assert!(store.fetch_template("t").await.is_ok());
    }

    #[tokio::test]
    async fn fail_after_skips_the_first_calls() {
        let store = MemoryPayloadStore::new();
        store.put_template("t", json!({}));
        store.fail_after(1, StoreError::transport("down"));

        assert!(store.fetch_template("t").await.is_ok());
        assert!(store.fetch_template("t").await.is_err());
        assert!(store.fetch_template("t").await.is_ok());
    }

    #[tokio::test]
    async fn history_pages_newest_first() {
        let store = MemoryPayloadStore::new();
        let customer = CustomerId::from("acme");
        for i in 0..3 {
            let batch = DecisionBatch::new(std::iter::empty::<&Decision>(), json!({"n": i}));
            store.submit_decisions(&customer, &batch).await.unwrap();
        }
        let page = store.fetch_change_history(&customer, 2, 2).await.unwrap();
        assert_eq!(page.total, 3);
        assert_eq!(page.items.len(), 1);
    }

    #[tokio::test]
    async fn huge_page_number_is_just_empty() {
        let store = MemoryPayloadStore::new();
        let customer = CustomerId::from("acme");
        let batch = DecisionBatch::new(std::iter::empty::<&Decision>(), json!({}));
        store.submit_decisions(&customer, &batch).await.unwrap();

        let page = store
            .fetch_change_history(&customer, usize::MAX, 50)
            .await
            .unwrap();
        assert_eq!(page.total, 1);
        assert!(page.items.is_empty());
    }
}
