use crate::domain::{
    changes::{ApplyReceipt, ChangeDetails, ChangeList, DecisionBatch, RemoteDiffResponse},
    diff_item::DiffItem,
    error::StoreError,
    value_objects::CustomerId,
};
use async_trait::async_trait;
use serde_json::Value;

/// Port: the remote template/payload store (implemented by HttpPayloadStore
/// and MemoryPayloadStore)
#[async_trait]
pub trait PayloadStore: Send + Sync {
    /// Template for `template_id` (a customer id, or a default template id).
    async fn fetch_template(&self, template_id: &str) -> Result<Value, StoreError>;

    async fn fetch_saved_payload(&self, customer: &CustomerId) -> Result<Value, StoreError>;

    /// Most recent payload the customer submitted. Only consulted when no
    /// saved payload exists.
    async fn fetch_latest_payload(&self, customer: &CustomerId) -> Result<Value, StoreError>;

    /// Ask the store to diff `payload` against the customer's template.
    async fn check_payload(
        &self,
        customer: &CustomerId,
        payload: &Value,
        should_log: bool,
    ) -> Result<RemoteDiffResponse, StoreError>;

    async fn submit_decisions(
        &self,
        customer: &CustomerId,
        batch: &DecisionBatch,
    ) -> Result<ApplyReceipt, StoreError>;

    async fn save_payload(&self, customer: &CustomerId, payload: &Value) -> Result<(), StoreError>;

    async fn fetch_change_history(
        &self,
        customer: &CustomerId,
        page: usize,
        page_size: usize,
    ) -> Result<ChangeList, StoreError>;

    async fn fetch_change(&self, id: &str) -> Result<ChangeDetails, StoreError>;
}

/// Port: tree diff algorithm (implemented by TreeDiffer)
pub trait Differ: Send + Sync {
    fn diff(&self, template: &Value, customer_data: &Value) -> Vec<DiffItem>;
}

/// Port: output formatting (implemented by JsonWriter, MarkdownWriter)
pub trait OutputWriter: Send + Sync {
    /// Serializes the report to a string (JSON, Markdown, etc.)
    fn format(&self, report: &crate::presentation::report::ComparisonReport) -> anyhow::Result<String>;
    /// Extension of the produced file (e.g. "json", "md")
    fn extension(&self) -> &'static str;
}
