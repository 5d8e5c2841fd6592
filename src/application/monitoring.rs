use async_trait::async_trait;
use serde_json::Value;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::{info, instrument};

use crate::domain::changes::{
    ApplyReceipt, ChangeDetails, ChangeList, DecisionBatch, RemoteDiffResponse,
};
use crate::domain::diff_item::DiffItem;
use crate::domain::error::StoreError;
use crate::domain::ports::{Differ, PayloadStore};
use crate::domain::value_objects::CustomerId;

// ─── PerfReport ──────────────────────────────────────────────────────────────

/// A single timed operation.
#[derive(Debug, Clone, serde::Serialize)]
pub struct OpTiming {
    /// Store method name, or "diff" for the differ.
    pub operation: &'static str,
    /// Customer, template or change id the operation was for.
    pub target: String,
    /// Elapsed wall time in milliseconds.
    pub duration_ms: u128,
    /// Diffs produced, decisions submitted or history cards returned.
    pub items: usize,
    pub ok: bool,
}

/// Accumulated timings for one command run.
///
/// Shared between the decorators of a run via `Arc<Mutex<_>>`; render with
/// [`crate::presentation::cli_summary::print_perf_summary`].
#[derive(Debug, Default, Clone, serde::Serialize)]
pub struct PerfReport {
    pub timings: Vec<OpTiming>,
    pub store_calls: usize,
    pub total_diffs: usize,
    pub total_ms: u128,
}

impl PerfReport {
    pub fn new() -> Arc<Mutex<Self>> {
        Arc::new(Mutex::new(Self::default()))
    }

    /// Copy of the report so far.
    pub fn snapshot(report: &Arc<Mutex<Self>>) -> Self {
        report.lock().map(|r| r.clone()).unwrap_or_default()
    }

    fn record(report: &Arc<Mutex<Self>>, timing: OpTiming) {
        if let Ok(mut r) = report.lock() {
            r.total_ms += timing.duration_ms;
            if timing.operation == "diff" {
                r.total_diffs += timing.items;
            } else {
                r.store_calls += 1;
            }
            r.timings.push(timing);
        }
    }
}

// ─── MonitoringPayloadStore ──────────────────────────────────────────────────

/// Decorator: wraps any `PayloadStore` and records wall time per call in the
/// shared `PerfReport`. Failed calls are recorded too.
pub struct MonitoringPayloadStore {
    inner: Arc<dyn PayloadStore>,
    report: Arc<Mutex<PerfReport>>,
}

impl MonitoringPayloadStore {
    pub fn new(inner: Arc<dyn PayloadStore>, report: Arc<Mutex<PerfReport>>) -> Self {
        Self { inner, report }
    }

    async fn timed<T, F>(
        &self,
        operation: &'static str,
        key: &str,
        count: impl Fn(&T) -> usize,
        call: F,
    ) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        let start = Instant::now();
        let result = call.await;
        let duration_ms = start.elapsed().as_millis();
        let items = result.as_ref().map(&count).unwrap_or(0);

        info!(operation, key, ok = result.is_ok(), items, duration_ms, "store call completed");

        PerfReport::record(
            &self.report,
            OpTiming {
                operation,
                target: key.to_string(),
                duration_ms,
                items,
                ok: result.is_ok(),
            },
        );
        result
    }
}

#[async_trait]
impl PayloadStore for MonitoringPayloadStore {
    #[instrument(name = "fetch_template", skip(self), level = "debug")]
    async fn fetch_template(&self, template_id: &str) -> Result<Value, StoreError> {
        self.timed("fetch_template", template_id, |_| 1, self.inner.fetch_template(template_id))
            .await
    }

    #[instrument(name = "fetch_saved_payload", skip(self, customer), fields(customer = %customer), level = "debug")]
    async fn fetch_saved_payload(&self, customer: &CustomerId) -> Result<Value, StoreError> {
        self.timed(
            "fetch_saved_payload",
            customer.as_str(),
            |_| 1,
            self.inner.fetch_saved_payload(customer),
        )
        .await
    }

    #[instrument(name = "fetch_latest_payload", skip(self, customer), fields(customer = %customer), level = "debug")]
    async fn fetch_latest_payload(&self, customer: &CustomerId) -> Result<Value, StoreError> {
        self.timed(
            "fetch_latest_payload",
            customer.as_str(),
            |_| 1,
            self.inner.fetch_latest_payload(customer),
        )
        .await
    }

    #[instrument(name = "check_payload", skip(self, customer, payload), fields(customer = %customer), level = "debug")]
    async fn check_payload(
        &self,
        customer: &CustomerId,
        payload: &Value,
        should_log: bool,
    ) -> Result<RemoteDiffResponse, StoreError> {
        self.timed(
            "check_payload",
            customer.as_str(),
            |r: &RemoteDiffResponse| r.diffs.len(),
            self.inner.check_payload(customer, payload, should_log),
        )
        .await
    }

    #[instrument(name = "submit_decisions", skip(self, customer, batch), fields(customer = %customer), level = "debug")]
    async fn submit_decisions(
        &self,
        customer: &CustomerId,
        batch: &DecisionBatch,
    ) -> Result<ApplyReceipt, StoreError> {
        let n = batch.decisions.len();
        self.timed(
            "submit_decisions",
            customer.as_str(),
            move |_| n,
            self.inner.submit_decisions(customer, batch),
        )
        .await
    }

    async fn save_payload(&self, customer: &CustomerId, payload: &Value) -> Result<(), StoreError> {
        self.timed(
            "save_payload",
            customer.as_str(),
            |_| 1,
            self.inner.save_payload(customer, payload),
        )
        .await
    }

    async fn fetch_change_history(
        &self,
        customer: &CustomerId,
        page: usize,
        page_size: usize,
    ) -> Result<ChangeList, StoreError> {
        self.timed(
            "fetch_change_history",
            customer.as_str(),
            |l: &ChangeList| l.items.len(),
            self.inner.fetch_change_history(customer, page, page_size),
        )
        .await
    }

    async fn fetch_change(&self, id: &str) -> Result<ChangeDetails, StoreError> {
        self.timed("fetch_change", id, |_| 1, self.inner.fetch_change(id))
            .await
    }
}

// ─── MonitoringDiffer ────────────────────────────────────────────────────────

/// Decorator: wraps any `Differ`, measures wall time per `diff` call, and
/// appends the result to the shared `PerfReport`.
pub struct MonitoringDiffer {
    inner: Arc<dyn Differ>,
    report: Arc<Mutex<PerfReport>>,
}

impl MonitoringDiffer {
    pub fn new(inner: Arc<dyn Differ>, report: Arc<Mutex<PerfReport>>) -> Self {
        Self { inner, report }
    }
}

impl Differ for MonitoringDiffer {
    #[instrument(name = "diff", skip(self, template, customer_data), level = "info")]
    fn diff(&self, template: &Value, customer_data: &Value) -> Vec<DiffItem> {
        let start = Instant::now();
        let result = self.inner.diff(template, customer_data);
        let duration_ms = start.elapsed().as_millis();

        info!(diffs = result.len(), duration_ms, "diff completed");

        PerfReport::record(
            &self.report,
            OpTiming {
                operation: "diff",
                target: String::new(),
                duration_ms,
                items: result.len(),
                ok: true,
            },
        );

        result
    }
}
