use anyhow::{bail, Result};
use serde_json::Value;
use std::sync::{Arc, Mutex};

pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod presentation;

// ─── Log level ────────────────────────────────────────────────────────────────

/// Controls the verbosity of payloadiff's internal tracing output.
///
/// Pass to [`init_tracing`] before calling any async entry point.
///
/// | Variant | `tracing` level | When to use                                |
/// |---------|-----------------|--------------------------------------------|
/// | `Error` | `error`         | `--quiet` / CI scripting                   |
/// | `Info`  | `info`          | Default, shows store calls and timings     |
/// | `Debug` | `debug`         | `--verbose`, adds session transitions      |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    Error,
    #[default]
    Info,
    Debug,
}

/// Initialise the global `tracing` subscriber for payloadiff.
///
/// Respects `RUST_LOG` when set, falling back to `level` otherwise. Call
/// this once at startup; library consumers with their own subscriber should
/// skip it.
///
/// Only available with the `cli` feature (pulls in `tracing-subscriber`).
#[cfg(feature = "cli")]
pub fn init_tracing(level: LogLevel) {
    use tracing_subscriber::fmt::format::FmtSpan;

    let default_filter = match level {
        LogLevel::Error => "payloadiff=error",
        LogLevel::Info => "payloadiff=info",
        LogLevel::Debug => "payloadiff=debug",
    };

    tracing_subscriber::fmt()
        .with_span_events(FmtSpan::CLOSE)
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .init();
}

// ─── Public API Facade ───

pub use application::compare::{CompareSettings, ComparisonService, DiffSource, Submitted};
pub use application::diff::TreeDiffer;
pub use application::monitoring::PerfReport;
pub use application::reconcile::{ReconcileOutcome, Reconciler, RejectedDecision};
pub use application::session::{
    Completion, ComparisonSession, DiffCounts, FailureKind, SessionState, VisibilityFilter,
};
pub use domain::changes::{ApplyReceipt, ChangeCard, ChangeList, DecisionBatch};
pub use domain::comparison::{ComparisonResult, ComparisonStatus};
pub use domain::decision::{Decision, DecisionAction, PendingDecisions, UiAction, UiDecision};
pub use domain::diff_item::{DiffItem, DiffKind, Severity};
pub use domain::error::{SessionError, StoreError, ValidationError};
pub use domain::fingerprint::fingerprint;
pub use domain::path::{
    get_at_path, remove_at_path, set_at_path, to_pointer_form, to_query_form, JsonPath, PathError,
};
pub use domain::ports::{Differ, PayloadStore};
pub use domain::value_objects::{CustomerId, Fingerprint, Operator};
pub use infrastructure::config::{AppConfig, CompareConfig, OutputConfig, StoreConfig};
pub use infrastructure::memory::MemoryPayloadStore;
pub use presentation::report::ComparisonReport;

use crate::application::monitoring::{MonitoringDiffer, MonitoringPayloadStore};
use crate::infrastructure::http::connect;

// ─── Public entry points ───

/// Diff two documents in memory, no store involved.
pub fn compare(template: &Value, customer_data: &Value) -> Vec<DiffItem> {
    TreeDiffer::new().diff(template, customer_data)
}

/// Fold `decisions` into `customer_data` without submitting anything.
pub fn reconcile(
    customer_data: &Value,
    template: &Value,
    decisions: impl IntoIterator<Item = UiDecision>,
) -> ReconcileOutcome {
    let mut pending = PendingDecisions::new();
    for d in decisions {
        pending.record(d);
    }
    Reconciler::new().reconcile(customer_data, template, &pending)
}

/// Service over the configured HTTP store, wrapped in the monitoring
/// decorators. All timings land in `report`.
pub fn build_service(
    cfg: &AppConfig,
    operator: &Operator,
    report: Arc<Mutex<PerfReport>>,
) -> Result<ComparisonService> {
    let store = Arc::new(connect(&cfg.store, operator)?);
    let store = Arc::new(MonitoringPayloadStore::new(store, Arc::clone(&report)));
    let differ = Arc::new(MonitoringDiffer::new(Arc::new(TreeDiffer::new()), report));
    Ok(ComparisonService::new(store, differ, cfg.compare_settings()))
}

/// Load and diff one customer.
pub async fn run_compare(
    cfg: &AppConfig,
    operator: &Operator,
    customer: CustomerId,
) -> Result<ComparisonReport> {
    let report = PerfReport::new();
    let service = build_service(cfg, operator, Arc::clone(&report))?;
    let out = compare_with(&service, operator, customer, cfg.compare.filter).await?;
    Ok(out.with_perf(PerfReport::snapshot(&report)))
}

/// Load one customer, record `decisions` and save them.
///
/// With `dry_run` the decisions are reconciled and reported but never
/// submitted.
pub async fn run_apply(
    cfg: &AppConfig,
    operator: &Operator,
    customer: CustomerId,
    decisions: Vec<UiDecision>,
    dry_run: bool,
) -> Result<ComparisonReport> {
    let report = PerfReport::new();
    let service = build_service(cfg, operator, Arc::clone(&report))?;
    let out = apply_with(
        &service,
        operator,
        customer,
        decisions,
        dry_run,
        cfg.compare.filter,
    )
    .await?;
    Ok(out.with_perf(PerfReport::snapshot(&report)))
}

/// [`run_compare`] against any service.
pub async fn compare_with(
    service: &ComparisonService,
    operator: &Operator,
    customer: CustomerId,
    filter: VisibilityFilter,
) -> Result<ComparisonReport> {
    let mut session = ComparisonSession::new(operator.clone());
    load_or_bail(&mut session, service, customer).await?;
    report_for(&session, filter)
}

/// [`run_apply`] against any service.
pub async fn apply_with(
    service: &ComparisonService,
    operator: &Operator,
    customer: CustomerId,
    decisions: Vec<UiDecision>,
    dry_run: bool,
    filter: VisibilityFilter,
) -> Result<ComparisonReport> {
    let mut session = ComparisonSession::new(operator.clone());
    load_or_bail(&mut session, service, customer).await?;
    for d in decisions {
        session.decide(d)?;
    }

    if dry_run {
        let (Some(c), Some(pending)) = (session.comparison(), session.pending()) else {
            bail!("session is {}, nothing to reconcile", session.state().name());
        };
        let outcome = Reconciler::new().reconcile(&c.customer_data, &c.template, pending);
        return Ok(report_for(&session, filter)?.with_outcome(outcome));
    }

    let ticket = session.begin_save()?;
    let outcome = ticket.outcome.clone();
    let result = service.submit(ticket.customer(), &ticket.batch).await;
    let _ = session.complete_save(ticket, result);
    match session.state() {
        SessionState::Error {
            failure,
            retained: Some(_),
            ..
        } => bail!("save failed: {failure}"),
        SessionState::Error { failure, .. } => bail!("{failure}"),
        _ => {}
    }
    Ok(report_for(&session, filter)?.with_outcome(outcome))
}

/// Overwrite a customer's saved payload and compare against the result.
pub async fn run_save_payload(
    cfg: &AppConfig,
    operator: &Operator,
    customer: CustomerId,
    payload: Value,
) -> Result<ComparisonReport> {
    let report = PerfReport::new();
    let service = build_service(cfg, operator, Arc::clone(&report))?;
    let out = save_payload_with(&service, operator, customer, &payload, cfg.compare.filter).await?;
    Ok(out.with_perf(PerfReport::snapshot(&report)))
}

/// [`run_save_payload`] against any service.
pub async fn save_payload_with(
    service: &ComparisonService,
    operator: &Operator,
    customer: CustomerId,
    payload: &Value,
    filter: VisibilityFilter,
) -> Result<ComparisonReport> {
    service.save_payload(&customer, payload).await?;
    compare_with(service, operator, customer, filter).await
}

/// One page of a customer's change history.
pub async fn run_history(
    cfg: &AppConfig,
    operator: &Operator,
    customer: &CustomerId,
    page: usize,
    page_size: usize,
) -> Result<ChangeList> {
    let service = build_service(cfg, operator, PerfReport::new())?;
    Ok(service.history(customer, page, page_size).await?)
}

// ─── Private helpers ───────────────────────────────────────────────────────────

fn report_for(session: &ComparisonSession, filter: VisibilityFilter) -> Result<ComparisonReport> {
    match ComparisonReport::from_session(session, filter) {
        Some(r) => Ok(r),
        None => bail!("session is {}, nothing to report", session.state().name()),
    }
}

async fn load_or_bail(
    session: &mut ComparisonSession,
    service: &ComparisonService,
    customer: CustomerId,
) -> Result<()> {
    let _ = session.load(service, customer).await;
    if let SessionState::Error { customer, failure, .. } = session.state() {
        let who = customer.as_ref().map(|c| c.as_str()).unwrap_or("?");
        bail!("loading {who} failed ({:?}): {failure}", failure.kind);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn compare_and_reconcile_in_memory() {
        let template = json!({"a": 1, "b": 2});
        let customer = json!({"a": 1, "b": 3, "c": 0});

        let diffs = compare(&template, &customer);
        assert_eq!(diffs.len(), 2);

        let outcome = reconcile(
            &customer,
            &template,
            diffs.iter().map(|d| Decision::apply_template(d.path.clone()).into()),
        );
        assert_eq!(outcome.document, template);
        assert!(compare(&template, &outcome.document).is_empty());
    }

    fn memory_service(store: &Arc<MemoryPayloadStore>) -> ComparisonService {
        ComparisonService::new(
            Arc::clone(store) as Arc<dyn PayloadStore>,
            Arc::new(TreeDiffer::new()),
            CompareSettings::default(),
        )
    }

    #[tokio::test]
    async fn apply_with_saves_and_reports_clean_comparison() {
        let store = Arc::new(MemoryPayloadStore::new());
        store.put_template("acme", json!({"a": 1}));
        store.put_saved_payload("acme", json!({"a": 2}));
        let service = memory_service(&store);
        let operator = Operator::new("ops");

        let report = apply_with(
            &service,
            &operator,
            CustomerId::from("acme"),
            vec![Decision::apply_template("/a").into()],
            false,
            VisibilityFilter::default(),
        )
        .await
        .unwrap();

        assert!(report.comparison.is_clean());
        assert_eq!(report.outcome.unwrap().submitted.len(), 1);
        assert!(report.receipt.is_some());
        assert_eq!(store.saved_payload("acme"), Some(json!({"a": 1})));
    }

    #[tokio::test]
    async fn dry_run_leaves_store_untouched() {
        let store = Arc::new(MemoryPayloadStore::new());
        store.put_template("acme", json!({"a": 1}));
        store.put_saved_payload("acme", json!({"a": 2}));
        let service = memory_service(&store);

        let report = apply_with(
            &service,
            &Operator::new("ops"),
            CustomerId::from("acme"),
            vec![Decision::apply_template("/a").into()],
            true,
            VisibilityFilter::default(),
        )
        .await
        .unwrap();

        assert_eq!(report.outcome.unwrap().document, json!({"a": 1}));
        assert_eq!(report.pending.len(), 1);
        assert_eq!(store.saved_payload("acme"), Some(json!({"a": 2})));
        assert_eq!(store.submitted_batches(), 0);
    }

    #[tokio::test]
    async fn compare_with_surfaces_load_failure() {
        let store = Arc::new(MemoryPayloadStore::new());
        let err = compare_with(
            &memory_service(&store),
            &Operator::new("ops"),
            CustomerId::from("acme"),
            VisibilityFilter::default(),
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("NotFound"), "got {err}");
    }

    #[tokio::test]
    async fn save_payload_with_reports_against_new_payload() {
        let store = Arc::new(MemoryPayloadStore::new());
        store.put_template("acme", json!({"a": 1, "b": 2}));
        store.put_saved_payload("acme", json!({"a": 5}));

        let report = save_payload_with(
            &memory_service(&store),
            &Operator::new("ops"),
            CustomerId::from("acme"),
            &json!({"a": 1}),
            VisibilityFilter::default(),
        )
        .await
        .unwrap();

        assert_eq!(report.comparison.customer_data, json!({"a": 1}));
        assert_eq!(report.counts.raw, 1);
        assert_eq!(store.saved_payload("acme"), Some(json!({"a": 1})));
    }
}
