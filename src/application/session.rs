use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info, warn};

use crate::application::compare::{ComparisonService, Submitted};
use crate::application::reconcile::{ReconcileOutcome, Reconciler};
use crate::domain::{
    changes::{ApplyReceipt, DecisionBatch},
    comparison::ComparisonResult,
    decision::{Decision, PendingDecisions, UiDecision},
    diff_item::DiffItem,
    error::{SessionError, StoreError},
    value_objects::{CustomerId, Operator},
};

// ─── Failure reporting ───────────────────────────────────────────────────────

/// Coarse failure class shown to the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Nothing to compare against, even after fallbacks.
    NotFound,
    /// Store unreachable, non-success status, or unreadable response.
    Transport,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl From<&StoreError> for SessionFailure {
    fn from(e: &StoreError) -> Self {
        let kind = match e {
            StoreError::NotFound { .. } => FailureKind::NotFound,
            StoreError::Transport { .. } | StoreError::Decode { .. } => FailureKind::Transport,
        };
        Self {
            kind,
            message: e.to_string(),
        }
    }
}

impl fmt::Display for SessionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

// ─── State ───────────────────────────────────────────────────────────────────

/// A loaded comparison together with the operator's pending decisions.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadyState {
    pub comparison: ComparisonResult,
    pub pending: PendingDecisions,
}

impl ReadyState {
    fn fresh(comparison: ComparisonResult) -> Self {
        Self {
            comparison,
            pending: PendingDecisions::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    Empty,
    Loading {
        customer: CustomerId,
    },
    Ready(ReadyState),
    /// A save is in flight; the comparison it started from stays visible.
    Saving(ReadyState),
    /// `retained` is only set after a failed save, so the operator can retry
    /// without redoing their selections. Load failures never retain state.
    Error {
        customer: Option<CustomerId>,
        failure: SessionFailure,
        retained: Option<ReadyState>,
    },
}

impl SessionState {
    pub fn name(&self) -> &'static str {
        match self {
            SessionState::Empty => "empty",
            SessionState::Loading { .. } => "loading",
            SessionState::Ready(_) => "ready",
            SessionState::Saving(_) => "saving",
            SessionState::Error { .. } => "error",
        }
    }
}

/// Outcome of feeding a response back into the session.
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    Applied,
    /// The response belonged to an abandoned request and was discarded.
    Stale,
}

/// Proof that a load was requested; hand it back with the response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadTicket {
    generation: u64,
    customer: CustomerId,
}

impl LoadTicket {
    pub fn customer(&self) -> &CustomerId {
        &self.customer
    }
}

/// A prepared save: the reconciled document and the batch to submit.
#[derive(Debug, Clone)]
pub struct SaveTicket {
    generation: u64,
    customer: CustomerId,
    pub outcome: ReconcileOutcome,
    pub batch: DecisionBatch,
}

impl SaveTicket {
    pub fn customer(&self) -> &CustomerId {
        &self.customer
    }
}

/// Which diffs count as visible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VisibilityFilter {
    /// Hide diffs describing whole arrays or objects.
    LeavesOnly,
    #[default]
    IncludeContainers,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct DiffCounts {
    /// Every diff of the current comparison.
    pub raw: usize,
    /// Diffs passing the filter.
    pub visible: usize,
    /// Visible diffs without a pending decision. `keepCustomer` counts as a
    /// decision here.
    pub outstanding: usize,
}

// ─── ComparisonSession ───────────────────────────────────────────────────────

/// Owns the comparison for the customer being edited and the pending
/// decisions against it.
///
/// I/O is split into request and completion halves: `select_customer` and
/// `begin_save` hand out tickets, `complete_load` and `complete_save` take
/// them back with the store's response. Every new request bumps a
/// generation counter, so a response whose ticket is no longer current is
/// discarded instead of overwriting newer state.
pub struct ComparisonSession {
    operator: Operator,
    state: SessionState,
    generation: u64,
    reconciler: Reconciler,
    last_receipt: Option<ApplyReceipt>,
}

impl ComparisonSession {
    pub fn new(operator: Operator) -> Self {
        Self {
            operator,
            state: SessionState::Empty,
            generation: 0,
            reconciler: Reconciler::new(),
            last_receipt: None,
        }
    }

    pub fn operator(&self) -> &Operator {
        &self.operator
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Customer currently selected, in any state but `Empty`.
    pub fn customer(&self) -> Option<&CustomerId> {
        match &self.state {
            SessionState::Empty => None,
            SessionState::Loading { customer } => Some(customer),
            SessionState::Ready(r) | SessionState::Saving(r) => Some(&r.comparison.customer_id),
            SessionState::Error { customer, .. } => customer.as_ref(),
        }
    }

    fn ready(&self) -> Option<&ReadyState> {
        match &self.state {
            SessionState::Ready(r) | SessionState::Saving(r) => Some(r),
            SessionState::Error {
                retained: Some(r), ..
            } => Some(r),
            _ => None,
        }
    }

    pub fn comparison(&self) -> Option<&ComparisonResult> {
        self.ready().map(|r| &r.comparison)
    }

    pub fn pending(&self) -> Option<&PendingDecisions> {
        self.ready().map(|r| &r.pending)
    }

    pub fn last_receipt(&self) -> Option<&ApplyReceipt> {
        self.last_receipt.as_ref()
    }

    // ── loading ──

    /// Start loading `customer`. Drops the current comparison and pending
    /// decisions immediately and invalidates any request still in flight.
    pub fn select_customer(&mut self, customer: CustomerId) -> LoadTicket {
        self.generation += 1;
        debug!(
            operator = %self.operator.name,
            customer = %customer,
            generation = self.generation,
            "selecting customer"
        );
        self.state = SessionState::Loading {
            customer: customer.clone(),
        };
        LoadTicket {
            generation: self.generation,
            customer,
        }
    }

    pub fn complete_load(
        &mut self,
        ticket: LoadTicket,
        result: Result<ComparisonResult, StoreError>,
    ) -> Completion {
        let current = matches!(
            &self.state,
            SessionState::Loading { customer } if *customer == ticket.customer
        );
        if !current || ticket.generation != self.generation {
            let stale = SessionError::StaleResponse {
                customer: ticket.customer.to_string(),
            };
            debug!(reason = %stale, generation = ticket.generation, "discarding load response");
            return Completion::Stale;
        }

        self.state = match result {
            Ok(comparison) => {
                info!(
                    customer = %ticket.customer,
                    diffs = comparison.diffs.len(),
                    no_saved_payload = comparison.no_saved_payload(),
                    "comparison ready"
                );
                SessionState::Ready(ReadyState::fresh(comparison))
            }
            Err(e) => {
                warn!(customer = %ticket.customer, error = %e, "load failed");
                SessionState::Error {
                    customer: Some(ticket.customer),
                    failure: SessionFailure::from(&e),
                    retained: None,
                }
            }
        };
        Completion::Applied
    }

    // ── deciding ──

    /// Record operator intent for one path. Last write wins; undo clears.
    pub fn decide(&mut self, decision: UiDecision) -> Result<(), SessionError> {
        match &mut self.state {
            SessionState::Ready(r) => {
                debug!(path = %decision.path, "decision recorded");
                r.pending.record(decision);
                Ok(())
            }
            other => Err(SessionError::NotReady { state: other.name() }),
        }
    }

    /// Replace all pending decisions with `applyTemplate` for every diff.
    /// Returns the number of decisions recorded.
    pub fn apply_all_template(&mut self) -> Result<usize, SessionError> {
        match &mut self.state {
            SessionState::Ready(r) => {
                r.pending = r
                    .comparison
                    .diffs
                    .iter()
                    .map(|d| Decision::apply_template(d.path.clone()))
                    .collect();
                Ok(r.pending.len())
            }
            other => Err(SessionError::NotReady { state: other.name() }),
        }
    }

    // ── saving ──

    /// Reconcile the pending decisions and enter `Saving`.
    ///
    /// Allowed from `Ready`, and from `Error` after a failed save (retry).
    pub fn begin_save(&mut self) -> Result<SaveTicket, SessionError> {
        let ready = match std::mem::replace(&mut self.state, SessionState::Empty) {
            SessionState::Ready(r) => r,
            SessionState::Error {
                retained: Some(r), ..
            } => r,
            other => {
                let state = other.name();
                self.state = other;
                return Err(SessionError::NotReady { state });
            }
        };

        let outcome = self.reconciler.reconcile(
            &ready.comparison.customer_data,
            &ready.comparison.template,
            &ready.pending,
        );
        if outcome.submitted.is_empty() {
            self.state = SessionState::Ready(ready);
            return Err(SessionError::NothingToSave);
        }

        self.generation += 1;
        let customer = ready.comparison.customer_id.clone();
        let batch = DecisionBatch::new(outcome.submitted.iter(), outcome.document.clone());
        info!(
            operator = %self.operator.name,
            customer = %customer,
            batch = %batch.batch_id,
            decisions = batch.decisions.len(),
            rejected = outcome.rejected.len(),
            "saving decisions"
        );
        self.state = SessionState::Saving(ready);

        Ok(SaveTicket {
            generation: self.generation,
            customer,
            outcome,
            batch,
        })
    }

    /// Feed the submit result back.
    ///
    /// A rejected submit keeps the Ready state for a retry. A batch the
    /// store accepted is never retried: if only the reload failed, the
    /// pending decisions are dropped and the session needs a fresh load.
    pub fn complete_save(
        &mut self,
        ticket: SaveTicket,
        result: Result<Submitted, StoreError>,
    ) -> Completion {
        if ticket.generation != self.generation || !matches!(self.state, SessionState::Saving(_)) {
            debug!(customer = %ticket.customer, "discarding save response");
            return Completion::Stale;
        }
        let SessionState::Saving(ready) = std::mem::replace(&mut self.state, SessionState::Empty)
        else {
            return Completion::Stale;
        };

        self.state = match result {
            Ok(Submitted { receipt, reloaded }) => {
                let change_set = receipt.change_set_id.clone();
                self.last_receipt = Some(receipt);
                match reloaded {
                    Ok(fresh) => {
                        info!(
                            customer = %ticket.customer,
                            change_set = %change_set,
                            remaining = fresh.diffs.len(),
                            "save applied"
                        );
                        SessionState::Ready(ReadyState::fresh(fresh))
                    }
                    Err(e) => {
                        warn!(
                            customer = %ticket.customer,
                            change_set = %change_set,
                            error = %e,
                            "saved, but reload failed"
                        );
                        let mut failure = SessionFailure::from(&e);
                        failure.message = format!("change set {change_set} saved, reload failed: {e}");
                        SessionState::Error {
                            customer: Some(ticket.customer),
                            failure,
                            retained: None,
                        }
                    }
                }
            }
            Err(e) => {
                warn!(customer = %ticket.customer, error = %e, "save failed, keeping decisions");
                SessionState::Error {
                    customer: Some(ticket.customer),
                    failure: SessionFailure::from(&e),
                    retained: Some(ready),
                }
            }
        };
        Completion::Applied
    }

    /// Forget everything; responses still in flight will be discarded.
    pub fn reset(&mut self) {
        self.generation += 1;
        self.state = SessionState::Empty;
    }

    // ── counts ──

    pub fn visible_diffs(&self, filter: VisibilityFilter) -> Vec<&DiffItem> {
        let Some(comparison) = self.comparison() else {
            return Vec::new();
        };
        comparison
            .diffs
            .iter()
            .filter(|d| match filter {
                VisibilityFilter::IncludeContainers => true,
                VisibilityFilter::LeavesOnly => !d.is_container(),
            })
            .collect()
    }

    pub fn counts(&self, filter: VisibilityFilter) -> DiffCounts {
        let (Some(comparison), Some(pending)) = (self.comparison(), self.pending()) else {
            return DiffCounts::default();
        };
        let visible = self.visible_diffs(filter);
        DiffCounts {
            raw: comparison.diffs.len(),
            visible: visible.len(),
            outstanding: visible.iter().filter(|d| !pending.contains(&d.path)).count(),
        }
    }

    // ── drivers ──

    /// Select `customer` and load it through `service`.
    pub async fn load(&mut self, service: &ComparisonService, customer: CustomerId) -> Completion {
        let ticket = self.select_customer(customer);
        let result = service.load(ticket.customer()).await;
        self.complete_load(ticket, result)
    }

    /// Reconcile, submit and reload through `service`.
    pub async fn save(&mut self, service: &ComparisonService) -> Result<Completion, SessionError> {
        let ticket = self.begin_save()?;
        let result = service.submit(ticket.customer(), &ticket.batch).await;
        Ok(self.complete_save(ticket, result))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::compare::CompareSettings;
    use crate::application::diff::TreeDiffer;
    use crate::domain::decision::DecisionAction;
    use crate::domain::path::JsonPath;
    use crate::infrastructure::memory::MemoryPayloadStore;
    use serde_json::{json, Value};
    use std::sync::Arc;

    fn store() -> Arc<MemoryPayloadStore> {
        let store = Arc::new(MemoryPayloadStore::new());
        store.put_template("acme", json!({"a": 1, "b": {"c": 2}, "tags": ["x", "y", "z"]}));
        store.put_saved_payload("acme", json!({"a": "1", "b": {"c": 2, "d": 9}, "tags": ["x", "y"]}));
        store.put_template("globex", json!({"name": "globex"}));
        store.put_saved_payload("globex", json!({"name": "globex"}));
        store
    }

    fn service(store: &Arc<MemoryPayloadStore>) -> ComparisonService {
        ComparisonService::new(
            Arc::clone(store) as Arc<_>,
            Arc::new(TreeDiffer::new()),
            CompareSettings::default(),
        )
    }

    fn comparison(customer: &str, template: Value, data: Value) -> ComparisonResult {
        let diffs = crate::domain::ports::Differ::diff(&TreeDiffer::new(), &template, &data);
        ComparisonResult::new(CustomerId::from(customer), template, data, diffs)
    }

    fn path(p: &str) -> JsonPath {
        JsonPath::from_pointer(p)
    }

    #[test]
    fn select_clears_previous_state() {
        let mut session = ComparisonSession::new(Operator::new("ops"));
        let t = session.select_customer(CustomerId::from("acme"));
        let _ = session.complete_load(t, Ok(comparison("acme", json!({"a": 1}), json!({}))));
        session.decide(Decision::apply_template("/a").into()).unwrap();

        session.select_customer(CustomerId::from("globex"));
        assert_eq!(session.state().name(), "loading");
        assert!(session.comparison().is_none());
        assert!(session.pending().is_none());
    }

    #[test]
    fn late_response_for_abandoned_customer_is_discarded() {
        let mut session = ComparisonSession::new(Operator::new("ops"));
        let ticket_a = session.select_customer(CustomerId::from("acme"));
        let ticket_b = session.select_customer(CustomerId::from("globex"));

        let late = session.complete_load(ticket_a, Ok(comparison("acme", json!({"a": 1}), json!({}))));
        assert_eq!(late, Completion::Stale);
        assert_eq!(
            session.state(),
            &SessionState::Loading {
                customer: CustomerId::from("globex")
            }
        );

        let done = session.complete_load(ticket_b, Ok(comparison("globex", json!({}), json!({}))));
        assert_eq!(done, Completion::Applied);
        assert_eq!(session.customer(), Some(&CustomerId::from("globex")));
    }

    #[test]
    fn reselecting_same_customer_invalidates_older_ticket() {
        let mut session = ComparisonSession::new(Operator::new("ops"));
        let first = session.select_customer(CustomerId::from("acme"));
        let _second = session.select_customer(CustomerId::from("acme"));
        let c = session.complete_load(first, Ok(comparison("acme", json!({}), json!({}))));
        assert_eq!(c, Completion::Stale);
    }

    #[test]
    fn decisions_while_loading_are_refused() {
        let mut session = ComparisonSession::new(Operator::new("ops"));
        session.select_customer(CustomerId::from("acme"));
        let err = session.decide(Decision::apply_template("/a").into()).unwrap_err();
        assert_eq!(err, SessionError::NotReady { state: "loading" });
    }

    #[test]
    fn load_failure_reports_kind_and_drops_state() {
        let mut session = ComparisonSession::new(Operator::new("ops"));
        let t = session.select_customer(CustomerId::from("acme"));
        let _ = session.complete_load(t, Err(StoreError::transport("502 bad gateway")));

        match session.state() {
            SessionState::Error {
                failure, retained, ..
            } => {
                assert_eq!(failure.kind, FailureKind::Transport);
                assert!(retained.is_none());
            }
            other => panic!("unexpected state {other:?}"),
        }
    }

    #[test]
    fn precedence_and_undo() {
        let mut session = ComparisonSession::new(Operator::new("ops"));
        let t = session.select_customer(CustomerId::from("acme"));
        let _ = session.complete_load(t, Ok(comparison("acme", json!({"a": 1, "b": 2}), json!({"a": 2, "b": 3}))));

        session.decide(Decision::apply_template("/a").into()).unwrap();
        session.decide(Decision::keep_customer("/a").into()).unwrap();
        let pending = session.pending().unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending.get(&path("/a")).unwrap().action, DecisionAction::KeepCustomer);

        session.decide(Decision::apply_template("/b").into()).unwrap();
        session.decide(UiDecision::undo("/b")).unwrap();
        assert!(!session.pending().unwrap().contains(&path("/b")));

        // only keepCustomer left: nothing reaches the store
        assert_eq!(session.begin_save().unwrap_err(), SessionError::NothingToSave);
        assert_eq!(session.state().name(), "ready");
    }

    #[test]
    fn counts_exclude_resolved_and_filter_containers() {
        let mut session = ComparisonSession::new(Operator::new("ops"));
        let t = session.select_customer(CustomerId::from("acme"));
        let _ = session.complete_load(
            t,
            Ok(comparison(
                "acme",
                json!({"a": 1, "tags": ["x", "y", "z"], "o": {"k": 1}}),
                json!({"a": 2, "tags": ["x", "q"]}),
            )),
        );
        // /a value, /tags length, /tags/1 value, /o missing(object)
        let all = session.counts(VisibilityFilter::IncludeContainers);
        assert_eq!(all, DiffCounts { raw: 4, visible: 4, outstanding: 4 });

        let leaves = session.counts(VisibilityFilter::LeavesOnly);
        assert_eq!(leaves.visible, 2);

        session.decide(Decision::keep_customer("/a").into()).unwrap();
        let after = session.counts(VisibilityFilter::LeavesOnly);
        assert_eq!(after, DiffCounts { raw: 4, visible: 2, outstanding: 1 });
    }

    #[test]
    fn apply_all_template_replaces_pending() {
        let mut session = ComparisonSession::new(Operator::new("ops"));
        let t = session.select_customer(CustomerId::from("acme"));
        let _ = session.complete_load(t, Ok(comparison("acme", json!({"a": 1, "b": 1}), json!({"a": 2}))));
        session.decide(Decision::keep_customer("/a").into()).unwrap();

        assert_eq!(session.apply_all_template().unwrap(), 2);
        let pending = session.pending().unwrap();
        assert!(pending.iter().all(|d| d.action == DecisionAction::ApplyTemplate));
    }

    #[tokio::test]
    async fn save_submits_reconciled_document_and_reloads() {
        let store = store();
        let svc = service(&store);
        let mut session = ComparisonSession::new(Operator::new("ops"));

        assert_eq!(session.load(&svc, CustomerId::from("acme")).await, Completion::Applied);
        assert_eq!(session.counts(VisibilityFilter::IncludeContainers).raw, 3);

        session.apply_all_template().unwrap();
        assert_eq!(session.save(&svc).await.unwrap(), Completion::Applied);

        assert_eq!(
            store.saved_payload("acme"),
            Some(json!({"a": 1, "b": {"c": 2}, "tags": ["x", "y", "z"]}))
        );
        let comparison = session.comparison().unwrap();
        assert!(comparison.is_clean());
        assert!(session.pending().unwrap().is_empty());
        assert!(session.last_receipt().is_some());
    }

    #[tokio::test]
    async fn failed_save_keeps_decisions_for_retry() {
        let store = store();
        let svc = service(&store);
        let mut session = ComparisonSession::new(Operator::new("ops"));
        let _ = session.load(&svc, CustomerId::from("acme")).await;
        session.decide(Decision::apply_template("/a").into()).unwrap();

        store.fail_next(StoreError::transport("503"));
        assert_eq!(session.save(&svc).await.unwrap(), Completion::Applied);
        match session.state() {
            SessionState::Error {
                failure, retained, ..
            } => {
                assert_eq!(failure.kind, FailureKind::Transport);
                assert!(retained.as_ref().unwrap().pending.contains(&path("/a")));
            }
            other => panic!("unexpected state {other:?}"),
        }
        assert_eq!(store.submitted_batches(), 0);

        assert_eq!(session.save(&svc).await.unwrap(), Completion::Applied);
        assert_eq!(session.state().name(), "ready");
        assert_eq!(store.submitted_batches(), 1);
    }

    #[tokio::test]
    async fn accepted_batch_is_not_resubmitted_when_reload_fails() {
        let store = store();
        let svc = service(&store);
        let mut session = ComparisonSession::new(Operator::new("ops"));
        let _ = session.load(&svc, CustomerId::from("acme")).await;
        session.decide(Decision::remove("/tags/1").into()).unwrap();

        // submit goes through, the template fetch of the reload fails
        store.fail_after(1, StoreError::transport("502"));
        assert_eq!(session.save(&svc).await.unwrap(), Completion::Applied);

        match session.state() {
            SessionState::Error {
                failure, retained, ..
            } => {
                assert_eq!(failure.kind, FailureKind::Transport);
                assert!(failure.message.contains("saved"), "{failure}");
                assert!(retained.is_none());
            }
            other => panic!("unexpected state {other:?}"),
        }
        assert!(session.last_receipt().is_some());
        assert_eq!(store.submitted_batches(), 1);

        assert_eq!(
            session.save(&svc).await.unwrap_err(),
            SessionError::NotReady { state: "error" }
        );
        assert_eq!(store.submitted_batches(), 1);

        let _ = session.load(&svc, CustomerId::from("acme")).await;
        assert_eq!(session.comparison().unwrap().customer_data["tags"], json!(["x"]));
    }

    #[tokio::test]
    async fn submitted_batch_never_contains_undo_or_keep() {
        let store = store();
        let svc = service(&store);
        let mut session = ComparisonSession::new(Operator::new("ops"));
        let _ = session.load(&svc, CustomerId::from("acme")).await;

        session.decide(Decision::apply_template("/a").into()).unwrap();
        session.decide(Decision::keep_customer("/b/d").into()).unwrap();
        session.decide(Decision::apply_template("/tags").into()).unwrap();
        session.decide(UiDecision::undo("/tags")).unwrap();

        let ticket = session.begin_save().unwrap();
        let paths: Vec<_> = ticket.batch.decisions.iter().map(|d| d.path.as_str()).collect();
        assert_eq!(paths, ["$.a"]);
        assert_eq!(session.state().name(), "saving");
    }

    #[tokio::test]
    async fn save_response_after_customer_switch_is_stale() {
        let store = store();
        let svc = service(&store);
        let mut session = ComparisonSession::new(Operator::new("ops"));
        let _ = session.load(&svc, CustomerId::from("acme")).await;
        session.decide(Decision::apply_template("/a").into()).unwrap();

        let ticket = session.begin_save().unwrap();
        let result = svc.submit(ticket.customer(), &ticket.batch).await;
        let _ = session.load(&svc, CustomerId::from("globex")).await;

        assert_eq!(session.complete_save(ticket, result), Completion::Stale);
        assert_eq!(session.customer(), Some(&CustomerId::from("globex")));
        assert!(session.comparison().unwrap().is_clean());
    }

    #[tokio::test]
    async fn template_only_customer_is_ready_not_error() {
        let store = Arc::new(MemoryPayloadStore::new());
        store.put_template("default", json!({"a": 1}));
        let svc = service(&store);
        let mut session = ComparisonSession::new(Operator::new("ops"));

        let _ = session.load(&svc, CustomerId::from("newco")).await;
        let comparison = session.comparison().unwrap();
        assert!(comparison.no_saved_payload());
        assert_eq!(session.state().name(), "ready");
    }

    #[test]
    fn reset_discards_in_flight_load() {
        let mut session = ComparisonSession::new(Operator::new("ops"));
        let t = session.select_customer(CustomerId::from("acme"));
        session.reset();
        assert_eq!(
            session.complete_load(t, Ok(comparison("acme", json!({}), json!({})))),
            Completion::Stale
        );
        assert_eq!(session.state(), &SessionState::Empty);
    }
}
