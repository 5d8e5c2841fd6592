use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::application::monitoring::PerfReport;
use crate::application::reconcile::ReconcileOutcome;
use crate::application::session::{ComparisonSession, DiffCounts, VisibilityFilter};
use crate::domain::{
    changes::ApplyReceipt,
    comparison::ComparisonResult,
    decision::{Decision, PendingDecisions},
};

/// What the writers render: one comparison, the decisions taken against it
/// and, after a save, the outcome.
#[derive(Debug, Clone, Serialize)]
pub struct ComparisonReport {
    pub generated_at: DateTime<Utc>,
    pub operator: String,
    pub filter: VisibilityFilter,
    pub counts: DiffCounts,
    pub comparison: ComparisonResult,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub pending: Vec<Decision>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<ReconcileOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receipt: Option<ApplyReceipt>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub perf: Option<PerfReport>,
}

impl ComparisonReport {
    pub fn new(operator: impl Into<String>, comparison: ComparisonResult, counts: DiffCounts) -> Self {
        Self {
            generated_at: Utc::now(),
            operator: operator.into(),
            filter: VisibilityFilter::default(),
            counts,
            comparison,
            pending: Vec::new(),
            outcome: None,
            receipt: None,
            perf: None,
        }
    }

    /// Snapshot of whatever comparison the session currently shows.
    pub fn from_session(session: &ComparisonSession, filter: VisibilityFilter) -> Option<Self> {
        let comparison = session.comparison()?.clone();
        let mut report = Self::new(session.operator().name.clone(), comparison, session.counts(filter));
        report.filter = filter;
        report.receipt = session.last_receipt().cloned();
        if let Some(pending) = session.pending() {
            report = report.with_pending(pending);
        }
        Some(report)
    }

    pub fn with_pending(mut self, pending: &PendingDecisions) -> Self {
        self.pending = pending.iter().cloned().collect();
        self
    }

    pub fn with_outcome(mut self, outcome: ReconcileOutcome) -> Self {
        self.outcome = Some(outcome);
        self
    }

    pub fn with_perf(mut self, perf: PerfReport) -> Self {
        self.perf = Some(perf);
        self
    }

    /// `<customer>_<timestamp>`, used for output file names.
    pub fn file_stem(&self) -> String {
        format!(
            "{}_{}",
            self.comparison.customer_id,
            self.generated_at.format("%Y%m%d_%H%M%S")
        )
    }
}
