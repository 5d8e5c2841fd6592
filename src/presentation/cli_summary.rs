use crate::application::monitoring::PerfReport;
use crate::application::reconcile::ReconcileOutcome;
use crate::application::session::DiffCounts;
use crate::domain::changes::{ChangeList, ChangeSetStatus};
use crate::domain::comparison::{ComparisonResult, TemplateSource};
use crate::domain::decision::PendingDecisions;
use crate::domain::diff_item::{DiffItem, Severity};
use colored::*;
use serde_json::Value;
use tabled::settings::{object::Columns, Alignment, Modify, Style};
use tabled::{Table, Tabled};

#[derive(Tabled)]
struct DiffRow {
    path: String,
    kind: String,
    expected: String,
    actual: String,
    decision: String,
}

#[derive(Tabled)]
struct SummaryRow {
    metric: String,
    value: String,
}

/// Print the diffs of a comparison, with pending decisions if any.
pub fn print_comparison(
    comparison: &ComparisonResult,
    diffs: &[&DiffItem],
    counts: &DiffCounts,
    pending: Option<&PendingDecisions>,
) {
    println!();
    println!("{}", "PAYLOADIFF COMPARISON".bold().cyan());
    let template = match &comparison.template_source {
        TemplateSource::Customer => "customer template".to_string(),
        TemplateSource::Default(id) => format!("default template '{id}'"),
    };
    println!("{} vs {}", comparison.customer_id.as_str().bold(), template.blue());
    if comparison.no_saved_payload() {
        println!("{}", "No saved payload, comparing against an empty object.".yellow());
    }
    println!();

    if comparison.is_clean() {
        println!("{}", "✓ Payload matches the template.".bold().green());
        return;
    }

    let rows: Vec<DiffRow> = diffs
        .iter()
        .map(|d| DiffRow {
            path: d.path.to_string().bold().to_string(),
            kind: colour_kind(d),
            expected: short(d.expected.as_ref()).dimmed().to_string(),
            actual: short(d.actual.as_ref()).cyan().to_string(),
            decision: pending
                .and_then(|p| p.get(&d.path))
                .map(|p| p.action.as_str().green().to_string())
                .unwrap_or_default(),
        })
        .collect();

    let table = Table::new(rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(0..=0)).with(Alignment::left()))
        .to_string();
    println!("{table}");

    let summary_rows = vec![
        SummaryRow {
            metric: "Diffs".into(),
            value: counts.raw.to_string().bold().to_string(),
        },
        SummaryRow {
            metric: "Visible".into(),
            value: counts.visible.to_string(),
        },
        SummaryRow {
            metric: "Outstanding".into(),
            value: counts.outstanding.to_string().yellow().to_string(),
        },
    ];
    let summary_table = Table::new(summary_rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(1..=1)).with(Alignment::right()))
        .to_string();

    println!();
    println!("{summary_table}");
    println!();
}

// ─── Outcome ─────────────────────────────────────────────────────────────────

/// Print what a reconciliation did. Returns `true` when decisions were
/// rejected, so the caller can exit non-zero.
pub fn print_outcome(outcome: &ReconcileOutcome) -> bool {
    println!(
        "{} submitted  ·  {} kept  ·  {} rejected",
        outcome.submitted.len().to_string().green().bold(),
        outcome.resolved_locally.len().to_string().bold(),
        outcome.rejected.len().to_string().red().bold(),
    );
    if !outcome.document_changed() {
        println!("{}", "Document unchanged.".italic());
    }
    for r in &outcome.rejected {
        println!("  {} {}: {}", "✗".red(), r.decision.path.to_string().bold(), r.reason);
    }
    !outcome.rejected.is_empty()
}

// ─── History ─────────────────────────────────────────────────────────────────

#[derive(Tabled)]
struct ChangeRow {
    id: String,
    status: String,
    created: String,
    applied: String,
    decisions: String,
}

pub fn print_history(list: &ChangeList) {
    if list.items.is_empty() {
        println!("{}", "No changes recorded.".italic());
        return;
    }

    let rows: Vec<ChangeRow> = list
        .items
        .iter()
        .map(|c| ChangeRow {
            id: c.id.dimmed().to_string(),
            status: match c.status {
                ChangeSetStatus::Applied => "applied".green().to_string(),
                ChangeSetStatus::Pending => "pending".yellow().to_string(),
                ChangeSetStatus::Failed => "failed".red().to_string(),
            },
            created: c.created_utc.format("%Y-%m-%d %H:%M").to_string(),
            applied: c
                .applied_utc
                .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_default(),
            decisions: c.decision_count.to_string(),
        })
        .collect();

    let table = Table::new(rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(4..=4)).with(Alignment::right()))
        .to_string();
    println!("{table}");
    println!("  {} of {} change(s)", list.items.len(), list.total.to_string().bold());
}

// ─── Performance summary ──────────────────────────────────────────────────────

#[derive(Tabled)]
struct PerfRow {
    operation: String,
    target: String,
    items: String,
    #[tabled(rename = "time (ms)")]
    duration_ms: String,
}

/// Print a performance timing table to stdout.
pub fn print_perf_summary(report: &PerfReport) {
    if report.timings.is_empty() {
        return;
    }

    println!("{}", "PERFORMANCE".bold().cyan());

    let rows: Vec<PerfRow> = report
        .timings
        .iter()
        .map(|t| PerfRow {
            operation: if t.ok {
                t.operation.dimmed().to_string()
            } else {
                t.operation.red().to_string()
            },
            target: t.target.bold().to_string(),
            items: t.items.to_string(),
            duration_ms: format_duration(t.duration_ms),
        })
        .collect();

    let table = Table::new(rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(2..=3)).with(Alignment::right()))
        .to_string();

    println!("{table}");

    println!(
        "  Total: {} store call(s)  ·  {} diff(s)  ·  {} ms elapsed",
        report.store_calls.to_string().bold(),
        report.total_diffs.to_string().bold(),
        format_duration(report.total_ms),
    );
    println!();
}

fn colour_kind(d: &DiffItem) -> String {
    let kind = d.kind.as_str();
    match d.severity {
        Some(Severity::Error) => kind.red().to_string(),
        Some(Severity::Warn) => kind.yellow().to_string(),
        _ => kind.to_string(),
    }
}

fn short(value: Option<&Value>) -> String {
    match value {
        None => "–".to_string(),
        Some(v) => {
            let text = v.to_string();
            if text.chars().count() > 40 {
                text.chars().take(40).collect::<String>() + "…"
            } else {
                text
            }
        }
    }
}

fn format_duration(ms: u128) -> String {
    if ms >= 1_000 {
        format!("{:.1}s", ms as f64 / 1_000.0).yellow().to_string()
    } else if ms >= 100 {
        ms.to_string().yellow().to_string()
    } else {
        ms.to_string().green().to_string()
    }
}
