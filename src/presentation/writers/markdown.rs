use anyhow::Result;
use serde_json::Value;
use std::fmt::Write as FmtWrite;

use crate::domain::{comparison::TemplateSource, ports::OutputWriter};
use crate::presentation::report::ComparisonReport;

/// Longest rendered value before it is cut with an ellipsis.
const MAX_CELL: usize = 60;

pub struct MarkdownWriter;

impl OutputWriter for MarkdownWriter {
    fn format(&self, report: &ComparisonReport) -> Result<String> {
        let c = &report.comparison;
        let mut s = String::new();

        writeln!(s, "# Comparison: {}", c.customer_id)?;
        writeln!(s)?;
        writeln!(s, "- Generated: {} by {}", report.generated_at.to_rfc3339(), report.operator)?;
        let template = match &c.template_source {
            TemplateSource::Customer => "customer".to_string(),
            TemplateSource::Default(id) => format!("default (`{id}`)"),
        };
        writeln!(s, "- Template: {template}")?;
        if c.no_saved_payload() {
            writeln!(s, "- Payload: none stored, compared against an empty object")?;
        }
        writeln!(s, "- Fingerprint: `{}`", c.fingerprint)?;
        writeln!(
            s,
            "- Diffs: {} raw, {} visible, {} outstanding",
            report.counts.raw, report.counts.visible, report.counts.outstanding
        )?;
        writeln!(s)?;

        if c.diffs.is_empty() {
            writeln!(s, "_No differences._")?;
            return Ok(s);
        }

        writeln!(s, "| Path | Kind | Expected | Actual | Decision | Suggestion |")?;
        writeln!(s, "|---|---|---|---|---|---|")?;
        for d in &c.diffs {
            let decision = report
                .pending
                .iter()
                .find(|p| p.path == d.path)
                .map(|p| p.action.as_str())
                .unwrap_or("");
            writeln!(
                s,
                "| `{}` | {} | {} | {} | {} | {} |",
                d.path,
                d.kind,
                cell(d.expected.as_ref()),
                cell(d.actual.as_ref()),
                decision,
                d.suggestion.as_deref().unwrap_or(""),
            )?;
        }

        if let Some(outcome) = &report.outcome {
            writeln!(s)?;
            writeln!(s, "## Outcome")?;
            writeln!(s)?;
            writeln!(s, "- Submitted: {}", outcome.submitted.len())?;
            writeln!(s, "- Kept as customer: {}", outcome.resolved_locally.len())?;
            for r in &outcome.rejected {
                writeln!(s, "- Rejected `{}`: {}", r.decision.path, r.reason)?;
            }
        }
        if let Some(receipt) = &report.receipt {
            writeln!(s, "- Change set: `{}` ({:?})", receipt.change_set_id, receipt.status)?;
        }

        Ok(s)
    }

    fn extension(&self) -> &'static str {
        "md"
    }
}

fn cell(value: Option<&Value>) -> String {
    let Some(v) = value else {
        return "–".to_string();
    };
    let mut text = v.to_string().replace('|', "\\|");
    if text.chars().count() > MAX_CELL {
        text = text.chars().take(MAX_CELL).collect::<String>() + "…";
    }
    format!("`{text}`")
}
