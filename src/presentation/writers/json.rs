use anyhow::Result;
use serde::Serialize;
use serde_json::Value;

use crate::domain::{diff_item::DiffItem, ports::OutputWriter};
use crate::presentation::report::ComparisonReport;

// ─── Serialisation view types ─────────────────────────────────────────────────
//
// Each diff gets its query-form path alongside the pointer path, plus the
// pending decision for that path if there is one.

#[derive(Serialize)]
struct JsonReport<'a> {
    #[serde(flatten)]
    report: &'a ComparisonReport,
    diffs: Vec<JsonDiff<'a>>,
}

#[derive(Serialize)]
struct JsonDiff<'a> {
    #[serde(flatten)]
    item: &'a DiffItem,
    query_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    decision: Option<&'a str>,
}

pub struct JsonWriter;

impl OutputWriter for JsonWriter {
    fn format(&self, report: &ComparisonReport) -> Result<String> {
        let view = JsonReport {
            report,
            diffs: report
                .comparison
                .diffs
                .iter()
                .map(|item| JsonDiff {
                    item,
                    query_path: item.path.to_query_form(),
                    decision: report
                        .pending
                        .iter()
                        .find(|d| d.path == item.path)
                        .map(|d| d.action.as_str()),
                })
                .collect(),
        };

        // `comparison.diffs` repeats what `diffs` already carries.
        let mut value = serde_json::to_value(&view)?;
        if let Some(Value::Object(comparison)) = value.get_mut("comparison") {
            comparison.shift_remove("diffs");
        }
        Ok(serde_json::to_string_pretty(&value)?)
    }

    fn extension(&self) -> &'static str {
        "json"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::presentation::writers::fixtures;

    #[test]
    fn json_output_adds_query_paths_and_decisions() {
        let output = JsonWriter.format(&fixtures::report()).unwrap();
        let parsed: Value = serde_json::from_str(&output).unwrap();

        let diffs = parsed["diffs"].as_array().unwrap();
        assert_eq!(diffs.len(), 3);
        assert_eq!(diffs[0]["path"], "/a");
        assert_eq!(diffs[0]["query_path"], "$.a");
        assert_eq!(diffs[0]["decision"], "applyTemplate");
        assert_eq!(diffs[1]["query_path"], "$.b.d");
        assert!(diffs[1].get("decision").is_none());
    }

    #[test]
    fn json_output_does_not_duplicate_diffs() {
        let output = JsonWriter.format(&fixtures::report()).unwrap();
        let parsed: Value = serde_json::from_str(&output).unwrap();
        assert!(parsed["comparison"].get("diffs").is_none());
        assert_eq!(parsed["comparison"]["status"], "differences");
        assert_eq!(parsed["counts"]["outstanding"], 2);
    }
}
