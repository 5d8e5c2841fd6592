use crate::domain::ports::OutputWriter;
use crate::presentation::report::ComparisonReport;
use anyhow::Result;
use std::fs;
use std::path::{Path, PathBuf};

use self::{json::JsonWriter, markdown::MarkdownWriter};

pub mod json;
pub mod markdown;

/// Register available writers - OCP: add new ones without touching main.rs
pub fn all_writers() -> Vec<Box<dyn OutputWriter>> {
    vec![Box::new(JsonWriter), Box::new(MarkdownWriter)]
}

pub fn writer_for(format: &str) -> Option<Box<dyn OutputWriter>> {
    match format {
        "json" => Some(Box::new(JsonWriter)),
        "md" | "markdown" => Some(Box::new(MarkdownWriter)),
        _ => None,
    }
}

/// Writes the report to `dir` via the chosen writer and returns the file path.
pub fn write_to_file(
    writer: &dyn OutputWriter,
    report: &ComparisonReport,
    dir: impl AsRef<Path>,
) -> Result<PathBuf> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir)?;

    let content = writer.format(report)?;
    let path = dir.join(format!("{}.{}", report.file_stem(), writer.extension()));
    fs::write(&path, &content)?;
    Ok(path)
}

#[cfg(test)]
pub(crate) mod fixtures {
    use crate::application::diff::TreeDiffer;
    use crate::application::session::DiffCounts;
    use crate::domain::comparison::ComparisonResult;
    use crate::domain::decision::{Decision, PendingDecisions};
    use crate::domain::ports::Differ;
    use crate::domain::value_objects::CustomerId;
    use crate::presentation::report::ComparisonReport;
    use serde_json::json;

    pub fn report() -> ComparisonReport {
        let template = json!({"a": 1, "b": {"c": 2}, "tags": ["x", "y", "z"]});
        let data = json!({"a": "1", "b": {"c": 2, "d": 9}, "tags": ["x", "y"]});
        let diffs = TreeDiffer::new().diff(&template, &data);
        let comparison = ComparisonResult::new(CustomerId::from("acme"), template, data, diffs);
        let counts = DiffCounts {
            raw: 3,
            visible: 3,
            outstanding: 2,
        };
        let pending: PendingDecisions = [Decision::apply_template("/a")].into_iter().collect();
        ComparisonReport::new("ops", comparison, counts).with_pending(&pending)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_one_file_per_writer() {
        let dir = tempfile::tempdir().unwrap();
        let report = fixtures::report();

        let mut written = Vec::new();
        for writer in all_writers() {
            written.push(write_to_file(&*writer, &report, dir.path()).unwrap());
        }

        assert_eq!(written.len(), 2);
        for path in &written {
            assert!(path.exists());
            let name = path.file_name().unwrap().to_string_lossy();
            assert!(name.starts_with("acme_"), "got {name}");
        }
    }

    #[test]
    fn unknown_format_has_no_writer() {
        assert!(writer_for("html").is_none());
        assert_eq!(writer_for("md").unwrap().extension(), "md");
    }
}
