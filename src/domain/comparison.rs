use serde::Serialize;
use serde_json::Value;

use crate::domain::diff_item::DiffItem;
use crate::domain::value_objects::{CustomerId, Fingerprint};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonStatus {
    Ok,
    Differences,
}

/// Where the template of a comparison came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "source", content = "id", rename_all = "snake_case")]
pub enum TemplateSource {
    Customer,
    /// The customer has no template of its own; the named default was used.
    Default(String),
}

/// Where the customer data of a comparison came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadSource {
    Saved,
    LatestSubmitted,
    /// Nothing stored yet; the customer data is an empty object.
    None,
}

/// The current state of one comparison for one customer.
///
/// `status` is derived from `diffs` at construction and never set by hand.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonResult {
    pub customer_id: CustomerId,
    pub template: Value,
    pub customer_data: Value,
    pub diffs: Vec<DiffItem>,
    pub status: ComparisonStatus,
    pub template_source: TemplateSource,
    pub payload_source: PayloadSource,
    /// Fingerprint of `customer_data` as loaded.
    pub fingerprint: Fingerprint,
}

impl ComparisonResult {
    pub fn new(
        customer_id: CustomerId,
        template: Value,
        customer_data: Value,
        diffs: Vec<DiffItem>,
    ) -> Self {
        let status = if diffs.is_empty() {
            ComparisonStatus::Ok
        } else {
            ComparisonStatus::Differences
        };
        let fingerprint = crate::domain::fingerprint::fingerprint(&customer_data);
        Self {
            customer_id,
            template,
            customer_data,
            diffs,
            status,
            template_source: TemplateSource::Customer,
            payload_source: PayloadSource::Saved,
            fingerprint,
        }
    }

    pub fn with_sources(mut self, template: TemplateSource, payload: PayloadSource) -> Self {
        self.template_source = template;
        self.payload_source = payload;
        self
    }

    pub fn is_clean(&self) -> bool {
        self.status == ComparisonStatus::Ok
    }

    /// `true` when the customer had no saved or submitted payload and the
    /// comparison only shows the template.
    pub fn no_saved_payload(&self) -> bool {
        self.payload_source == PayloadSource::None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::diff_item::DiffKind;
    use crate::domain::path::JsonPath;
    use serde_json::json;

    #[test]
    fn status_follows_diffs() {
        let clean = ComparisonResult::new(CustomerId::from("c"), json!({}), json!({}), vec![]);
        assert!(clean.is_clean());

        let dirty = ComparisonResult::new(
            CustomerId::from("c"),
            json!({"a": 1}),
            json!({}),
            vec![DiffItem::new(
                JsonPath::from_pointer("/a"),
                DiffKind::Missing,
                Some(json!(1)),
                None,
            )],
        );
        assert_eq!(dirty.status, ComparisonStatus::Differences);
    }

    #[test]
    fn status_serialises_snake_case() {
        let r = ComparisonResult::new(CustomerId::from("c"), json!({}), json!({}), vec![])
            .with_sources(TemplateSource::Default("default".into()), PayloadSource::None);
        let out = serde_json::to_value(&r).unwrap();
        assert_eq!(out["status"], json!("ok"));
        assert_eq!(out["payload_source"], json!("none"));
        assert_eq!(out["template_source"], json!({"source": "default", "id": "default"}));
        assert!(r.no_saved_payload());
    }
}
