use serde::Deserialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::domain::{
    changes::{ApplyReceipt, ChangeDetails, ChangeList, DecisionBatch},
    comparison::{ComparisonResult, PayloadSource, TemplateSource},
    diff_item::{DiffItem, RawDiffItem},
    error::StoreError,
    ports::{Differ, PayloadStore},
    value_objects::CustomerId,
};

/// Where diffs for a comparison are computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffSource {
    /// Locally, with the configured [`Differ`].
    #[default]
    Local,
    /// By the store's check endpoint; results are normalised at the boundary.
    Remote,
}

#[derive(Debug, Clone)]
pub struct CompareSettings {
    /// Template used when a customer has none of its own.
    pub default_template_id: String,
    pub diff_source: DiffSource,
    /// Whether the store should log remote checks.
    pub log_checks: bool,
}

impl Default for CompareSettings {
    fn default() -> Self {
        Self {
            default_template_id: "default".to_string(),
            diff_source: DiffSource::Local,
            log_checks: true,
        }
    }
}

/// A batch the store has accepted, and the comparison reloaded after it.
#[derive(Debug, Clone)]
pub struct Submitted {
    pub receipt: ApplyReceipt,
    pub reloaded: Result<ComparisonResult, StoreError>,
}

// ─── Comparison Service ───

/// Loads comparisons from the store and submits decision batches.
///
/// All fallback policy lives here: a missing customer template falls back to
/// the default template, a missing saved payload to the latest submitted one,
/// and a customer with neither is compared as an empty object.
pub struct ComparisonService {
    store: Arc<dyn PayloadStore>,
    differ: Arc<dyn Differ>,
    settings: CompareSettings,
}

impl ComparisonService {
    pub fn new(
        store: Arc<dyn PayloadStore>,
        differ: Arc<dyn Differ>,
        settings: CompareSettings,
    ) -> Self {
        Self {
            store,
            differ,
            settings,
        }
    }

    pub fn settings(&self) -> &CompareSettings {
        &self.settings
    }

    #[instrument(skip(self, customer), fields(customer = %customer), level = "info")]
    pub async fn load(&self, customer: &CustomerId) -> Result<ComparisonResult, StoreError> {
        let (template, template_source) = self.template_for(customer).await?;
        let (customer_data, payload_source) = self.payload_for(customer).await?;

        let diffs = match self.settings.diff_source {
            DiffSource::Local => self.differ.diff(&template, &customer_data),
            DiffSource::Remote => {
                self.remote_diffs(customer, &template_source, &customer_data)
                    .await?
            }
        };

        info!(
            customer = %customer,
            diffs = diffs.len(),
            payload_source = ?payload_source,
            "comparison loaded"
        );

        Ok(ComparisonResult::new(customer.clone(), template, customer_data, diffs)
            .with_sources(template_source, payload_source))
    }

    /// Submit a batch, then reload so the caller sees the store's view.
    ///
    /// `Err` means the store did not take the batch. Once it has, the
    /// result is always `Ok` and a failed reload is carried in
    /// [`Submitted::reloaded`].
    #[instrument(skip(self, customer, batch), fields(customer = %customer, batch = %batch.batch_id), level = "info")]
    pub async fn submit(
        &self,
        customer: &CustomerId,
        batch: &DecisionBatch,
    ) -> Result<Submitted, StoreError> {
        let receipt = self.store.submit_decisions(customer, batch).await?;
        info!(
            change_set = %receipt.change_set_id,
            status = ?receipt.status,
            decisions = batch.decisions.len(),
            "decisions submitted"
        );
        if let Some(err) = &receipt.error {
            warn!(change_set = %receipt.change_set_id, error = %err, "store reported an apply error");
        }
        let reloaded = self.load(customer).await;
        if let Err(e) = &reloaded {
            warn!(change_set = %receipt.change_set_id, error = %e, "reload after submit failed");
        }
        Ok(Submitted { receipt, reloaded })
    }

    pub async fn history(
        &self,
        customer: &CustomerId,
        page: usize,
        page_size: usize,
    ) -> Result<ChangeList, StoreError> {
        self.store
            .fetch_change_history(customer, page, page_size)
            .await
    }

    pub async fn change(&self, id: &str) -> Result<ChangeDetails, StoreError> {
        self.store.fetch_change(id).await
    }

    /// Overwrite the customer's saved payload directly, bypassing decisions.
    pub async fn save_payload(&self, customer: &CustomerId, payload: &Value) -> Result<(), StoreError> {
        self.store.save_payload(customer, payload).await
    }

    async fn template_for(
        &self,
        customer: &CustomerId,
    ) -> Result<(Value, TemplateSource), StoreError> {
        match self.store.fetch_template(customer.as_str()).await {
            Ok(t) => Ok((t, TemplateSource::Customer)),
            Err(e) if e.is_not_found() && customer.as_str() != self.settings.default_template_id => {
                debug!(customer = %customer, "no customer template, using default");
                let id = self.settings.default_template_id.clone();
                let t = self.store.fetch_template(&id).await?;
                Ok((t, TemplateSource::Default(id)))
            }
            Err(e) => Err(e),
        }
    }

    async fn payload_for(
        &self,
        customer: &CustomerId,
    ) -> Result<(Value, PayloadSource), StoreError> {
        match self.store.fetch_saved_payload(customer).await {
            Ok(p) => return Ok((p, PayloadSource::Saved)),
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e),
        }
        match self.store.fetch_latest_payload(customer).await {
            Ok(p) => Ok((p, PayloadSource::LatestSubmitted)),
            Err(e) if e.is_not_found() => {
                debug!(customer = %customer, "no stored payload, comparing template only");
                Ok((Value::Object(Map::new()), PayloadSource::None))
            }
            Err(e) => Err(e),
        }
    }

    async fn remote_diffs(
        &self,
        customer: &CustomerId,
        template_source: &TemplateSource,
        payload: &Value,
    ) -> Result<Vec<DiffItem>, StoreError> {
        let target = match template_source {
            TemplateSource::Customer => customer.clone(),
            TemplateSource::Default(id) => CustomerId(id.clone()),
        };
        let response = self
            .store
            .check_payload(&target, payload, self.settings.log_checks)
            .await?;
        response
            .diffs
            .into_iter()
            .map(RawDiffItem::normalize)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| StoreError::Decode {
                message: format!("check-payload diff: {e}"),
            })
    }
}
