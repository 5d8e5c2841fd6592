use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

use crate::domain::changes::{
    ApplyReceipt, ChangeDetails, ChangeList, ChangeSetStatus, DecisionBatch, RemoteDiffResponse,
};
use crate::domain::error::{Resource, StoreError};
use crate::domain::ports::PayloadStore;
use crate::domain::value_objects::{CustomerId, Operator};
use crate::infrastructure::config::StoreConfig;

/// [`PayloadStore`] over the store's REST API.
pub struct HttpPayloadStore {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

/// Build an `HttpPayloadStore` for `cfg`.
///
/// The operator's token wins over one from the config file.
pub fn connect(cfg: &StoreConfig, operator: &Operator) -> Result<HttpPayloadStore> {
    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(cfg.timeout_secs))
        .build()
        .with_context(|| format!("Failed to build HTTP client for {}", cfg.base_url))?;

    debug!(base_url = %cfg.base_url, operator = %operator.name, "store client ready");

    Ok(HttpPayloadStore {
        http,
        base_url: cfg.base_url.trim_end_matches('/').to_string(),
        token: operator
            .access_token
            .clone()
            .or_else(|| cfg.access_token.clone()),
    })
}

impl HttpPayloadStore {
    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let rb = self
            .http
            .request(method, format!("{}{}", self.base_url, path))
            .header("Accept", "application/json");
        match &self.token {
            Some(token) => rb.bearer_auth(token),
            None => rb,
        }
    }

    /// Send and read the body as JSON. An empty body (204) is `None`.
    async fn send(
        &self,
        rb: RequestBuilder,
        resource: Resource,
        key: &str,
    ) -> Result<Option<Value>, StoreError> {
        let response = rb
            .send()
            .await
            .map_err(|e| StoreError::transport(e.to_string()))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| StoreError::transport(e.to_string()))?;

        if status == StatusCode::NOT_FOUND {
            return Err(StoreError::not_found(resource, key));
        }
        if !status.is_success() {
            return Err(StoreError::transport(format!("HTTP {status}: {}", text.trim())));
        }
        if text.trim().is_empty() {
            return Ok(None);
        }
        serde_json::from_str(&text)
            .map(Some)
            .map_err(|e| StoreError::Decode {
                message: e.to_string(),
            })
    }

    async fn send_document(
        &self,
        rb: RequestBuilder,
        resource: Resource,
        key: &str,
    ) -> Result<Value, StoreError> {
        let body = self.send(rb, resource, key).await?;
        Ok(body.map(unwrap_document).unwrap_or_else(|| json!({})))
    }

    async fn send_typed<T: DeserializeOwned + Default>(
        &self,
        rb: RequestBuilder,
        resource: Resource,
        key: &str,
    ) -> Result<T, StoreError> {
        match self.send(rb, resource, key).await? {
            Some(v) => decode(v),
            None => Ok(T::default()),
        }
    }
}

/// Documents come back either bare or wrapped as `{ "payload": .. }` or
/// `{ "body": .. }`.
fn unwrap_document(value: Value) -> Value {
    match value {
        Value::Object(mut map) => {
            for key in ["payload", "body"] {
                if let Some(inner) = map.get(key) {
                    if !inner.is_null() {
                        return map.shift_remove(key).unwrap_or(Value::Null);
                    }
                }
            }
            Value::Object(map)
        }
        other => other,
    }
}

fn decode<T: DeserializeOwned>(value: Value) -> Result<T, StoreError> {
    serde_json::from_value(value).map_err(|e| StoreError::Decode {
        message: e.to_string(),
    })
}

#[async_trait]
impl PayloadStore for HttpPayloadStore {
    async fn fetch_template(&self, template_id: &str) -> Result<Value, StoreError> {
        let rb = self
            .request(Method::GET, "/Compare/actual-template")
            .query(&[("customerId", template_id)]);
        self.send_document(rb, Resource::Template, template_id).await
    }

    async fn fetch_saved_payload(&self, customer: &CustomerId) -> Result<Value, StoreError> {
        let rb = self
            .request(Method::GET, "/api/payloads/by-customer")
            .query(&[("customerId", customer.as_str())]);
        self.send_document(rb, Resource::SavedPayload, customer.as_str())
            .await
    }

    async fn fetch_latest_payload(&self, customer: &CustomerId) -> Result<Value, StoreError> {
        let rb = self
            .request(Method::GET, "/Compare/latest-payload")
            .query(&[("customerId", customer.as_str())]);
        self.send_document(rb, Resource::LatestPayload, customer.as_str())
            .await
    }

    async fn check_payload(
        &self,
        customer: &CustomerId,
        payload: &Value,
        should_log: bool,
    ) -> Result<RemoteDiffResponse, StoreError> {
        let rb = self
            .request(Method::POST, "/Compare/check-payload")
            .query(&[
                ("customerId", customer.as_str()),
                ("log", if should_log { "true" } else { "false" }),
            ])
            .json(&json!({ "payload": payload }));
        self.send_typed(rb, Resource::Template, customer.as_str())
            .await
    }

    async fn submit_decisions(
        &self,
        customer: &CustomerId,
        batch: &DecisionBatch,
    ) -> Result<ApplyReceipt, StoreError> {
        let rb = self
            .request(Method::POST, "/Compare/apply")
            .query(&[("customerId", customer.as_str())])
            .json(batch);
        match self.send(rb, Resource::SavedPayload, customer.as_str()).await? {
            Some(v) if v.get("changeSetId").is_some() => decode(v),
            // 204 or a body without a receipt: the store applied synchronously.
            _ => Ok(ApplyReceipt {
                change_set_id: batch.batch_id.to_string(),
                status: ChangeSetStatus::Applied,
                error: None,
            }),
        }
    }

    async fn save_payload(&self, customer: &CustomerId, payload: &Value) -> Result<(), StoreError> {
        let rb = self
            .request(Method::PUT, "/api/payloads/upsert")
            .query(&[("customerId", customer.as_str())])
            .json(payload);
        self.send(rb, Resource::SavedPayload, customer.as_str())
            .await
            .map(|_| ())
    }

    async fn fetch_change_history(
        &self,
        customer: &CustomerId,
        page: usize,
        page_size: usize,
    ) -> Result<ChangeList, StoreError> {
        let rb = self.request(Method::GET, "/api/changes").query(&[
            ("customerId", customer.as_str().to_string()),
            ("page", page.to_string()),
            ("pageSize", page_size.to_string()),
        ]);
        self.send_typed(rb, Resource::Change, customer.as_str())
            .await
    }

    async fn fetch_change(&self, id: &str) -> Result<ChangeDetails, StoreError> {
        let rb = self.request(Method::GET, &format!("/api/changes/{id}"));
        match self.send(rb, Resource::Change, id).await? {
            Some(v) => decode(v),
            None => Err(StoreError::not_found(Resource::Change, id)),
        }
    }
}
