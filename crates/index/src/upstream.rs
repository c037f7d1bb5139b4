//! JSON-RPC client for the store that owns the catalog.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("upstream endpoint is not configured")]
    NotConfigured,
    #[error("upstream request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("upstream returned status {status}")]
    Status { status: u16 },
    #[error("upstream `{method}` failed: {message}")]
    Rpc { method: String, message: String },
    #[error("upstream `{method}` returned no record list")]
    Shape { method: String },
}

/// Full-snapshot pulls of the upstream catalog.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn fetch_products(&self) -> Result<Vec<Value>, UpstreamError>;
    async fn fetch_categories(&self) -> Result<Vec<Value>, UpstreamError>;
    async fn fetch_coupons(&self) -> Result<Vec<Value>, UpstreamError>;
}

pub struct JsonRpcCatalogClient {
    client: Client,
    endpoint: Option<String>,
    next_id: AtomicU64,
}

impl JsonRpcCatalogClient {
    pub fn new(endpoint: Option<String>, timeout_secs: u64) -> Result<Self, UpstreamError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs.max(1)))
            .connect_timeout(Duration::from_secs(timeout_secs.clamp(1, 10)))
            .build()?;
        Ok(Self::with_client(client, endpoint))
    }

    pub fn with_client(client: Client, endpoint: Option<String>) -> Self {
        let endpoint = endpoint.filter(|endpoint| !endpoint.trim().is_empty());
        Self { client, endpoint, next_id: AtomicU64::new(1) }
    }

    pub fn is_configured(&self) -> bool {
        self.endpoint.is_some()
    }

    async fn call(&self, method: &str) -> Result<Vec<Value>, UpstreamError> {
        let endpoint = self.endpoint.as_deref().ok_or(UpstreamError::NotConfigured)?;
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let payload = json!({ "jsonrpc": "2.0", "method": method, "params": {}, "id": id });

        let response = self.client.post(endpoint).json(&payload).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(UpstreamError::Status { status: status.as_u16() });
        }
        let body: Value = response.json().await?;
        let records = extract_records(method, body)?;
        debug!(
            event_name = "upstream.rpc.completed",
            method,
            records = records.len(),
            "upstream call completed"
        );
        Ok(records)
    }
}

/// Accepts `result`, `{success, data}` and bare-list response shapes.
pub(crate) fn extract_records(method: &str, body: Value) -> Result<Vec<Value>, UpstreamError> {
    let mut body = match body {
        Value::Array(items) => return Ok(items),
        Value::Object(map) => map,
        _ => return Err(UpstreamError::Shape { method: method.to_string() }),
    };

    if let Some(error) = body.remove("error").filter(|error| !error.is_null()) {
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string());
        return Err(UpstreamError::Rpc { method: method.to_string(), message });
    }

    let payload = match body.remove("result") {
        Some(Value::Object(mut result)) => {
            result.remove("data").or_else(|| result.remove("items")).unwrap_or(Value::Null)
        }
        Some(result) => result,
        None if body.get("success").and_then(Value::as_bool) == Some(true) => {
            body.remove("data").unwrap_or(Value::Null)
        }
        None => body.remove("data").unwrap_or(Value::Null),
    };

    match payload {
        Value::Array(items) => Ok(items),
        _ => Err(UpstreamError::Shape { method: method.to_string() }),
    }
}

#[async_trait]
impl CatalogSource for JsonRpcCatalogClient {
    async fn fetch_products(&self) -> Result<Vec<Value>, UpstreamError> {
        self.call("get_products").await
    }

    async fn fetch_categories(&self) -> Result<Vec<Value>, UpstreamError> {
        self.call("get_product_categories").await
    }

    async fn fetch_coupons(&self) -> Result<Vec<Value>, UpstreamError> {
        self.call("get_coupons").await
    }
}
