//! Hostaway REST client.
//!
//! Every endpoint answers `{"status": "success", "result": [...]}`; only the
//! `result` array is returned to callers.

use std::time::Duration;

use async_trait::async_trait;
use hostsync_engine::PageCursor;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;

use super::{http_error, ClientError, SourceApi};

#[derive(Debug, Clone)]
pub struct HostawayClientConfig {
    pub base_url: String,
    pub token: String,
    pub timeout_secs: u64,
}

#[derive(Clone)]
pub struct HostawayClient {
    client: Client,
    config: HostawayClientConfig,
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(default)]
    result: Value,
}

impl HostawayClient {
    pub fn new(config: HostawayClientConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { client, config })
    }

    async fn get(
        &self,
        endpoint: &str,
        query: &[(String, String)],
    ) -> Result<Vec<Value>, ClientError> {
        let url = format!("{}{}", self.config.base_url, endpoint);

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.config.token)
            .header("Cache-control", "no-cache")
            .query(query)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(http_error(response).await);
        }

        let envelope: Envelope = response.json().await?;
        match envelope.result {
            Value::Array(items) => Ok(items),
            Value::Null => Ok(Vec::new()),
            other => Err(ClientError::Decode(format!(
                "expected result array from {endpoint}, got {}",
                type_name(&other)
            ))),
        }
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[async_trait]
impl SourceApi for HostawayClient {
    async fn fetch_page(
        &self,
        endpoint: &str,
        query: &[(String, String)],
        cursor: PageCursor,
    ) -> Result<Vec<Value>, ClientError> {
        let mut params = query.to_vec();
        params.push(("limit".to_string(), cursor.limit.to_string()));
        params.push(("offset".to_string(), cursor.offset.to_string()));

        tracing::debug!(endpoint, offset = cursor.offset, limit = cursor.limit, "fetching page");
        self.get(endpoint, &params).await
    }

    async fn fetch(
        &self,
        endpoint: &str,
        query: &[(String, String)],
    ) -> Result<Vec<Value>, ClientError> {
        self.get(endpoint, query).await
    }
}
