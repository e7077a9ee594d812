//! Teable record API client.
//!
//! Fields are always addressed by column name (`fieldKeyType=name`), so the
//! exact destination spellings from a table schema reach the wire unchanged.

use std::time::Duration;

use async_trait::async_trait;
use hostsync_engine::{ExistingRow, RowId};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{http_error, ClientError, DestinationStore};

#[derive(Debug, Clone)]
pub struct TeableClientConfig {
    pub base_url: String,
    pub token: String,
    pub timeout_secs: u64,
}

#[derive(Clone)]
pub struct TeableClient {
    client: Client,
    config: TeableClientConfig,
}

#[derive(Deserialize)]
struct RecordList {
    #[serde(default)]
    records: Vec<ExistingRow>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateRequest {
    field_key_type: &'static str,
    typecast: bool,
    records: Vec<NewRecord>,
}

#[derive(Serialize)]
struct NewRecord {
    fields: Map<String, Value>,
}

#[derive(Deserialize)]
struct CreatedRecord {
    id: RowId,
}

#[derive(Deserialize)]
struct CreateResponse {
    #[serde(default)]
    records: Vec<CreatedRecord>,
}

impl TeableClient {
    pub fn new(config: TeableClientConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { client, config })
    }

    fn records_url(&self, table_id: &str) -> String {
        format!("{}/api/table/{}/record", self.config.base_url, table_id)
    }
}

#[async_trait]
impl DestinationStore for TeableClient {
    async fn list_records(
        &self,
        table_id: &str,
        take: usize,
    ) -> Result<Vec<ExistingRow>, ClientError> {
        let response = self
            .client
            .get(self.records_url(table_id))
            .bearer_auth(&self.config.token)
            .query(&[("take", take.to_string()), ("fieldKeyType", "name".to_string())])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(http_error(response).await);
        }

        let list: RecordList = response.json().await?;
        Ok(list.records)
    }

    async fn create_record(
        &self,
        table_id: &str,
        fields: Map<String, Value>,
    ) -> Result<RowId, ClientError> {
        let body = CreateRequest {
            field_key_type: "name",
            typecast: true,
            records: vec![NewRecord { fields }],
        };

        let response = self
            .client
            .post(self.records_url(table_id))
            .bearer_auth(&self.config.token)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(http_error(response).await);
        }

        let created: CreateResponse = response.json().await?;
        created
            .records
            .into_iter()
            .next()
            .map(|r| r.id)
            .ok_or_else(|| ClientError::Decode("create returned no record".to_string()))
    }

    async fn delete_record(&self, table_id: &str, row_id: &str) -> Result<(), ClientError> {
        let url = format!("{}/{}", self.records_url(table_id), row_id);
        let response = self
            .client
            .delete(url)
            .bearer_auth(&self.config.token)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(http_error(response).await);
        }
        Ok(())
    }
}
