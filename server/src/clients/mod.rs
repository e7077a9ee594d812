//! Clients for the source API and the destination record store.
//!
//! The sync runner only sees the [`SourceApi`] and [`DestinationStore`]
//! traits; the Hostaway and Teable clients are the production
//! implementations.

pub mod hostaway;
pub mod teable;

use async_trait::async_trait;
use hostsync_engine::{ExistingRow, PageCursor, RowId};
use reqwest::StatusCode;
use serde_json::{Map, Value};

pub use hostaway::HostawayClient;
pub use teable::TeableClient;

/// Errors from outbound HTTP calls.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("HTTP {status}: {body}")]
    Http { status: StatusCode, body: String },

    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("unexpected response: {0}")]
    Decode(String),

    #[error("timed out after {0}s")]
    Timeout(u64),
}

/// Paginated JSON source.
#[async_trait]
pub trait SourceApi: Send + Sync {
    /// Fetch one page of records.
    async fn fetch_page(
        &self,
        endpoint: &str,
        query: &[(String, String)],
        cursor: PageCursor,
    ) -> Result<Vec<Value>, ClientError>;

    /// Fetch an unpaginated endpoint.
    async fn fetch(
        &self,
        endpoint: &str,
        query: &[(String, String)],
    ) -> Result<Vec<Value>, ClientError>;
}

/// Record store with create, delete and capped list operations.
#[async_trait]
pub trait DestinationStore: Send + Sync {
    /// List up to `take` rows of a table, keyed by exact column names.
    async fn list_records(&self, table_id: &str, take: usize)
        -> Result<Vec<ExistingRow>, ClientError>;

    /// Create one row and return its assigned id.
    async fn create_record(
        &self,
        table_id: &str,
        fields: Map<String, Value>,
    ) -> Result<RowId, ClientError>;

    async fn delete_record(&self, table_id: &str, row_id: &str) -> Result<(), ClientError>;
}

/// Read an error response into a [`ClientError::Http`].
pub(crate) async fn http_error(response: reqwest::Response) -> ClientError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    ClientError::Http { status, body }
}
