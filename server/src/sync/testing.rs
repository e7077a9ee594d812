//! In-memory fakes of the client traits.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use hostsync_engine::{ExistingRow, PageCursor, RowId};
use reqwest::StatusCode;
use serde_json::{Map, Value};

use crate::clients::{ClientError, DestinationStore, SourceApi};

fn server_error(body: &str) -> ClientError {
    ClientError::Http {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        body: body.to_string(),
    }
}

/// Source serving fixed record sets per endpoint.
#[derive(Default)]
pub struct FakeSource {
    data: HashMap<String, Vec<Value>>,
    /// Endpoint → first offset that fails
    fail_from: HashMap<String, usize>,
    delays: HashMap<String, Duration>,
    calls: Mutex<Vec<String>>,
}

impl FakeSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(mut self, endpoint: &str, records: Vec<Value>) -> Self {
        self.data.insert(endpoint.to_string(), records);
        self
    }

    pub fn failing_from(mut self, endpoint: &str, offset: usize) -> Self {
        self.fail_from.insert(endpoint.to_string(), offset);
        self
    }

    pub fn with_delay(mut self, endpoint: &str, delay: Duration) -> Self {
        self.delays.insert(endpoint.to_string(), delay);
        self
    }

    /// Requested endpoints, with `@offset` for paged calls.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl SourceApi for FakeSource {
    async fn fetch_page(
        &self,
        endpoint: &str,
        _query: &[(String, String)],
        cursor: PageCursor,
    ) -> Result<Vec<Value>, ClientError> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("{endpoint}@{}", cursor.offset));

        if self.fail_from.get(endpoint).is_some_and(|&from| cursor.offset >= from) {
            return Err(server_error("page failed"));
        }

        let items = self.data.get(endpoint).cloned().unwrap_or_default();
        Ok(items
            .into_iter()
            .skip(cursor.offset)
            .take(cursor.limit)
            .collect())
    }

    async fn fetch(
        &self,
        endpoint: &str,
        _query: &[(String, String)],
    ) -> Result<Vec<Value>, ClientError> {
        self.calls.lock().unwrap().push(endpoint.to_string());

        if let Some(delay) = self.delays.get(endpoint) {
            tokio::time::sleep(*delay).await;
        }
        if self.fail_from.contains_key(endpoint) {
            return Err(server_error("fetch failed"));
        }
        Ok(self.data.get(endpoint).cloned().unwrap_or_default())
    }
}

/// Mutation recorded by [`FakeStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    Create { table: String, row_id: RowId },
    Delete { table: String, row_id: RowId },
}

/// Record store keeping tables in memory.
#[derive(Default)]
pub struct FakeStore {
    tables: Mutex<HashMap<String, Vec<ExistingRow>>>,
    next_id: AtomicUsize,
    failing_lists: HashSet<String>,
    failing_deletes: HashSet<RowId>,
    failing_creates: HashSet<String>,
    mutations: Mutex<Vec<Mutation>>,
}

impl FakeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rows(self, table: &str, rows: Vec<ExistingRow>) -> Self {
        self.tables.lock().unwrap().insert(table.to_string(), rows);
        self
    }

    /// Add a row after construction, as another writer would.
    pub fn insert_row(&self, table: &str, row: ExistingRow) {
        self.tables
            .lock()
            .unwrap()
            .entry(table.to_string())
            .or_default()
            .push(row);
    }

    pub fn failing_list(mut self, table: &str) -> Self {
        self.failing_lists.insert(table.to_string());
        self
    }

    pub fn failing_delete(mut self, row_id: &str) -> Self {
        self.failing_deletes.insert(row_id.to_string());
        self
    }

    /// Fail creates whose fields contain this string value.
    pub fn failing_create_with(mut self, value: &str) -> Self {
        self.failing_creates.insert(value.to_string());
        self
    }

    pub fn rows(&self, table: &str) -> Vec<ExistingRow> {
        self.tables
            .lock()
            .unwrap()
            .get(table)
            .cloned()
            .unwrap_or_default()
    }

    pub fn mutations(&self) -> Vec<Mutation> {
        self.mutations.lock().unwrap().clone()
    }

    pub fn creates(&self) -> usize {
        self.mutations()
            .iter()
            .filter(|m| matches!(m, Mutation::Create { .. }))
            .count()
    }

    pub fn deletes(&self) -> usize {
        self.mutations()
            .iter()
            .filter(|m| matches!(m, Mutation::Delete { .. }))
            .count()
    }
}

#[async_trait]
impl DestinationStore for FakeStore {
    async fn list_records(
        &self,
        table_id: &str,
        take: usize,
    ) -> Result<Vec<ExistingRow>, ClientError> {
        if self.failing_lists.contains(table_id) {
            return Err(server_error("list failed"));
        }
        Ok(self.rows(table_id).into_iter().take(take).collect())
    }

    async fn create_record(
        &self,
        table_id: &str,
        fields: Map<String, Value>,
    ) -> Result<RowId, ClientError> {
        let rejected = fields
            .values()
            .filter_map(Value::as_str)
            .any(|v| self.failing_creates.contains(v));
        if rejected {
            return Err(server_error("create failed"));
        }

        let row_id = format!("rec{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        self.tables
            .lock()
            .unwrap()
            .entry(table_id.to_string())
            .or_default()
            .push(ExistingRow::new(row_id.clone(), fields));
        self.mutations.lock().unwrap().push(Mutation::Create {
            table: table_id.to_string(),
            row_id: row_id.clone(),
        });
        Ok(row_id)
    }

    async fn delete_record(&self, table_id: &str, row_id: &str) -> Result<(), ClientError> {
        if self.failing_deletes.contains(row_id) {
            return Err(server_error("delete failed"));
        }

        if let Some(rows) = self.tables.lock().unwrap().get_mut(table_id) {
            rows.retain(|r| r.id != row_id);
        }
        self.mutations.lock().unwrap().push(Mutation::Delete {
            table: table_id.to_string(),
            row_id: row_id.to_string(),
        });
        Ok(())
    }
}
