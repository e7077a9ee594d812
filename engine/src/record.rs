//! Record types flowing through a pipeline.
//!
//! Source records are opaque JSON objects from the upstream API. Destination
//! records are flat field maps keyed by canonical column name, plus the
//! natural key used to match them against existing rows.

use crate::{NaturalKey, RowId};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A raw record from the source API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceRecord(Value);

impl SourceRecord {
    /// Wrap a JSON value.
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// Borrow the underlying JSON value.
    pub fn as_value(&self) -> &Value {
        &self.0
    }

    /// Unwrap into the underlying JSON value.
    pub fn into_value(self) -> Value {
        self.0
    }

    /// Look up a dotted field path (`listing.countryCode`, `items.0.id`).
    pub fn get(&self, path: &str) -> Option<&Value> {
        lookup(&self.0, path)
    }

    /// Textual form of a scalar field.
    pub fn text(&self, path: &str) -> Option<String> {
        self.get(path).and_then(value_text)
    }

    /// Numeric form of a field. Numeric strings are accepted.
    pub fn number(&self, path: &str) -> Option<f64> {
        self.get(path).and_then(value_number)
    }

    /// Set a dotted field path, creating intermediate objects as needed.
    ///
    /// Does nothing if the record (or an intermediate segment) is not an object.
    pub fn set(&mut self, path: &str, value: Value) {
        let mut current = &mut self.0;
        let mut segments = path.split('.').peekable();

        while let Some(segment) = segments.next() {
            let Some(obj) = current.as_object_mut() else {
                return;
            };
            if segments.peek().is_none() {
                obj.insert(segment.to_string(), value);
                return;
            }
            current = obj
                .entry(segment.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
        }
    }
}

impl From<Value> for SourceRecord {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

fn lookup<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(value, |current, segment| match current {
        Value::Object(obj) => obj.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

/// Render a scalar JSON value as text.
///
/// Strings are returned as-is, numbers and booleans in their JSON form.
/// Null, arrays and objects have no textual form.
pub fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

/// Read a JSON value as a number, accepting numeric strings.
pub fn value_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// A row to be written to the destination store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DestinationRecord {
    /// Business identifier matched against existing rows
    pub natural_key: NaturalKey,
    /// Field values keyed by canonical column name
    pub fields: Map<String, Value>,
}

impl DestinationRecord {
    /// Create a destination record.
    pub fn new(natural_key: impl Into<NaturalKey>, fields: Map<String, Value>) -> Self {
        Self {
            natural_key: natural_key.into(),
            fields,
        }
    }
}

/// A row already present in the destination store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExistingRow {
    /// Row id assigned by the destination store
    pub id: RowId,
    /// Field values keyed by exact destination column name
    #[serde(default)]
    pub fields: Map<String, Value>,
    /// Creation time as reported by the store
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_time: Option<String>,
}

impl ExistingRow {
    /// Create an existing row.
    pub fn new(id: impl Into<RowId>, fields: Map<String, Value>) -> Self {
        Self {
            id: id.into(),
            fields,
            created_time: None,
        }
    }
}
