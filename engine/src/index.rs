//! Natural key → row id index over existing destination rows.

use crate::record::value_text;
use crate::{ExistingRow, NaturalKey, RowId, TableSchema};
use std::collections::HashMap;

/// Maximum number of existing rows read when building an index.
///
/// Rows beyond the cap are invisible to reconciliation: their keys look new
/// and get a second row. Tables are expected to stay under this size.
pub const INDEX_READ_CAP: usize = 1000;

/// Existing destination rows indexed by natural key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconciliationIndex {
    rows: HashMap<NaturalKey, RowId>,
    rows_read: usize,
    possibly_truncated: bool,
}

impl ReconciliationIndex {
    /// An index with no rows, used when the destination read fails.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Index rows by the canonical `key_column`.
    ///
    /// Rows without a key are skipped. When two rows share a key the later
    /// one wins; duplicates are neither detected nor reported.
    pub fn build(rows: &[ExistingRow], schema: &TableSchema, key_column: &str, cap: usize) -> Self {
        let mut index = HashMap::with_capacity(rows.len());
        for row in rows {
            if let Some(key) = schema.read(&row.fields, key_column).and_then(value_text) {
                index.insert(key, row.id.clone());
            }
        }

        Self {
            rows: index,
            rows_read: rows.len(),
            possibly_truncated: cap > 0 && rows.len() >= cap,
        }
    }

    /// Row id currently holding `key`.
    pub fn get(&self, key: &str) -> Option<&RowId> {
        self.rows.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.rows.contains_key(key)
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Number of rows the index was built from.
    pub fn rows_read(&self) -> usize {
        self.rows_read
    }

    /// Whether the read hit the cap, so some rows may be missing.
    pub fn possibly_truncated(&self) -> bool {
        self.possibly_truncated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ColumnDef;
    use serde_json::{json, Value};

    fn schema() -> TableSchema {
        TableSchema::new(vec![ColumnDef::new("charge_id", "Charge ID ")])
    }

    fn row(id: &str, fields: Value) -> ExistingRow {
        ExistingRow::new(id, fields.as_object().cloned().unwrap_or_default())
    }

    #[test]
    fn builds_key_to_row_id() {
        let rows = vec![
            row("rec1", json!({"Charge ID ": "100"})),
            row("rec2", json!({"Charge ID ": 200})),
            row("rec3", json!({"Other": "x"})),
        ];

        let index = ReconciliationIndex::build(&rows, &schema(), "charge_id", INDEX_READ_CAP);

        assert_eq!(index.len(), 2);
        assert_eq!(index.rows_read(), 3);
        assert_eq!(index.get("100"), Some(&"rec1".to_string()));
        assert_eq!(index.get("200"), Some(&"rec2".to_string()));
        assert!(!index.possibly_truncated());
    }

    #[test]
    fn duplicate_keys_last_wins() {
        let rows = vec![
            row("rec1", json!({"Charge ID ": "100"})),
            row("rec2", json!({"Charge ID ": "100"})),
        ];

        let index = ReconciliationIndex::build(&rows, &schema(), "charge_id", INDEX_READ_CAP);
        assert_eq!(index.len(), 1);
        assert_eq!(index.get("100"), Some(&"rec2".to_string()));
    }

    #[test]
    fn flags_reads_at_cap() {
        let rows: Vec<_> = (0..3)
            .map(|i| row(&format!("rec{i}"), json!({"Charge ID ": i})))
            .collect();

        assert!(ReconciliationIndex::build(&rows, &schema(), "charge_id", 3).possibly_truncated());
        assert!(!ReconciliationIndex::build(&rows, &schema(), "charge_id", 4).possibly_truncated());
    }

    #[test]
    fn empty_index() {
        let index = ReconciliationIndex::empty();
        assert!(index.is_empty());
        assert!(!index.contains("anything"));
    }
}
