//! Destination table schemas.
//!
//! Business logic refers to columns by canonical names. A [`TableSchema`] maps
//! each canonical name to the exact column spelling used by the destination
//! table (trailing spaces included) and to any alternative spellings that
//! older rows were written with.

use crate::{error::Result, Error};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;

/// Definition of one destination column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnDef {
    /// Name used by pipeline logic
    pub canonical: String,
    /// Exact column name written to the destination
    pub name: String,
    /// Other spellings accepted when reading
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,
}

impl ColumnDef {
    /// Create a column definition.
    pub fn new(canonical: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            canonical: canonical.into(),
            name: name.into(),
            aliases: Vec::new(),
        }
    }

    /// Builder-style method to add a read alias.
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    fn spellings(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.name.as_str()).chain(self.aliases.iter().map(String::as_str))
    }
}

/// Column mapping for one destination table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableSchema {
    pub columns: Vec<ColumnDef>,
}

impl TableSchema {
    /// Create a schema from column definitions.
    pub fn new(columns: Vec<ColumnDef>) -> Self {
        Self { columns }
    }

    /// Builder-style method to add a column.
    pub fn with_column(mut self, column: ColumnDef) -> Self {
        self.columns.push(column);
        self
    }

    /// Get a column by canonical name.
    pub fn column(&self, canonical: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.canonical == canonical)
    }

    /// Exact destination spelling of a canonical column.
    pub fn destination_name(&self, canonical: &str) -> Result<&str> {
        self.column(canonical)
            .map(|c| c.name.as_str())
            .ok_or_else(|| Error::UnknownColumn(canonical.to_string()))
    }

    /// Read a canonical column from a row keyed by destination spellings.
    ///
    /// The write spelling is tried first, then aliases in declaration order.
    pub fn read<'a>(&self, fields: &'a Map<String, Value>, canonical: &str) -> Option<&'a Value> {
        self.column(canonical)?
            .spellings()
            .find_map(|spelling| fields.get(spelling))
    }

    /// Re-key a destination row by canonical names, dropping unknown columns.
    pub fn canonicalize(&self, fields: &Map<String, Value>) -> Map<String, Value> {
        self.columns
            .iter()
            .filter_map(|column| {
                column
                    .spellings()
                    .find_map(|spelling| fields.get(spelling))
                    .map(|value| (column.canonical.clone(), value.clone()))
            })
            .collect()
    }

    /// Re-key canonical fields by exact destination spellings.
    pub fn to_destination(&self, fields: &Map<String, Value>) -> Result<Map<String, Value>> {
        fields
            .iter()
            .map(|(canonical, value)| {
                self.destination_name(canonical)
                    .map(|name| (name.to_string(), value.clone()))
            })
            .collect()
    }

    /// Check that canonical names are unique and that every spelling, write
    /// name or alias, belongs to exactly one column.
    pub fn validate(&self) -> Result<()> {
        let mut canonical = HashSet::new();
        let mut names = HashSet::new();

        for column in &self.columns {
            if column.canonical.is_empty() || column.name.is_empty() {
                return Err(Error::UnknownColumn(format!(
                    "empty column name for '{}'",
                    column.canonical
                )));
            }
            if !canonical.insert(column.canonical.as_str()) {
                return Err(Error::DuplicateColumn(column.canonical.clone()));
            }
            if !names.insert(column.name.as_str()) {
                return Err(Error::DuplicateColumn(column.name.clone()));
            }
            for alias in &column.aliases {
                if !names.insert(alias.as_str()) {
                    return Err(Error::DuplicateColumn(alias.clone()));
                }
            }
        }

        Ok(())
    }
}
