//! Projection of source records into destination records.

use crate::filter::parse_date_prefix;
use crate::{error::Result, DestinationRecord, Error, FieldPath, SourceRecord};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

/// How the natural key is built from a source record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeySpec {
    /// Source fields joined to form the key
    pub fields: Vec<FieldPath>,
    /// Separator placed between key parts
    #[serde(default = "default_separator")]
    pub separator: String,
    /// Canonical destination column that stores the key
    pub target: String,
}

fn default_separator() -> String {
    "-".to_string()
}

impl KeySpec {
    /// Key taken from a single field.
    pub fn single(field: impl Into<FieldPath>, target: impl Into<String>) -> Self {
        Self {
            fields: vec![field.into()],
            separator: default_separator(),
            target: target.into(),
        }
    }

    /// Key composed of several fields.
    pub fn composite(fields: Vec<FieldPath>, target: impl Into<String>) -> Self {
        Self {
            fields,
            separator: default_separator(),
            target: target.into(),
        }
    }

    /// Build the key. Every part must be present and non-empty.
    pub fn build(&self, record: &SourceRecord) -> Result<String> {
        let parts = self
            .fields
            .iter()
            .map(|field| {
                record
                    .text(field)
                    .filter(|part| !part.is_empty())
                    .ok_or_else(|| Error::MissingField(field.clone()))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(parts.join(&self.separator))
    }
}

/// How a source value is converted.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FieldKind {
    /// Textual form, empty string when missing
    #[default]
    Text,
    /// Monetary amount rendered with two decimals
    Amount,
    /// Plain number, zero when missing
    Number,
    /// `YYYY-MM-DD` date, empty string when missing
    Date,
    /// Value copied as-is, null when missing
    Raw,
    /// Fixed value, source ignored
    Constant(Value),
}

/// One source → destination field mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldMapping {
    /// Source field path
    #[serde(default)]
    pub source: FieldPath,
    /// Canonical destination column
    pub target: String,
    #[serde(default)]
    pub kind: FieldKind,
}

impl FieldMapping {
    pub fn new(source: impl Into<FieldPath>, target: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            kind,
        }
    }

    pub fn text(source: impl Into<FieldPath>, target: impl Into<String>) -> Self {
        Self::new(source, target, FieldKind::Text)
    }

    pub fn amount(source: impl Into<FieldPath>, target: impl Into<String>) -> Self {
        Self::new(source, target, FieldKind::Amount)
    }

    /// Convert the mapped value. Missing or mistyped values fall back to
    /// empty/zero defaults instead of failing.
    pub fn convert(&self, record: &SourceRecord) -> Value {
        match &self.kind {
            FieldKind::Text => Value::String(record.text(&self.source).unwrap_or_default()),
            FieldKind::Amount => {
                Value::String(format_amount(record.number(&self.source).unwrap_or(0.0)))
            }
            FieldKind::Number => record
                .number(&self.source)
                .and_then(Number::from_f64)
                .map(Value::Number)
                .unwrap_or_else(|| Value::from(0)),
            FieldKind::Date => Value::String(
                record
                    .text(&self.source)
                    .as_deref()
                    .and_then(parse_date_prefix)
                    .map(|d| d.format("%Y-%m-%d").to_string())
                    .unwrap_or_default(),
            ),
            FieldKind::Raw => record.get(&self.source).cloned().unwrap_or(Value::Null),
            FieldKind::Constant(value) => value.clone(),
        }
    }
}

/// Maps a source record onto the destination shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Projection {
    pub key: KeySpec,
    #[serde(default)]
    pub fields: Vec<FieldMapping>,
}

impl Projection {
    pub fn new(key: KeySpec, fields: Vec<FieldMapping>) -> Self {
        Self { key, fields }
    }

    /// Project one record. Fails only when the natural key is missing.
    pub fn project(&self, record: &SourceRecord) -> Result<DestinationRecord> {
        let natural_key = self.key.build(record)?;

        let mut fields = Map::new();
        fields.insert(self.key.target.clone(), Value::String(natural_key.clone()));
        for mapping in &self.fields {
            fields.insert(mapping.target.clone(), mapping.convert(record));
        }

        Ok(DestinationRecord::new(natural_key, fields))
    }

    /// Canonical columns this projection writes.
    pub fn targets(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.key.target.as_str())
            .chain(self.fields.iter().map(|m| m.target.as_str()))
    }
}

/// Format a monetary amount with exactly two decimals.
///
/// Matches JavaScript's `Number.prototype.toFixed(2)`: the exact binary value
/// is rounded, and exact ties round away from zero. Non-finite input is
/// treated as zero.
pub fn format_amount(amount: f64) -> String {
    if !amount.is_finite() {
        return "0.00".to_string();
    }

    let magnitude = amount.abs();
    // Exact ties at the third decimal are the odd multiples of 1/8.
    let eighths = magnitude * 8.0;
    let magnitude = if eighths.fract() == 0.0 && eighths % 2.0 == 1.0 {
        magnitude + 0.001
    } else {
        magnitude
    };

    if amount < 0.0 {
        format!("-{magnitude:.2}")
    } else {
        format!("{magnitude:.2}")
    }
}
