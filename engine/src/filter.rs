//! Filter predicates applied to source records.
//!
//! Predicates are data, not closures, so pipelines can be declared in
//! configuration. Evaluation is pure: the current date comes from the
//! [`FilterContext`], never from the system clock.

use crate::{FieldPath, SourceRecord};
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

/// Values a predicate is evaluated against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterContext {
    /// The business day considered "today"
    pub today: NaiveDate,
}

impl FilterContext {
    pub fn new(today: NaiveDate) -> Self {
        Self { today }
    }
}

/// A predicate over a single source record.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum FilterPredicate {
    /// Accept every record
    #[default]
    Always,
    /// Field text equals a constant
    FieldEquals { field: FieldPath, value: String },
    /// Field text is one of the constants
    FieldIn { field: FieldPath, values: Vec<String> },
    /// Field holds a date equal to today
    DateIsToday { field: FieldPath },
    /// Field holds a date within `[today + from, today + to]` days
    DateWithinDays { field: FieldPath, from: i64, to: i64 },
    /// Every inner predicate holds
    All { predicates: Vec<FilterPredicate> },
    /// At least one inner predicate holds
    Any { predicates: Vec<FilterPredicate> },
    /// The inner predicate does not hold
    Not { predicate: Box<FilterPredicate> },
}

impl FilterPredicate {
    /// Convenience constructor for [`FilterPredicate::FieldEquals`].
    pub fn field_equals(field: impl Into<FieldPath>, value: impl Into<String>) -> Self {
        Self::FieldEquals {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Convenience constructor for [`FilterPredicate::DateIsToday`].
    pub fn date_is_today(field: impl Into<FieldPath>) -> Self {
        Self::DateIsToday {
            field: field.into(),
        }
    }

    /// Convenience constructor for [`FilterPredicate::All`].
    pub fn all(predicates: Vec<FilterPredicate>) -> Self {
        Self::All { predicates }
    }

    /// Evaluate the predicate. Missing fields never match.
    pub fn matches(&self, record: &SourceRecord, ctx: &FilterContext) -> bool {
        match self {
            Self::Always => true,
            Self::FieldEquals { field, value } => record.text(field).is_some_and(|v| v == *value),
            Self::FieldIn { field, values } => record
                .text(field)
                .is_some_and(|v| values.iter().any(|candidate| *candidate == v)),
            Self::DateIsToday { field } => record_date(record, field) == Some(ctx.today),
            Self::DateWithinDays { field, from, to } => {
                // A window edge outside the calendar matches nothing.
                let (Some(date), Some(start), Some(end)) = (
                    record_date(record, field),
                    shift_days(ctx.today, *from),
                    shift_days(ctx.today, *to),
                ) else {
                    return false;
                };
                start <= date && date <= end
            }
            Self::All { predicates } => predicates.iter().all(|p| p.matches(record, ctx)),
            Self::Any { predicates } => predicates.iter().any(|p| p.matches(record, ctx)),
            Self::Not { predicate } => !predicate.matches(record, ctx),
        }
    }

    /// Largest absolute day offset used by any date window in the predicate.
    pub fn max_day_offset(&self) -> i64 {
        match self {
            Self::DateWithinDays { from, to, .. } => from.saturating_abs().max(to.saturating_abs()),
            Self::All { predicates } | Self::Any { predicates } => predicates
                .iter()
                .map(FilterPredicate::max_day_offset)
                .max()
                .unwrap_or(0),
            Self::Not { predicate } => predicate.max_day_offset(),
            Self::Always
            | Self::FieldEquals { .. }
            | Self::FieldIn { .. }
            | Self::DateIsToday { .. } => 0,
        }
    }

    /// Keep only the records that match.
    pub fn retain(&self, records: Vec<SourceRecord>, ctx: &FilterContext) -> Vec<SourceRecord> {
        records
            .into_iter()
            .filter(|record| self.matches(record, ctx))
            .collect()
    }
}

fn record_date(record: &SourceRecord, field: &str) -> Option<NaiveDate> {
    record.text(field).as_deref().and_then(parse_date_prefix)
}

/// `date` moved by `days`, or `None` past the ends of the calendar.
pub fn shift_days(date: NaiveDate, days: i64) -> Option<NaiveDate> {
    Duration::try_days(days).and_then(|delta| date.checked_add_signed(delta))
}

/// Parse the leading `YYYY-MM-DD` of a date or timestamp string.
pub fn parse_date_prefix(value: &str) -> Option<NaiveDate> {
    let prefix = value.trim().get(..10)?;
    NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok()
}
