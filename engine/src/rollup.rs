//! Period rollups derived from a daily series already in the destination.
//!
//! Two aggregation policies exist for the same metric and are kept side by
//! side until the business rule is settled:
//!
//! - [`RollupPolicy::LatestValue`]: the value of the most recent record in the
//!   period.
//! - [`RollupPolicy::SumFromDayTwo`]: the sum of the period's records whose
//!   day of month is 2 or later.
//!
//! Runs post the most recently completed period, so a total is only ever
//! computed over a full month or quarter. A period is posted at most once.
//! The guard is a read of the rollup table before posting, not a
//! constraint, so two concurrent runs can both post.

use crate::record::{value_number, value_text};
use crate::{error::Result, Error, ExistingRow, TableSchema};
use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Granularity of a rollup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Period {
    Month,
    Quarter,
}

impl Period {
    /// Key identifying the period containing `date`: `2026-10` or `2026-Q4`.
    pub fn key(&self, date: NaiveDate) -> String {
        match self {
            Period::Month => format!("{:04}-{:02}", date.year(), date.month()),
            Period::Quarter => format!("{:04}-Q{}", date.year(), quarter_of(date)),
        }
    }

    /// Whether `date` falls in the same period as `anchor`.
    pub fn contains(&self, anchor: NaiveDate, date: NaiveDate) -> bool {
        match self {
            Period::Month => anchor.year() == date.year() && anchor.month() == date.month(),
            Period::Quarter => {
                anchor.year() == date.year() && quarter_of(anchor) == quarter_of(date)
            }
        }
    }

    /// First day of the period containing `date`.
    pub fn start(&self, date: NaiveDate) -> Option<NaiveDate> {
        let month = match self {
            Period::Month => date.month(),
            Period::Quarter => (quarter_of(date) - 1) * 3 + 1,
        };
        NaiveDate::from_ymd_opt(date.year(), month, 1)
    }

    /// Last day of the period before the one containing `today`.
    pub fn last_completed(&self, today: NaiveDate) -> Option<NaiveDate> {
        self.start(today)?.pred_opt()
    }
}

fn quarter_of(date: NaiveDate) -> u32 {
    (date.month() - 1) / 3 + 1
}

/// How a period total is derived from the daily series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RollupPolicy {
    #[default]
    #[serde(rename = "latest")]
    LatestValue,
    #[serde(rename = "sum-from-day-two")]
    SumFromDayTwo,
}

impl FromStr for RollupPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "latest" => Ok(RollupPolicy::LatestValue),
            "sum-from-day-two" => Ok(RollupPolicy::SumFromDayTwo),
            other => Err(Error::UnknownPolicy(other.to_string())),
        }
    }
}

/// One point of the daily series.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DatedValue {
    pub at: NaiveDateTime,
    pub value: f64,
}

/// A computed period total.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Aggregate {
    pub period_key: String,
    pub value: f64,
    /// Number of daily records that contributed
    pub records_used: usize,
}

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y"];

/// Parse a timestamp column value into business-local time.
///
/// Values carrying an offset (RFC 3339) are converted to `offset`; naive
/// values are taken as already local. Bare dates map to midnight.
pub fn parse_timestamp(value: &str, offset: FixedOffset) -> Option<NaiveDateTime> {
    let value = value.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&offset).naive_local());
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(value, fmt).ok())
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// Extract the daily series from destination rows.
///
/// Rows whose timestamp cannot be parsed are skipped; a missing or non-numeric
/// value counts as zero.
pub fn dated_values(
    rows: &[ExistingRow],
    schema: &TableSchema,
    time_column: &str,
    value_column: &str,
    offset: FixedOffset,
) -> Vec<DatedValue> {
    rows.iter()
        .filter_map(|row| {
            let at = schema
                .read(&row.fields, time_column)
                .and_then(value_text)
                .and_then(|text| parse_timestamp(&text, offset))?;
            let value = schema
                .read(&row.fields, value_column)
                .and_then(value_number)
                .unwrap_or(0.0);
            Some(DatedValue { at, value })
        })
        .collect()
}

/// The most recent point. On equal timestamps the later entry wins.
pub fn select_latest(values: &[DatedValue]) -> Option<&DatedValue> {
    values.iter().fold(None, |latest: Option<&DatedValue>, v| match latest {
        Some(l) if l.at > v.at => Some(l),
        _ => Some(v),
    })
}

/// Aggregate the period containing `today` under `policy`.
///
/// Returns `None` when no record falls in the period (for `SumFromDayTwo`,
/// when no record qualifies).
pub fn aggregate(
    values: &[DatedValue],
    period: Period,
    today: NaiveDate,
    policy: RollupPolicy,
) -> Option<Aggregate> {
    let in_period: Vec<DatedValue> = values
        .iter()
        .copied()
        .filter(|v| period.contains(today, v.at.date()))
        .collect();

    let (value, records_used) = match policy {
        RollupPolicy::LatestValue => (select_latest(&in_period)?.value, 1),
        RollupPolicy::SumFromDayTwo => {
            let included: Vec<_> = in_period.iter().filter(|v| v.at.day() >= 2).collect();
            if included.is_empty() {
                return None;
            }
            (included.iter().map(|v| v.value).sum(), included.len())
        }
    };

    Some(Aggregate {
        period_key: period.key(today),
        value,
        records_used,
    })
}

/// Whether any rollup row already carries `period_key` as its period prefix.
pub fn already_posted(
    rows: &[ExistingRow],
    schema: &TableSchema,
    period_column: &str,
    period_key: &str,
) -> bool {
    rows.iter().any(|row| {
        schema
            .read(&row.fields, period_column)
            .and_then(value_text)
            .is_some_and(|value| value.trim().starts_with(period_key))
    })
}

/// Time left before another post is allowed, if any.
pub fn cooldown_remaining(
    last_posted_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    min_interval: Duration,
) -> Option<Duration> {
    let elapsed = now.signed_duration_since(last_posted_at?);
    if elapsed >= min_interval {
        return None;
    }
    Some(min_interval.checked_sub(&elapsed).unwrap_or(min_interval))
}

/// A configured interval in seconds, saturating at the largest duration.
pub fn interval_from_secs(secs: u64) -> Duration {
    i64::try_from(secs)
        .ok()
        .and_then(Duration::try_seconds)
        .unwrap_or(Duration::MAX)
}
