//! Pagination state and query parameters for source fetches.
//!
//! The engine does not perform requests. [`PageAccumulator`] tracks what has
//! been fetched and decides whether another page is needed; the caller issues
//! the request for each cursor it hands out.
//!
//! Paging ends after the first page shorter than the page size (an empty page
//! included) or after the first failed page. A failure keeps everything
//! accumulated so far.

use crate::error::{Error, Result};
use crate::filter::shift_days;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Default number of records requested per page.
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// Position of one page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageCursor {
    pub offset: usize,
    pub limit: usize,
}

impl PageCursor {
    /// The first page. A zero page size is treated as one.
    pub fn first(limit: usize) -> Self {
        Self {
            offset: 0,
            limit: limit.max(1),
        }
    }

    /// The cursor following a page of `page_len` records, if any.
    pub fn next_after(&self, page_len: usize) -> Option<Self> {
        if page_len < self.limit {
            return None;
        }
        Some(Self {
            offset: self.offset + self.limit,
            limit: self.limit,
        })
    }
}

/// Collected result of a paginated fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchOutcome<T> {
    /// All records, in source order
    pub items: Vec<T>,
    /// Number of page requests issued, including a failed one
    pub pages: usize,
    /// Error that ended paging early
    pub error: Option<String>,
}

impl<T> FetchOutcome<T> {
    /// Whether paging stopped on a failure.
    pub fn is_partial(&self) -> bool {
        self.error.is_some()
    }
}

/// Accumulates pages until the end-of-data sentinel or a failure.
#[derive(Debug)]
pub struct PageAccumulator<T> {
    cursor: Option<PageCursor>,
    items: Vec<T>,
    pages: usize,
    error: Option<String>,
}

impl<T> PageAccumulator<T> {
    pub fn new(page_size: usize) -> Self {
        Self {
            cursor: Some(PageCursor::first(page_size)),
            items: Vec::new(),
            pages: 0,
            error: None,
        }
    }

    /// The next page to request, or `None` when paging is over.
    pub fn next_cursor(&self) -> Option<PageCursor> {
        self.cursor
    }

    /// Record a successfully fetched page.
    pub fn accept(&mut self, page: Vec<T>) {
        let Some(cursor) = self.cursor else {
            return;
        };
        self.pages += 1;
        self.cursor = cursor.next_after(page.len());
        self.items.extend(page);
    }

    /// Record a failed page request. Paging stops; accumulated items are kept.
    pub fn fail(&mut self, error: impl ToString) {
        if self.cursor.take().is_some() {
            self.pages += 1;
            self.error = Some(error.to_string());
        }
    }

    pub fn finish(self) -> FetchOutcome<T> {
        FetchOutcome {
            items: self.items,
            pages: self.pages,
            error: self.error,
        }
    }
}

/// Value of a query parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QueryValue {
    /// Sent as written
    Literal(String),
    /// Today's date shifted by a number of days, as `YYYY-MM-DD`
    #[serde(rename_all = "camelCase")]
    RelativeDate { today_offset_days: i64 },
}

/// A query parameter attached to source requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryParam {
    pub name: String,
    pub value: QueryValue,
}

impl QueryParam {
    pub fn literal(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: QueryValue::Literal(value.into()),
        }
    }

    pub fn relative_date(name: impl Into<String>, today_offset_days: i64) -> Self {
        Self {
            name: name.into(),
            value: QueryValue::RelativeDate { today_offset_days },
        }
    }

    /// Render the parameter against a business date. Fails when a relative
    /// date falls outside the calendar.
    pub fn render(&self, today: NaiveDate) -> Result<(String, String)> {
        let value = match &self.value {
            QueryValue::Literal(v) => v.clone(),
            QueryValue::RelativeDate { today_offset_days } => {
                shift_days(today, *today_offset_days)
                    .ok_or_else(|| Error::InvalidValue {
                        field: self.name.clone(),
                        reason: format!("today{today_offset_days:+} days is out of range"),
                    })?
                    .format("%Y-%m-%d")
                    .to_string()
            }
        };
        Ok((self.name.clone(), value))
    }

    /// Day offset of a relative date, if this is one.
    pub fn day_offset(&self) -> Option<i64> {
        match self.value {
            QueryValue::Literal(_) => None,
            QueryValue::RelativeDate { today_offset_days } => Some(today_offset_days),
        }
    }
}

/// Render query parameters against a business date.
pub fn render_query(params: &[QueryParam], today: NaiveDate) -> Result<Vec<(String, String)>> {
    params.iter().map(|p| p.render(today)).collect()
}
