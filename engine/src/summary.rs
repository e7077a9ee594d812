//! Per-run summary.

use crate::reconcile::ActionOutcome;
use crate::PipelineName;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Counts and status of one pipeline run. Nothing outlives the run except
/// this value and the log lines derived from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncSummary {
    pub run_id: String,
    pub pipeline: PipelineName,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    /// Records returned by the source
    pub fetched: usize,
    /// Records that passed the filter
    pub filtered: usize,
    pub created: usize,
    pub deleted: usize,
    pub errors: usize,
    /// Source paging stopped early on a failure
    pub partial: bool,
    /// The index read hit its cap
    pub index_truncated: bool,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// When a rollup posted its total
    #[serde(skip_serializing_if = "Option::is_none")]
    pub posted_at: Option<DateTime<Utc>>,
    /// Formatted rollup total
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl SyncSummary {
    /// Start a summary for a run.
    pub fn start(
        run_id: impl Into<String>,
        pipeline: impl Into<PipelineName>,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            run_id: run_id.into(),
            pipeline: pipeline.into(),
            started_at,
            finished_at: None,
            fetched: 0,
            filtered: 0,
            created: 0,
            deleted: 0,
            errors: 0,
            partial: false,
            index_truncated: false,
            success: false,
            message: None,
            posted_at: None,
            value: None,
        }
    }

    /// Fold the outcome of one planned action into the counts.
    pub fn record_outcome(&mut self, outcome: &ActionOutcome) {
        if outcome.deleted {
            self.deleted += 1;
        }
        if outcome.created {
            self.created += 1;
        }
        if outcome.error.is_some() {
            self.errors += 1;
        }
    }

    /// Close the run. It succeeded if nothing failed and paging was complete.
    pub fn finish(mut self, finished_at: DateTime<Utc>) -> Self {
        self.finished_at = Some(finished_at);
        self.success = self.errors == 0 && !self.partial;
        self
    }

    /// Close the run as failed with a reason.
    pub fn fail(mut self, message: impl Into<String>, finished_at: DateTime<Utc>) -> Self {
        self.finished_at = Some(finished_at);
        self.success = false;
        self.message = Some(message.into());
        self
    }

    /// Builder-style method to attach a message.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Run duration in milliseconds, once finished.
    pub fn duration_ms(&self) -> Option<i64> {
        self.finished_at
            .map(|end| (end - self.started_at).num_milliseconds())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_792_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn outcomes_are_counted() {
        let mut summary = SyncSummary::start("run-1", "charges", at(0));
        summary.record_outcome(&ActionOutcome::created(false));
        summary.record_outcome(&ActionOutcome::created(true));
        summary.record_outcome(&ActionOutcome::failed(true, "HTTP 500"));
        summary.record_outcome(&ActionOutcome::failed(false, "HTTP 404"));

        assert_eq!(summary.created, 2);
        assert_eq!(summary.deleted, 2);
        assert_eq!(summary.errors, 2);

        let summary = summary.finish(at(3));
        assert!(!summary.success);
        assert_eq!(summary.duration_ms(), Some(3000));
    }

    #[test]
    fn clean_run_succeeds() {
        let summary = SyncSummary::start("run-1", "charges", at(0)).finish(at(1));
        assert!(summary.success);
    }

    #[test]
    fn partial_fetch_is_not_success() {
        let mut summary = SyncSummary::start("run-1", "charges", at(0));
        summary.partial = true;
        assert!(!summary.finish(at(1)).success);
    }

    #[test]
    fn fail_sets_message() {
        let summary = SyncSummary::start("run-1", "monthly-revenue", at(0))
            .fail("already posted for 2026-10", at(0) + Duration::milliseconds(5));

        assert!(!summary.success);
        assert_eq!(summary.message.as_deref(), Some("already posted for 2026-10"));
        assert_eq!(summary.duration_ms(), Some(5));
    }

    #[test]
    fn serialization_format() {
        let summary = SyncSummary::start("run-1", "charges", at(0)).finish(at(1));
        let json = serde_json::to_value(&summary).unwrap();

        assert_eq!(json["runId"], "run-1");
        assert_eq!(json["indexTruncated"], false);
        assert!(json.get("postedAt").is_none());
        assert!(json.get("message").is_none());
    }
}
