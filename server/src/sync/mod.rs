//! Pipeline runner.
//!
//! [`run_sync`] executes one pipeline definition end to end and always
//! returns a [`SyncSummary`]; failures are reported in the summary, never
//! propagated.

pub mod apply;
pub mod fetch;
mod reconcile;
mod rollup;

#[cfg(test)]
pub mod testing;

use std::sync::Arc;

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use hostsync_engine::{PipelineConfig, PipelineKind, SyncSummary};
use tracing::Instrument;
use uuid::Uuid;

use crate::clients::hostaway::HostawayClientConfig;
use crate::clients::teable::TeableClientConfig;
use crate::clients::{DestinationStore, HostawayClient, SourceApi, TeableClient};
use crate::config::Config;

/// Clients and business settings shared by every run.
#[derive(Clone)]
pub struct SyncContext {
    /// `None` when no source credential is configured
    pub source: Option<Arc<dyn SourceApi>>,
    /// `None` when no destination credential is configured
    pub destination: Option<Arc<dyn DestinationStore>>,
    /// Business timezone offset
    pub offset: FixedOffset,
}

impl SyncContext {
    /// Build the production clients from configuration.
    pub fn from_config(config: &Config) -> Result<Self, reqwest::Error> {
        let source: Option<Arc<dyn SourceApi>> = match &config.hostaway_token {
            Some(token) => Some(Arc::new(HostawayClient::new(HostawayClientConfig {
                base_url: config.hostaway_base_url.clone(),
                token: token.clone(),
                timeout_secs: config.request_timeout_secs,
            })?)),
            None => None,
        };

        let destination: Option<Arc<dyn DestinationStore>> = match &config.teable_token {
            Some(token) => Some(Arc::new(TeableClient::new(TeableClientConfig {
                base_url: config.teable_base_url.clone(),
                token: token.clone(),
                timeout_secs: config.request_timeout_secs,
            })?)),
            None => None,
        };

        Ok(Self {
            source,
            destination,
            offset: config.business_offset,
        })
    }

    /// What is missing for a pipeline to run, if anything.
    fn missing(&self, needs_source: bool) -> Option<String> {
        let mut missing = Vec::new();
        if needs_source && self.source.is_none() {
            missing.push("source API");
        }
        if self.destination.is_none() {
            missing.push("destination store");
        }
        (!missing.is_empty()).then(|| format!("{} not configured", missing.join(" and ")))
    }
}

/// Per-call inputs. Nothing carries over between runs except what the
/// caller passes here.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunInput {
    pub now: DateTime<Utc>,
    /// Business date used by filters, query windows and periods
    pub today: NaiveDate,
    /// When the pipeline last posted, for rollup cooldowns
    pub last_posted_at: Option<DateTime<Utc>>,
}

impl RunInput {
    /// Inputs for a run at `now`, with "today" taken in the business timezone.
    pub fn at(now: DateTime<Utc>, offset: FixedOffset) -> Self {
        Self {
            now,
            today: now.with_timezone(&offset).date_naive(),
            last_posted_at: None,
        }
    }

    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = today;
        self
    }

    pub fn with_last_posted_at(mut self, last_posted_at: Option<DateTime<Utc>>) -> Self {
        self.last_posted_at = last_posted_at;
        self
    }
}

/// Run one pipeline.
pub async fn run_sync(
    pipeline: &PipelineConfig,
    ctx: &SyncContext,
    input: RunInput,
) -> SyncSummary {
    let summary = SyncSummary::start(Uuid::new_v4().to_string(), &pipeline.name, input.now);
    let span = tracing::info_span!("sync", pipeline = %pipeline.name, run_id = %summary.run_id);

    let summary = async move {
        let needs_source = matches!(pipeline.kind, PipelineKind::Reconcile(_));
        if let Some(missing) = ctx.missing(needs_source) {
            tracing::warn!(%missing, "skipping run");
            return summary.fail(missing, Utc::now());
        }

        match &pipeline.kind {
            PipelineKind::Reconcile(spec) => reconcile::run(spec, ctx, input, summary).await,
            PipelineKind::Rollup(spec) => rollup::run(spec, ctx, input, summary).await,
        }
    }
    .instrument(span)
    .await;

    log_summary(&summary);
    summary
}

fn log_summary(summary: &SyncSummary) {
    if summary.success {
        tracing::info!(
            pipeline = %summary.pipeline,
            run_id = %summary.run_id,
            fetched = summary.fetched,
            filtered = summary.filtered,
            created = summary.created,
            deleted = summary.deleted,
            errors = summary.errors,
            duration_ms = ?summary.duration_ms(),
            "sync run completed"
        );
    } else {
        tracing::warn!(
            pipeline = %summary.pipeline,
            run_id = %summary.run_id,
            fetched = summary.fetched,
            filtered = summary.filtered,
            created = summary.created,
            deleted = summary.deleted,
            errors = summary.errors,
            partial = summary.partial,
            message = ?summary.message,
            "sync run finished with problems"
        );
    }
}
