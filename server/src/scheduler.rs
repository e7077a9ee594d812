//! Fixed-interval runner for all loaded pipelines.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use hostsync_engine::{PipelineConfig, PipelineName, SyncSummary};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::sync::{run_sync, RunInput, SyncContext};
use crate::AppState;

/// Last post time per pipeline, owned by the scheduler loop.
pub type PostLog = HashMap<PipelineName, DateTime<Utc>>;

/// Start the scheduler, unless the interval is zero.
pub fn spawn(state: AppState) -> Option<JoinHandle<()>> {
    let secs = state.config.sync_interval_secs;
    if secs == 0 {
        tracing::info!("scheduler disabled");
        return None;
    }

    tracing::info!(
        interval_secs = secs,
        pipelines = state.pipelines.len(),
        "scheduler started"
    );
    Some(tokio::spawn(run(state, Duration::from_secs(secs))))
}

async fn run(state: AppState, period: Duration) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut posts = PostLog::new();

    loop {
        ticker.tick().await;
        run_all(&state.pipelines, &state.ctx, Utc::now(), &mut posts).await;
    }
}

/// Run every pipeline once, in order, carrying post times between ticks.
pub async fn run_all(
    pipelines: &[PipelineConfig],
    ctx: &SyncContext,
    now: DateTime<Utc>,
    posts: &mut PostLog,
) -> Vec<SyncSummary> {
    let mut summaries = Vec::with_capacity(pipelines.len());

    for pipeline in pipelines {
        let last_posted_at = posts.get(&pipeline.name).copied();
        let input = RunInput::at(now, ctx.offset).with_last_posted_at(last_posted_at);
        let summary = run_sync(pipeline, ctx, input).await;

        if let Some(posted_at) = summary.posted_at {
            posts.insert(pipeline.name.clone(), posted_at);
        }
        summaries.push(summary);
    }

    summaries
}
