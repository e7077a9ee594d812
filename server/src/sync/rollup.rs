//! Period rollups posted from the daily revenue series.

use chrono::Utc;
use hostsync_engine::rollup::{
    aggregate, already_posted, cooldown_remaining, dated_values, interval_from_secs,
};
use hostsync_engine::{format_amount, RollupSpec, SyncSummary};
use serde_json::{Map, Value};

use super::{RunInput, SyncContext};

pub(super) async fn run(
    spec: &RollupSpec,
    ctx: &SyncContext,
    input: RunInput,
    mut summary: SyncSummary,
) -> SyncSummary {
    // Handed back unchanged unless this run posts.
    summary.posted_at = input.last_posted_at;

    let Some(store) = ctx.destination.as_deref() else {
        return summary.fail("destination store not configured", Utc::now());
    };

    if let Some(secs) = spec.min_interval_secs {
        let min_interval = interval_from_secs(secs);
        if let Some(remaining) = cooldown_remaining(input.last_posted_at, input.now, min_interval)
        {
            tracing::info!(
                remaining_secs = remaining.num_seconds(),
                "posted recently, skipping"
            );
            return summary.fail(
                format!("cooldown: next post allowed in {}s", remaining.num_seconds()),
                Utc::now(),
            );
        }
    }

    // The period before today's is the latest one with every day recorded.
    let Some(target) = spec.period.last_completed(input.today) else {
        return summary.fail(
            format!("no completed period before {}", input.today),
            Utc::now(),
        );
    };
    let period_key = spec.period.key(target);

    let rows = match store.list_records(&spec.source_table_id, spec.read_cap).await {
        Ok(rows) => rows,
        Err(e) => {
            summary.errors += 1;
            return summary.fail(format!("could not read daily series: {e}"), Utc::now());
        }
    };
    summary.fetched = rows.len();

    let values = dated_values(
        &rows,
        &spec.source_schema,
        &spec.time_column,
        &spec.value_column,
        ctx.offset,
    );
    let Some(total) = aggregate(&values, spec.period, target, spec.policy) else {
        return summary.fail(format!("no daily records for {period_key}"), Utc::now());
    };
    summary.filtered = total.records_used;

    // At most one post per period. A failed check refuses to post.
    match store
        .list_records(&spec.destination.table_id, spec.destination.index_cap)
        .await
    {
        Ok(existing)
            if already_posted(
                &existing,
                &spec.destination.schema,
                &spec.period_column,
                &period_key,
            ) =>
        {
            tracing::info!(period = %period_key, "rollup already posted");
            return summary.fail(format!("already posted for {period_key}"), Utc::now());
        }
        Ok(_) => {}
        Err(e) => {
            summary.errors += 1;
            tracing::warn!(
                period = %period_key,
                error = %e,
                "could not check for an earlier post"
            );
            return summary.fail(
                format!("could not verify {period_key} is unposted: {e}"),
                Utc::now(),
            );
        }
    }

    let value = format_amount(total.value);
    let mut fields = Map::new();
    fields.insert(spec.period_column.clone(), Value::String(period_key.clone()));
    fields.insert(spec.value_target.clone(), Value::String(value.clone()));
    if let Some(target) = &spec.records_target {
        fields.insert(target.clone(), Value::from(total.records_used));
    }
    if let Some(target) = &spec.posted_at_target {
        fields.insert(target.clone(), Value::String(input.now.to_rfc3339()));
    }

    let fields = match spec.destination.schema.to_destination(&fields) {
        Ok(fields) => fields,
        Err(e) => {
            summary.errors += 1;
            return summary.fail(e.to_string(), Utc::now());
        }
    };

    match store.create_record(&spec.destination.table_id, fields).await {
        Ok(row_id) => {
            tracing::info!(
                period = %period_key,
                value = %value,
                row_id = %row_id,
                "rollup posted"
            );
            summary.created = 1;
            summary.posted_at = Some(input.now);
            summary.value = Some(value);
            summary.finish(Utc::now())
        }
        Err(e) => {
            summary.errors += 1;
            tracing::error!(period = %period_key, error = %e, "rollup post failed");
            summary.fail(format!("create failed: {e}"), Utc::now())
        }
    }
}
