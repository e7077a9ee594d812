//! Fetch → filter → project → reconcile runs.

use chrono::Utc;
use hostsync_engine::{
    DestinationSpec, FilterContext, ReconcileSpec, ReconciliationIndex, Reconciler, SyncSummary,
};

use super::{apply, fetch, RunInput, SyncContext};
use crate::clients::DestinationStore;

pub(super) async fn run(
    spec: &ReconcileSpec,
    ctx: &SyncContext,
    input: RunInput,
    mut summary: SyncSummary,
) -> SyncSummary {
    let (Some(source), Some(store)) = (ctx.source.as_deref(), ctx.destination.as_deref()) else {
        return summary.fail("clients not configured", Utc::now());
    };

    let fetched = match fetch::fetch_source(source, &spec.source, input.today).await {
        Ok(fetched) => fetched,
        Err(e) => {
            summary.errors += 1;
            tracing::warn!(error = %e, "source query could not be built");
            return summary.fail(format!("invalid source query: {e}"), Utc::now());
        }
    };
    summary.fetched = fetched.records.len();
    summary.errors += fetched.child_errors;
    if let Some(error) = fetched.error {
        summary.partial = true;
        summary.message = Some(format!("source fetch incomplete: {error}"));
    }

    let kept = spec
        .filter
        .retain(fetched.records, &FilterContext::new(input.today));
    summary.filtered = kept.len();

    let mut fresh = Vec::with_capacity(kept.len());
    for record in &kept {
        match spec.projection.project(record) {
            Ok(projected) => fresh.push(projected),
            Err(e) => {
                summary.errors += 1;
                tracing::warn!(error = %e, "dropping record without natural key");
            }
        }
    }

    let index = load_index(store, &spec.destination, &spec.projection.key.target).await;
    match &index {
        Some(index) => summary.index_truncated = index.possibly_truncated(),
        None => {
            summary.message.get_or_insert_with(|| {
                "existing rows unreadable, all records created as new".to_string()
            });
        }
    }
    let index = index.unwrap_or_else(ReconciliationIndex::empty);

    let plan = Reconciler::new(&index).plan(fresh);
    tracing::debug!(
        actions = plan.len(),
        replacements = plan.deletes(),
        duplicates_dropped = plan.duplicates_dropped,
        "reconcile plan ready"
    );

    for outcome in apply::apply_plan(store, &spec.destination, &plan).await {
        summary.record_outcome(&outcome);
    }

    summary.finish(Utc::now())
}

/// Read existing rows and index them by natural key. `None` when the read
/// fails; the caller then treats every record as new.
async fn load_index(
    store: &dyn DestinationStore,
    destination: &DestinationSpec,
    key_column: &str,
) -> Option<ReconciliationIndex> {
    let rows = match store
        .list_records(&destination.table_id, destination.index_cap)
        .await
    {
        Ok(rows) => rows,
        Err(e) => {
            tracing::warn!(
                table = %destination.table_id,
                error = %e,
                "could not read existing rows, treating every record as new"
            );
            return None;
        }
    };

    let index =
        ReconciliationIndex::build(&rows, &destination.schema, key_column, destination.index_cap);
    if index.possibly_truncated() {
        tracing::warn!(
            table = %destination.table_id,
            rows = index.rows_read(),
            cap = destination.index_cap,
            "index read hit its cap, rows beyond it will not be matched"
        );
    }
    Some(index)
}
