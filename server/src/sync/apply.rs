//! Execution of reconcile plans against the destination store.

use futures::future::join_all;
use hostsync_engine::{ActionOutcome, ApplyMode, DestinationSpec, ReconcilePlan, RecordAction};

use crate::clients::DestinationStore;

/// Execute every planned action.
///
/// `Sequential` applies one record at a time in plan order. `Concurrent`
/// issues all records together; each record's delete still precedes its
/// create.
pub async fn apply_plan(
    store: &dyn DestinationStore,
    destination: &DestinationSpec,
    plan: &ReconcilePlan,
) -> Vec<ActionOutcome> {
    match destination.apply_mode {
        ApplyMode::Sequential => {
            let mut outcomes = Vec::with_capacity(plan.len());
            for action in &plan.actions {
                outcomes.push(apply_action(store, destination, action).await);
            }
            outcomes
        }
        ApplyMode::Concurrent => {
            join_all(
                plan.actions
                    .iter()
                    .map(|action| apply_action(store, destination, action)),
            )
            .await
        }
    }
}

/// Delete the stale row, if any, then create the fresh one.
///
/// A failed delete skips the create so the old row survives. A failed create
/// after a successful delete leaves the record absent until the next run.
pub async fn apply_action(
    store: &dyn DestinationStore,
    destination: &DestinationSpec,
    action: &RecordAction,
) -> ActionOutcome {
    let table = destination.table_id.as_str();
    let key = action.natural_key();

    let fields = match destination.schema.to_destination(&action.record().fields) {
        Ok(fields) => fields,
        Err(e) => {
            tracing::error!(key = %key, error = %e, "record does not fit destination schema");
            return ActionOutcome::failed(false, e);
        }
    };

    let mut deleted = false;
    if let Some(row_id) = action.stale_row() {
        if let Err(e) = store.delete_record(table, row_id).await {
            tracing::error!(
                key = %key,
                row_id = %row_id,
                error = %e,
                "delete failed, keeping existing row"
            );
            return ActionOutcome::failed(false, e);
        }
        deleted = true;
    }

    match store.create_record(table, fields).await {
        Ok(row_id) => {
            tracing::debug!(key = %key, row_id = %row_id, replaced = deleted, "record written");
            ActionOutcome::created(deleted)
        }
        Err(e) if deleted => {
            tracing::error!(
                key = %key,
                error = %e,
                "create failed after delete, record missing until next run"
            );
            ActionOutcome::failed(true, e)
        }
        Err(e) => {
            tracing::error!(key = %key, error = %e, "create failed");
            ActionOutcome::failed(false, e)
        }
    }
}
