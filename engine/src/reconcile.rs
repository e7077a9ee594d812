//! Reconciliation of freshly projected records against the destination.
//!
//! Every fresh record is in one of two states:
//!
//! - **Exists**: its natural key is in the [`ReconciliationIndex`]. The old
//!   row is deleted and a new one created, so the row's creation time always
//!   reflects the latest sync. Rows are never updated in place.
//! - **New**: the key is absent and the record is created directly.
//!
//! Nothing compensates for a create that fails after its delete succeeded;
//! the record stays missing until the next run recreates it.

use crate::{DestinationRecord, NaturalKey, ReconciliationIndex, RowId};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Reconciliation state of one fresh record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RecordState {
    Exists,
    New,
}

/// A planned mutation of the destination table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum RecordAction {
    /// Create a row for a key not yet present
    Create { record: DestinationRecord },
    /// Delete `row_id`, then create a row with the fresh data
    #[serde(rename_all = "camelCase")]
    Replace {
        row_id: RowId,
        record: DestinationRecord,
    },
}

impl RecordAction {
    /// The record to be created.
    pub fn record(&self) -> &DestinationRecord {
        match self {
            RecordAction::Create { record } => record,
            RecordAction::Replace { record, .. } => record,
        }
    }

    pub fn natural_key(&self) -> &NaturalKey {
        &self.record().natural_key
    }

    /// Row to delete before creating, if any.
    pub fn stale_row(&self) -> Option<&RowId> {
        match self {
            RecordAction::Create { .. } => None,
            RecordAction::Replace { row_id, .. } => Some(row_id),
        }
    }

    pub fn state(&self) -> RecordState {
        match self {
            RecordAction::Create { .. } => RecordState::New,
            RecordAction::Replace { .. } => RecordState::Exists,
        }
    }
}

/// The ordered list of mutations for one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcilePlan {
    pub actions: Vec<RecordAction>,
    /// Fresh records dropped because a later record had the same key
    pub duplicates_dropped: usize,
}

impl ReconcilePlan {
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Number of rows the plan deletes.
    pub fn deletes(&self) -> usize {
        self.actions
            .iter()
            .filter(|a| a.state() == RecordState::Exists)
            .count()
    }
}

/// Result of executing one planned action.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionOutcome {
    pub deleted: bool,
    pub created: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ActionOutcome {
    pub fn created(deleted: bool) -> Self {
        Self {
            deleted,
            created: true,
            error: None,
        }
    }

    pub fn failed(deleted: bool, error: impl ToString) -> Self {
        Self {
            deleted,
            created: false,
            error: Some(error.to_string()),
        }
    }

    /// A delete that went through but whose create did not: the record is
    /// absent from the destination until the next run.
    pub fn lost_record(&self) -> bool {
        self.deleted && !self.created
    }
}

/// Plans mutations from an index of existing rows.
pub struct Reconciler<'a> {
    index: &'a ReconciliationIndex,
}

impl<'a> Reconciler<'a> {
    pub fn new(index: &'a ReconciliationIndex) -> Self {
        Self { index }
    }

    /// Build the plan for a set of fresh records.
    ///
    /// Records sharing a natural key are collapsed to the last one, keeping its
    /// position, so that at most one row per key exists afterwards.
    pub fn plan(&self, fresh: Vec<DestinationRecord>) -> ReconcilePlan {
        let total = fresh.len();
        let mut seen = HashSet::with_capacity(total);
        let mut kept: Vec<DestinationRecord> = fresh
            .into_iter()
            .rev()
            .filter(|record| seen.insert(record.natural_key.clone()))
            .collect();
        kept.reverse();

        let duplicates_dropped = total - kept.len();
        let actions = kept
            .into_iter()
            .map(|record| match self.index.get(&record.natural_key) {
                Some(row_id) => RecordAction::Replace {
                    row_id: row_id.clone(),
                    record,
                },
                None => RecordAction::Create { record },
            })
            .collect();

        ReconcilePlan {
            actions,
            duplicates_dropped,
        }
    }
}
