//! # Hostsync Engine
//!
//! Pure pipeline logic for mirroring vacation-rental data (reservations,
//! charges, calendars) into a spreadsheet-style record store.
//!
//! ## Design Principles
//!
//! - **No IO**: the engine never touches the network. Callers fetch, the
//!   engine decides.
//! - **No clock reads**: "today" and "now" are always passed in, so every
//!   function is deterministic.
//! - **Pipelines are data**: sync jobs are [`PipelineConfig`] values, not code.
//!
//! ## Pipeline Stages
//!
//! 1. **Fetch**: [`PageAccumulator`] drives offset pagination, stopping on the
//!    first short page and keeping partial results when a page fails.
//! 2. **Expand**: optional [`LookupJoin`] and [`FanOut`] stages enrich or
//!    replace fetched records.
//! 3. **Filter**: a [`FilterPredicate`] keeps business-relevant records.
//! 4. **Project**: a [`Projection`] maps each record to a
//!    [`DestinationRecord`] with a natural key.
//! 5. **Index**: a [`ReconciliationIndex`] maps natural keys of existing rows
//!    to their row ids.
//! 6. **Reconcile**: the [`Reconciler`] plans a delete-then-create for every
//!    known key and a create for every new one.
//!
//! Rollup pipelines instead aggregate a daily series with [`rollup::aggregate`]
//! and post a period total at most once.
//!
//! ## Quick Start
//!
//! ```rust
//! use hostsync_engine::{
//!     ColumnDef, DestinationRecord, FieldMapping, FilterContext, FilterPredicate, KeySpec,
//!     Projection, ReconciliationIndex, Reconciler, SourceRecord, TableSchema, INDEX_READ_CAP,
//! };
//! use chrono::NaiveDate;
//! use serde_json::json;
//!
//! // 1. Describe the destination table
//! let schema = TableSchema::new(vec![
//!     ColumnDef::new("charge_id", "Charge ID "),
//!     ColumnDef::new("amount", "Amount"),
//! ]);
//!
//! // 2. Filter and project source records
//! let ctx = FilterContext::new(NaiveDate::from_ymd_opt(2026, 10, 19).unwrap());
//! let filter = FilterPredicate::date_is_today("chargeDate");
//! let projection = Projection::new(
//!     KeySpec::single("id", "charge_id"),
//!     vec![FieldMapping::amount("amount", "amount")],
//! );
//!
//! let source = vec![
//!     SourceRecord::new(json!({"id": 1, "amount": 12.5, "chargeDate": "2026-10-19"})),
//!     SourceRecord::new(json!({"id": 2, "amount": 99, "chargeDate": "2026-10-18"})),
//! ];
//! let fresh: Vec<DestinationRecord> = filter
//!     .retain(source, &ctx)
//!     .iter()
//!     .filter_map(|r| projection.project(r).ok())
//!     .collect();
//! assert_eq!(fresh[0].fields["amount"], json!("12.50"));
//!
//! // 3. Plan against what the destination already holds
//! let index = ReconciliationIndex::build(&[], &schema, "charge_id", INDEX_READ_CAP);
//! let plan = Reconciler::new(&index).plan(fresh);
//! assert_eq!(plan.len(), 1);
//! assert_eq!(plan.deletes(), 0);
//! ```

pub mod error;
pub mod expand;
pub mod filter;
pub mod index;
pub mod page;
pub mod pipeline;
pub mod projection;
pub mod reconcile;
pub mod record;
pub mod rollup;
pub mod schema;
pub mod summary;

// Re-export main types at crate root
pub use error::Error;
pub use expand::{FanOut, LookupJoin, LookupTable};
pub use filter::{FilterContext, FilterPredicate};
pub use index::{ReconciliationIndex, INDEX_READ_CAP};
pub use page::{FetchOutcome, PageAccumulator, PageCursor, QueryParam, QueryValue};
pub use pipeline::{
    ApplyMode, DestinationSpec, PipelineConfig, PipelineKind, ReconcileSpec, RollupSpec,
    SourceSpec,
};
pub use projection::{format_amount, FieldKind, FieldMapping, KeySpec, Projection};
pub use reconcile::{ActionOutcome, ReconcilePlan, Reconciler, RecordAction, RecordState};
pub use record::{DestinationRecord, ExistingRow, SourceRecord};
pub use rollup::{Aggregate, Period, RollupPolicy};
pub use schema::{ColumnDef, TableSchema};
pub use summary::SyncSummary;

/// Type aliases for clarity
pub type NaturalKey = String;
pub type RowId = String;
pub type FieldPath = String;
pub type PipelineName = String;
