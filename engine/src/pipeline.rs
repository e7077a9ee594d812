//! Pipeline definitions.
//!
//! A pipeline is plain data: where to read, what to keep, how to shape it and
//! where to write it. Every sync job is an instance of one of two kinds:
//!
//! - [`PipelineKind::Reconcile`]: fetch → filter → project → diff → apply.
//! - [`PipelineKind::Rollup`]: read a daily table → aggregate a period → post once.

use crate::expand::{FanOut, LookupJoin};
use crate::page::{QueryParam, DEFAULT_PAGE_SIZE};
use crate::rollup::{Period, RollupPolicy};
use crate::{
    error::Result, Error, FilterPredicate, PipelineName, Projection, TableSchema, INDEX_READ_CAP,
};
use serde::{Deserialize, Serialize};

/// Largest day offset a query date or filter window may use.
pub const MAX_DAY_OFFSET: i64 = 36_600;

/// Largest rollup cooldown accepted, one leap year.
pub const MAX_MIN_INTERVAL_SECS: u64 = 366 * 24 * 3600;

/// How destination mutations are issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ApplyMode {
    /// One record at a time, in plan order
    #[default]
    Sequential,
    /// All records at once; each record's delete still precedes its create
    Concurrent,
}

/// Where source records come from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceSpec {
    /// Paginated endpoint path, e.g. `/v1/reservations`
    pub endpoint: String,
    #[serde(default)]
    pub query: Vec<QueryParam>,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    /// Fields joined in from a lookup endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lookup: Option<LookupJoin>,
    /// Per-record child endpoint replacing each fetched record
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fan_out: Option<FanOut>,
}

fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

fn default_index_cap() -> usize {
    INDEX_READ_CAP
}

impl SourceSpec {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            query: Vec::new(),
            page_size: DEFAULT_PAGE_SIZE,
            lookup: None,
            fan_out: None,
        }
    }
}

/// A destination table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DestinationSpec {
    pub table_id: String,
    pub schema: TableSchema,
    /// Maximum rows read for the reconciliation index
    #[serde(default = "default_index_cap")]
    pub index_cap: usize,
    #[serde(default)]
    pub apply_mode: ApplyMode,
}

impl DestinationSpec {
    pub fn new(table_id: impl Into<String>, schema: TableSchema) -> Self {
        Self {
            table_id: table_id.into(),
            schema,
            index_cap: INDEX_READ_CAP,
            apply_mode: ApplyMode::Sequential,
        }
    }
}

/// Fetch → filter → project → reconcile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileSpec {
    pub source: SourceSpec,
    #[serde(default)]
    pub filter: FilterPredicate,
    pub projection: Projection,
    pub destination: DestinationSpec,
}

/// Daily table → period total.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RollupSpec {
    /// Table holding the daily series
    pub source_table_id: String,
    pub source_schema: TableSchema,
    /// Canonical timestamp column of the daily table
    pub time_column: String,
    /// Canonical value column of the daily table
    pub value_column: String,
    /// Maximum daily rows read
    #[serde(default = "default_index_cap")]
    pub read_cap: usize,
    pub period: Period,
    #[serde(default)]
    pub policy: RollupPolicy,
    /// Table receiving the period totals
    pub destination: DestinationSpec,
    /// Canonical column holding the period key in the rollup table
    pub period_column: String,
    /// Canonical column receiving the formatted total
    pub value_target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub records_target: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub posted_at_target: Option<String>,
    /// Minimum seconds between two posts of this pipeline
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_interval_secs: Option<u64>,
}

/// The two pipeline shapes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum PipelineKind {
    Reconcile(ReconcileSpec),
    Rollup(RollupSpec),
}

/// A named pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineConfig {
    pub name: PipelineName,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(flatten)]
    pub kind: PipelineKind,
}

impl PipelineConfig {
    pub fn reconcile(name: impl Into<PipelineName>, spec: ReconcileSpec) -> Self {
        Self {
            name: name.into(),
            description: None,
            kind: PipelineKind::Reconcile(spec),
        }
    }

    pub fn rollup(name: impl Into<PipelineName>, spec: RollupSpec) -> Self {
        Self {
            name: name.into(),
            description: None,
            kind: PipelineKind::Rollup(spec),
        }
    }

    /// Builder-style method to set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Short label of the pipeline kind.
    pub fn kind_name(&self) -> &'static str {
        match self.kind {
            PipelineKind::Reconcile(_) => "reconcile",
            PipelineKind::Rollup(_) => "rollup",
        }
    }

    /// Check internal consistency: schemas are valid and every column the
    /// pipeline reads or writes is declared.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(self.invalid("name must not be empty"));
        }

        match &self.kind {
            PipelineKind::Reconcile(spec) => self.validate_reconcile(spec),
            PipelineKind::Rollup(spec) => self.validate_rollup(spec),
        }
    }

    fn validate_reconcile(&self, spec: &ReconcileSpec) -> Result<()> {
        if spec.source.page_size == 0 {
            return Err(self.invalid("page size must be positive"));
        }
        if spec.projection.key.fields.is_empty() {
            return Err(self.invalid("natural key needs at least one field"));
        }
        if spec.destination.table_id.is_empty() {
            return Err(self.invalid("destination table id is empty"));
        }
        spec.destination.schema.validate()?;

        let lookup_query = spec.source.lookup.iter().flat_map(|join| &join.query);
        let fan_out_query = spec.source.fan_out.iter().flat_map(|fan_out| &fan_out.query);
        let widest_query = spec
            .source
            .query
            .iter()
            .chain(lookup_query)
            .chain(fan_out_query)
            .filter_map(QueryParam::day_offset)
            .map(i64::saturating_abs)
            .max()
            .unwrap_or(0);
        if widest_query > MAX_DAY_OFFSET {
            return Err(self.invalid("query date offset out of range"));
        }
        if spec.filter.max_day_offset() > MAX_DAY_OFFSET {
            return Err(self.invalid("filter date window out of range"));
        }

        for target in spec.projection.targets() {
            spec.destination.schema.destination_name(target)?;
        }
        Ok(())
    }

    fn validate_rollup(&self, spec: &RollupSpec) -> Result<()> {
        if spec.source_table_id.is_empty() || spec.destination.table_id.is_empty() {
            return Err(self.invalid("table ids must not be empty"));
        }
        if spec.min_interval_secs.is_some_and(|secs| secs > MAX_MIN_INTERVAL_SECS) {
            return Err(self.invalid("minimum post interval out of range"));
        }
        spec.source_schema.validate()?;
        spec.destination.schema.validate()?;

        spec.source_schema.destination_name(&spec.time_column)?;
        spec.source_schema.destination_name(&spec.value_column)?;

        let written = [Some(&spec.period_column), Some(&spec.value_target)]
            .into_iter()
            .chain([spec.records_target.as_ref(), spec.posted_at_target.as_ref()])
            .flatten();
        for column in written {
            spec.destination.schema.destination_name(column)?;
        }
        Ok(())
    }

    fn invalid(&self, reason: &str) -> Error {
        Error::InvalidPipeline {
            pipeline: self.name.clone(),
            reason: reason.to_string(),
        }
    }
}
