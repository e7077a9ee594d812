//! Built-in pipeline definitions and the optional pipelines file.
//!
//! Every sync job is a [`PipelineConfig`] value. The built-ins cover the
//! Hostaway charges, reservations and calendar feeds plus the revenue
//! rollups; more can be supplied as a JSON array in `PIPELINES_FILE`.

use std::path::Path;

use hostsync_engine::{
    ApplyMode, ColumnDef, DestinationSpec, FanOut, FieldKind, FieldMapping, FilterPredicate,
    KeySpec, LookupJoin, Period, PipelineConfig, Projection, QueryParam, ReconcileSpec,
    RollupPolicy, RollupSpec, SourceSpec, TableSchema,
};

use crate::config::{Config, ConfigError};

/// Business country for every filtered feed.
const COUNTRY_CODE: &str = "AE";

/// Days of calendar fetched ahead of today.
const CALENDAR_WINDOW_DAYS: i64 = 30;

/// Minimum spacing between two rollup posts.
const ROLLUP_MIN_INTERVAL_SECS: u64 = 3600;

/// Load the built-ins for configured tables plus the pipelines file.
///
/// File entries replace built-ins of the same name. Every pipeline is
/// validated before it is returned.
pub fn load(config: &Config) -> Result<Vec<PipelineConfig>, ConfigError> {
    let mut pipelines = builtin(config);

    if let Some(path) = &config.pipelines_file {
        for extra in load_file(path)? {
            pipelines.retain(|p| p.name != extra.name);
            pipelines.push(extra);
        }
    }

    for pipeline in &pipelines {
        pipeline.validate()?;
    }
    Ok(pipelines)
}

/// Parse a JSON array of pipeline definitions.
pub fn load_file(path: &Path) -> Result<Vec<PipelineConfig>, ConfigError> {
    let file_error = |reason: String| ConfigError::PipelinesFile {
        path: path.display().to_string(),
        reason,
    };

    let text = std::fs::read_to_string(path).map_err(|e| file_error(e.to_string()))?;
    serde_json::from_str(&text).map_err(|e| file_error(e.to_string()))
}

/// Built-in pipelines whose destination tables are configured.
pub fn builtin(config: &Config) -> Vec<PipelineConfig> {
    let tables = &config.tables;
    let mut pipelines = Vec::new();

    let mut add = |name: &str, table: &Option<String>, build: &dyn Fn(&str) -> PipelineConfig| {
        match table {
            Some(table_id) => pipelines.push(build(table_id.as_str())),
            None => tracing::warn!(
                pipeline = name,
                "destination table id not set, pipeline disabled"
            ),
        }
    };

    add("charges", &tables.charges, &charges);
    add("reservations", &tables.reservations, &reservations);
    add("listing-availability", &tables.availability, &listing_availability);

    // MONTHLY_ROLLUP_POLICY applies to the month only; quarters take the latest value.
    let monthly_policy = config.rollup_policy;
    if let Some(daily) = &tables.daily_revenue {
        add("monthly-revenue", &tables.monthly_revenue, &|table_id: &str| {
            revenue_rollup("monthly-revenue", Period::Month, daily, table_id, monthly_policy)
        });
        add("quarterly-revenue", &tables.quarterly_revenue, &|table_id: &str| {
            revenue_rollup(
                "quarterly-revenue",
                Period::Quarter,
                daily,
                table_id,
                RollupPolicy::LatestValue,
            )
        });
    } else {
        tracing::warn!("daily revenue table id not set, rollups disabled");
    }

    pipelines
}

fn listing_lookup() -> LookupJoin {
    LookupJoin {
        endpoint: "/v1/listings".to_string(),
        query: Vec::new(),
        local_key: "listingMapId".to_string(),
        remote_key: "id".to_string(),
        attach_as: "listing".to_string(),
        fields: vec!["countryCode".to_string(), "name".to_string()],
    }
}

fn in_country() -> FilterPredicate {
    FilterPredicate::field_equals("listing.countryCode", COUNTRY_CODE)
}

/// Today's guest charges on UAE listings.
pub fn charges(table_id: &str) -> PipelineConfig {
    let schema = TableSchema::new(vec![
        ColumnDef::new("charge_id", "Charge ID "),
        ColumnDef::new("reservation_id", "Reservation ID"),
        ColumnDef::new("listing", "Listing"),
        ColumnDef::new("title", "Title"),
        ColumnDef::new("amount", "Amount"),
        ColumnDef::new("currency", "Currency"),
        ColumnDef::new("status", "Status"),
        ColumnDef::new("payment_method", "Payment Method"),
        ColumnDef::new("charge_date", "Charge Date"),
    ]);

    let mut source = SourceSpec::new("/v1/guestPayments/charges");
    source.lookup = Some(listing_lookup());

    PipelineConfig::reconcile(
        "charges",
        ReconcileSpec {
            source,
            filter: FilterPredicate::all(vec![
                in_country(),
                FilterPredicate::date_is_today("chargeDate"),
            ]),
            projection: Projection::new(
                KeySpec::single("id", "charge_id"),
                vec![
                    FieldMapping::text("reservationId", "reservation_id"),
                    FieldMapping::text("listing.name", "listing"),
                    FieldMapping::text("title", "title"),
                    FieldMapping::amount("amount", "amount"),
                    FieldMapping::text("currency", "currency"),
                    FieldMapping::text("status", "status"),
                    FieldMapping::text("paymentMethod", "payment_method"),
                    FieldMapping::new("chargeDate", "charge_date", FieldKind::Date),
                ],
            ),
            destination: DestinationSpec::new(table_id, schema),
        },
    )
    .with_description("Today's guest charges on UAE listings")
}

/// Reservations arriving in the next month on UAE listings.
pub fn reservations(table_id: &str) -> PipelineConfig {
    let schema = TableSchema::new(vec![
        ColumnDef::new("reservation_id", "Reservation ID"),
        ColumnDef::new("listing", "Listing"),
        ColumnDef::new("guest", "Guest Name"),
        ColumnDef::new("channel", "Channel"),
        ColumnDef::new("arrival", "Arrival Date"),
        ColumnDef::new("departure", "Departure Date"),
        ColumnDef::new("nights", "Nights"),
        ColumnDef::new("total", "Total Price"),
        ColumnDef::new("currency", "Currency"),
        ColumnDef::new("status", "Status"),
    ]);

    let mut source = SourceSpec::new("/v1/reservations");
    source.query = vec![
        QueryParam::relative_date("arrivalStartDate", 0),
        QueryParam::relative_date("arrivalEndDate", CALENDAR_WINDOW_DAYS),
        QueryParam::literal("sortOrder", "arrivalDate"),
    ];
    source.lookup = Some(listing_lookup());

    PipelineConfig::reconcile(
        "reservations",
        ReconcileSpec {
            source,
            filter: in_country(),
            projection: Projection::new(
                KeySpec::single("id", "reservation_id"),
                vec![
                    FieldMapping::text("listing.name", "listing"),
                    FieldMapping::text("guestName", "guest"),
                    FieldMapping::text("channelName", "channel"),
                    FieldMapping::new("arrivalDate", "arrival", FieldKind::Date),
                    FieldMapping::new("departureDate", "departure", FieldKind::Date),
                    FieldMapping::new("nights", "nights", FieldKind::Number),
                    FieldMapping::amount("totalPrice", "total"),
                    FieldMapping::text("currency", "currency"),
                    FieldMapping::text("status", "status"),
                ],
            ),
            destination: DestinationSpec::new(table_id, schema),
        },
    )
    .with_description("Upcoming reservations on UAE listings")
}

/// Today's calendar entry for every UAE listing.
pub fn listing_availability(table_id: &str) -> PipelineConfig {
    let schema = TableSchema::new(vec![
        ColumnDef::new("key", "Key"),
        ColumnDef::new("listing_id", "Listing ID"),
        ColumnDef::new("listing", "Listing"),
        ColumnDef::new("date", "Date"),
        ColumnDef::new("available", "Available"),
        ColumnDef::new("price", "Price"),
        ColumnDef::new("minimum_stay", "Minimum Stay"),
        ColumnDef::new("status", "Status"),
    ]);

    let mut source = SourceSpec::new("/v1/listings");
    source.fan_out = Some(FanOut {
        endpoint: "/v1/listings/{id}/calendar".to_string(),
        parent_key: "id".to_string(),
        query: vec![
            QueryParam::relative_date("startDate", 0),
            QueryParam::relative_date("endDate", CALENDAR_WINDOW_DAYS),
        ],
        carry: vec!["id".to_string(), "name".to_string(), "countryCode".to_string()],
        attach_as: "listing".to_string(),
        timeout_secs: hostsync_engine::expand::DEFAULT_FAN_OUT_TIMEOUT_SECS,
    });

    let mut destination = DestinationSpec::new(table_id, schema);
    destination.apply_mode = ApplyMode::Concurrent;

    PipelineConfig::reconcile(
        "listing-availability",
        ReconcileSpec {
            source,
            filter: FilterPredicate::all(vec![
                in_country(),
                FilterPredicate::date_is_today("date"),
            ]),
            projection: Projection::new(
                KeySpec::composite(vec!["listing.id".to_string(), "date".to_string()], "key"),
                vec![
                    FieldMapping::text("listing.id", "listing_id"),
                    FieldMapping::text("listing.name", "listing"),
                    FieldMapping::new("date", "date", FieldKind::Date),
                    FieldMapping::new("isAvailable", "available", FieldKind::Raw),
                    FieldMapping::amount("price", "price"),
                    FieldMapping::new("minimumStay", "minimum_stay", FieldKind::Number),
                    FieldMapping::text("status", "status"),
                ],
            ),
            destination,
        },
    )
    .with_description("Today's availability per UAE listing")
}

/// Revenue total for the last completed month or quarter.
pub fn revenue_rollup(
    name: &str,
    period: Period,
    daily_table_id: &str,
    table_id: &str,
    policy: RollupPolicy,
) -> PipelineConfig {
    let source_schema = TableSchema::new(vec![
        ColumnDef::new("date_time", "Date and Time ").with_alias("Date and Time"),
        ColumnDef::new("revenue", "Total Revenue"),
    ]);

    let period_name = match period {
        Period::Month => "Month",
        Period::Quarter => "Quarter",
    };
    let schema = TableSchema::new(vec![
        ColumnDef::new("period", period_name),
        ColumnDef::new("revenue", "Total Revenue"),
        ColumnDef::new("records", "Records"),
        ColumnDef::new("posted_at", "Posted At"),
    ]);

    PipelineConfig::rollup(
        name,
        RollupSpec {
            source_table_id: daily_table_id.to_string(),
            source_schema,
            time_column: "date_time".to_string(),
            value_column: "revenue".to_string(),
            read_cap: hostsync_engine::INDEX_READ_CAP,
            period,
            policy,
            destination: DestinationSpec::new(table_id, schema),
            period_column: "period".to_string(),
            value_target: "revenue".to_string(),
            records_target: Some("records".to_string()),
            posted_at_target: Some("posted_at".to_string()),
            min_interval_secs: Some(ROLLUP_MIN_INTERVAL_SECS),
        },
    )
    .with_description(format!("{period_name}ly revenue from the daily series"))
}
