//! Performance benchmarks for hostsync-engine

use chrono::NaiveDate;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use hostsync_engine::{
    format_amount, ColumnDef, DestinationRecord, ExistingRow, FieldMapping, FilterContext,
    FilterPredicate, KeySpec, PipelineConfig, Projection, ReconciliationIndex, Reconciler,
    SourceRecord, TableSchema, INDEX_READ_CAP,
};
use serde_json::{json, Map};

fn schema() -> TableSchema {
    TableSchema::new(vec![
        ColumnDef::new("charge_id", "Charge ID "),
        ColumnDef::new("amount", "Amount"),
    ])
}

fn existing_rows(size: usize) -> Vec<ExistingRow> {
    (0..size)
        .map(|i| {
            let mut fields = Map::new();
            fields.insert("Charge ID ".into(), json!(i.to_string()));
            fields.insert("Amount".into(), json!("10.00"));
            ExistingRow::new(format!("rec{i}"), fields)
        })
        .collect()
}

fn fresh_records(size: usize) -> Vec<DestinationRecord> {
    (0..size)
        .map(|i| {
            let mut fields = Map::new();
            // Half of the keys already exist
            let key = (i * 2).to_string();
            fields.insert("charge_id".into(), json!(key));
            fields.insert("amount".into(), json!("12.00"));
            DestinationRecord::new(key, fields)
        })
        .collect()
}

fn source_records(size: usize) -> Vec<SourceRecord> {
    (0..size)
        .map(|i| {
            let country = if i % 3 == 0 { "GB" } else { "AE" };
            SourceRecord::new(json!({
                "id": i,
                "amount": i as f64 * 1.25,
                "chargeDate": "2026-10-19 09:30:00",
                "listing": {"countryCode": country}
            }))
        })
        .collect()
}

fn bench_index(c: &mut Criterion) {
    let mut group = c.benchmark_group("index");

    for size in [100, 500, INDEX_READ_CAP].iter() {
        group.bench_with_input(BenchmarkId::new("build", size), size, |b, &size| {
            let schema = schema();
            let rows = existing_rows(size);
            b.iter(|| {
                ReconciliationIndex::build(
                    black_box(&rows),
                    &schema,
                    "charge_id",
                    INDEX_READ_CAP,
                )
            })
        });
    }

    group.finish();
}

fn bench_reconciliation(c: &mut Criterion) {
    let mut group = c.benchmark_group("reconciliation");

    for size in [100, 500, INDEX_READ_CAP].iter() {
        group.bench_with_input(BenchmarkId::new("plan", size), size, |b, &size| {
            let schema = schema();
            let index =
                ReconciliationIndex::build(&existing_rows(size), &schema, "charge_id", size + 1);
            let fresh = fresh_records(size);
            b.iter(|| Reconciler::new(&index).plan(black_box(fresh.clone())))
        });
    }

    group.finish();
}

fn bench_filter_project(c: &mut Criterion) {
    let mut group = c.benchmark_group("filter_project");

    let ctx = FilterContext::new(NaiveDate::from_ymd_opt(2026, 10, 19).unwrap());
    let filter = FilterPredicate::all(vec![
        FilterPredicate::field_equals("listing.countryCode", "AE"),
        FilterPredicate::date_is_today("chargeDate"),
    ]);
    let projection = Projection::new(
        KeySpec::single("id", "charge_id"),
        vec![FieldMapping::amount("amount", "amount")],
    );

    group.bench_function("charges_1000", |b| {
        let source = source_records(1000);
        b.iter(|| {
            filter
                .retain(black_box(source.clone()), &ctx)
                .iter()
                .filter_map(|r| projection.project(r).ok())
                .count()
        })
    });

    group.bench_function("format_amount", |b| {
        b.iter(|| format_amount(black_box(1234.125)))
    });

    group.finish();
}

fn bench_serialization(c: &mut Criterion) {
    let mut group = c.benchmark_group("serialization");

    let pipeline = json!({
        "name": "charges",
        "kind": "reconcile",
        "source": {"endpoint": "/v1/guestPayments/charges"},
        "filter": {"type": "fieldEquals", "field": "listing.countryCode", "value": "AE"},
        "projection": {
            "key": {"fields": ["id"], "target": "charge_id"},
            "fields": [{"source": "amount", "target": "amount", "kind": "amount"}]
        },
        "destination": {
            "tableId": "tblCharges",
            "schema": {"columns": [
                {"canonical": "charge_id", "name": "Charge ID "},
                {"canonical": "amount", "name": "Amount"}
            ]}
        }
    });

    group.bench_function("pipeline_from_json", |b| {
        b.iter(|| serde_json::from_value::<PipelineConfig>(black_box(pipeline.clone())))
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_index,
    bench_reconciliation,
    bench_filter_project,
    bench_serialization,
);

criterion_main!(benches);
