//! Source fetching: pagination, lookup joins and per-record fan-out.

use std::time::Duration;

use chrono::NaiveDate;
use futures::future::join_all;
use hostsync_engine::page::render_query;
use hostsync_engine::{
    FanOut, FetchOutcome, LookupTable, PageAccumulator, SourceRecord, SourceSpec,
};
use serde_json::Value;

use crate::clients::{ClientError, SourceApi};

/// Records gathered for one run.
#[derive(Debug, Default)]
pub struct SourceFetch {
    pub records: Vec<SourceRecord>,
    /// Error that cut paging short, for the main or the lookup endpoint
    pub error: Option<String>,
    /// Fan-out requests that failed or timed out
    pub child_errors: usize,
}

/// Fetch every page of an endpoint.
///
/// Stops after the first short page. A failed page ends paging and keeps
/// what was already fetched.
pub async fn fetch_all(
    source: &dyn SourceApi,
    endpoint: &str,
    query: &[(String, String)],
    page_size: usize,
) -> FetchOutcome<Value> {
    let mut pages = PageAccumulator::new(page_size);

    while let Some(cursor) = pages.next_cursor() {
        match source.fetch_page(endpoint, query, cursor).await {
            Ok(page) => {
                tracing::debug!(
                    endpoint,
                    offset = cursor.offset,
                    count = page.len(),
                    "page fetched"
                );
                pages.accept(page);
            }
            Err(e) => {
                tracing::warn!(
                    endpoint,
                    offset = cursor.offset,
                    error = %e,
                    "page fetch failed, keeping partial results"
                );
                pages.fail(e);
            }
        }
    }

    pages.finish()
}

/// Fetch a pipeline's source records, applying its lookup join and fan-out.
///
/// Every query is rendered before the first request; a date that cannot be
/// rendered fails the fetch without any call being made.
pub async fn fetch_source(
    source: &dyn SourceApi,
    spec: &SourceSpec,
    today: NaiveDate,
) -> hostsync_engine::error::Result<SourceFetch> {
    let query = render_query(&spec.query, today)?;
    let lookup_query = match &spec.lookup {
        Some(join) => render_query(&join.query, today)?,
        None => Vec::new(),
    };
    let fan_out_query = match &spec.fan_out {
        Some(fan_out) => render_query(&fan_out.query, today)?,
        None => Vec::new(),
    };

    let outcome = fetch_all(source, &spec.endpoint, &query, spec.page_size).await;

    let mut error = outcome.error;
    let mut records: Vec<SourceRecord> =
        outcome.items.into_iter().map(SourceRecord::new).collect();

    if let Some(join) = &spec.lookup {
        let lookup = fetch_all(source, &join.endpoint, &lookup_query, spec.page_size).await;
        if let Some(e) = lookup.error {
            error.get_or_insert(format!("lookup {}: {e}", join.endpoint));
        }

        let lookup_records = lookup.items.into_iter().map(SourceRecord::new).collect();
        let table = LookupTable::build(join, lookup_records);
        let mut matched = 0;
        for record in &mut records {
            if table.enrich(join, record) {
                matched += 1;
            }
        }
        tracing::debug!(
            endpoint = %join.endpoint,
            lookup_size = table.len(),
            matched,
            "lookup join applied"
        );
    }

    let mut child_errors = 0;
    if let Some(fan_out) = &spec.fan_out {
        let (children, failed) = expand(source, fan_out, &records, &fan_out_query).await;
        records = children;
        child_errors = failed;
    }

    Ok(SourceFetch {
        records,
        error,
        child_errors,
    })
}

/// Issue one child request per parent, all at once, each under the fan-out
/// timeout. Failed children contribute nothing and are counted.
async fn expand(
    source: &dyn SourceApi,
    fan_out: &FanOut,
    parents: &[SourceRecord],
    query: &[(String, String)],
) -> (Vec<SourceRecord>, usize) {
    let limit = Duration::from_secs(fan_out.timeout_secs);

    let requests = parents.iter().filter_map(|parent| {
        let endpoint = fan_out.endpoint_for(parent)?;
        Some(async move {
            let result = match tokio::time::timeout(limit, source.fetch(&endpoint, query)).await {
                Ok(result) => result,
                Err(_) => Err(ClientError::Timeout(fan_out.timeout_secs)),
            };
            (parent, endpoint, result)
        })
    });

    let mut children = Vec::new();
    let mut failed = 0;
    for (parent, endpoint, result) in join_all(requests).await {
        match result {
            Ok(values) => children.extend(fan_out.attach(parent, values)),
            Err(e) => {
                failed += 1;
                tracing::warn!(
                    endpoint = %endpoint,
                    error = %e,
                    "fan-out request failed, skipping"
                );
            }
        }
    }

    (children, failed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::testing::FakeSource;
    use hostsync_engine::{LookupJoin, QueryParam};
    use serde_json::json;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
    }

    fn numbered(count: usize) -> Vec<Value> {
        (0..count).map(|i| json!({"id": i})).collect()
    }

    #[tokio::test]
    async fn stops_after_short_page() {
        let source = FakeSource::new().with_records("/v1/charges", numbered(250));

        let outcome = fetch_all(&source, "/v1/charges", &[], 100).await;

        assert_eq!(outcome.items.len(), 250);
        assert_eq!(outcome.pages, 3);
        assert!(!outcome.is_partial());
        assert_eq!(
            source.calls(),
            vec!["/v1/charges@0", "/v1/charges@100", "/v1/charges@200"]
        );
    }

    #[tokio::test]
    async fn exact_multiple_needs_one_empty_page() {
        let source = FakeSource::new().with_records("/v1/charges", numbered(200));

        let outcome = fetch_all(&source, "/v1/charges", &[], 100).await;

        assert_eq!(outcome.items.len(), 200);
        assert_eq!(source.calls().len(), 3);
    }

    #[tokio::test]
    async fn failed_page_keeps_earlier_pages() {
        let source = FakeSource::new()
            .with_records("/v1/charges", numbered(350))
            .failing_from("/v1/charges", 200);

        let outcome = fetch_all(&source, "/v1/charges", &[], 100).await;

        assert_eq!(outcome.items.len(), 200);
        assert!(outcome.is_partial());
        assert_eq!(source.calls().len(), 3);
    }

    #[tokio::test]
    async fn lookup_join_attaches_fields() {
        let source = FakeSource::new()
            .with_records(
                "/v1/charges",
                vec![
                    json!({"id": 1, "listingMapId": 10}),
                    json!({"id": 2, "listingMapId": 20}),
                    json!({"id": 3, "listingMapId": 99}),
                ],
            )
            .with_records(
                "/v1/listings",
                vec![
                    json!({"id": 10, "countryCode": "AE"}),
                    json!({"id": 20, "countryCode": "GB"}),
                ],
            );

        let mut spec = SourceSpec::new("/v1/charges");
        spec.lookup = Some(LookupJoin {
            endpoint: "/v1/listings".into(),
            query: vec![],
            local_key: "listingMapId".into(),
            remote_key: "id".into(),
            attach_as: "listing".into(),
            fields: vec!["countryCode".into()],
        });

        let fetched = fetch_source(&source, &spec, today()).await.unwrap();

        assert!(fetched.error.is_none());
        assert_eq!(fetched.records[0].text("listing.countryCode").as_deref(), Some("AE"));
        assert_eq!(fetched.records[1].text("listing.countryCode").as_deref(), Some("GB"));
        assert!(fetched.records[2].get("listing").is_none());
    }

    #[tokio::test]
    async fn failed_lookup_marks_partial_and_leaves_records_bare() {
        let source = FakeSource::new()
            .with_records("/v1/charges", vec![json!({"id": 1, "listingMapId": 10})])
            .failing_from("/v1/listings", 0);

        let mut spec = SourceSpec::new("/v1/charges");
        spec.lookup = Some(LookupJoin {
            endpoint: "/v1/listings".into(),
            query: vec![],
            local_key: "listingMapId".into(),
            remote_key: "id".into(),
            attach_as: "listing".into(),
            fields: vec!["countryCode".into()],
        });

        let fetched = fetch_source(&source, &spec, today()).await.unwrap();

        assert_eq!(fetched.records.len(), 1);
        assert!(fetched.error.unwrap().starts_with("lookup /v1/listings"));
        assert!(fetched.records[0].get("listing").is_none());
    }

    #[tokio::test]
    async fn fan_out_replaces_parents_with_children() {
        let source = FakeSource::new()
            .with_records(
                "/v1/listings",
                vec![
                    json!({"id": 1, "name": "Marina"}),
                    json!({"id": 2, "name": "Creek"}),
                    json!({"name": "no id"}),
                ],
            )
            .with_records(
                "/v1/listings/1/calendar",
                vec![json!({"date": "2026-10-19"}), json!({"date": "2026-10-20"})],
            )
            .failing_from("/v1/listings/2/calendar", 0);

        let mut spec = SourceSpec::new("/v1/listings");
        spec.fan_out = Some(FanOut {
            endpoint: "/v1/listings/{id}/calendar".into(),
            parent_key: "id".into(),
            query: vec![
                QueryParam::relative_date("startDate", 0),
                QueryParam::relative_date("endDate", 30),
            ],
            carry: vec!["id".into(), "name".into()],
            attach_as: "listing".into(),
            timeout_secs: 15,
        });

        let fetched = fetch_source(&source, &spec, today()).await.unwrap();

        assert_eq!(fetched.records.len(), 2);
        assert_eq!(fetched.child_errors, 1);
        assert_eq!(fetched.records[0].text("listing.id").as_deref(), Some("1"));
        assert_eq!(fetched.records[1].text("listing.name").as_deref(), Some("Marina"));
    }

    #[tokio::test]
    async fn unrenderable_query_fails_before_any_request() {
        let source = FakeSource::new().with_records("/v1/reservations", numbered(3));
        let mut spec = SourceSpec::new("/v1/reservations");
        spec.query = vec![QueryParam::relative_date("arrivalEndDate", 10_000_000_000)];

        let result = fetch_source(&source, &spec, today()).await;

        assert!(result.is_err());
        assert!(source.calls().is_empty());
    }

    #[tokio::test]
    async fn slow_child_times_out() {
        let source = FakeSource::new()
            .with_records("/v1/listings", vec![json!({"id": 1}), json!({"id": 2})])
            .with_records("/v1/listings/1/calendar", vec![json!({"date": "2026-10-19"})])
            .with_records("/v1/listings/2/calendar", vec![json!({"date": "2026-10-19"})])
            .with_delay("/v1/listings/2/calendar", Duration::from_secs(3));

        let mut spec = SourceSpec::new("/v1/listings");
        spec.fan_out = Some(FanOut {
            endpoint: "/v1/listings/{id}/calendar".into(),
            parent_key: "id".into(),
            query: vec![],
            carry: vec!["id".into()],
            attach_as: "listing".into(),
            timeout_secs: 1,
        });

        let fetched = fetch_source(&source, &spec, today()).await.unwrap();

        assert_eq!(fetched.records.len(), 1);
        assert_eq!(fetched.child_errors, 1);
        assert!(fetched.error.is_none());
    }
}
