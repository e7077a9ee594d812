//! HTTP route definitions.

mod health;
mod sync;

use crate::AppState;
use axum::Router;

/// Create all application routes.
pub fn create_routes() -> Router<AppState> {
    Router::new().merge(health::routes()).merge(sync::routes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog;
    use crate::config::Config;
    use crate::sync::testing::{FakeSource, FakeStore};
    use crate::sync::SyncContext;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use chrono::FixedOffset;
    use http_body_util::BodyExt;
    use hostsync_engine::{ExistingRow, Period, RollupPolicy};
    use serde_json::{json, Map, Value};
    use std::sync::Arc;
    use tower::ServiceExt;

    fn state(auth_secret: Option<&str>, store: Arc<FakeStore>) -> AppState {
        let mut config = Config::from_lookup(|_| None).unwrap();
        config.auth_secret = auth_secret.map(str::to_string);

        AppState {
            config: Arc::new(config),
            pipelines: Arc::new(vec![
                catalog::charges("tblCharges"),
                catalog::revenue_rollup(
                    "monthly-revenue",
                    Period::Month,
                    "tblDaily",
                    "tblMonthly",
                    RollupPolicy::LatestValue,
                ),
            ]),
            ctx: SyncContext {
                source: Some(Arc::new(FakeSource::new())),
                destination: Some(store),
                offset: FixedOffset::east_opt(4 * 3600).unwrap(),
            },
        }
    }

    fn daily_store() -> Arc<FakeStore> {
        let mut fields = Map::new();
        fields.insert("Date and Time ".into(), json!("2026-10-18 21:00:00"));
        fields.insert("Total Revenue".into(), json!("1234.5"));
        Arc::new(FakeStore::new().with_rows("tblDaily", vec![ExistingRow::new("d1", fields)]))
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    fn post(uri: &str, body: &str) -> Request<Body> {
        Request::post(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn health_reports_pipelines() {
        let app = create_routes().with_state(state(None, Arc::new(FakeStore::new())));
        let (status, body) = send(app, Request::get("/health").body(Body::empty()).unwrap()).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["pipelines"], 2);
        assert_eq!(body["destinationConfigured"], true);
    }

    #[tokio::test]
    async fn lists_pipelines() {
        let app = create_routes().with_state(state(None, Arc::new(FakeStore::new())));
        let (status, body) =
            send(app, Request::get("/pipelines").body(Body::empty()).unwrap()).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["name"], "charges");
        assert_eq!(body[0]["kind"], "reconcile");
        assert_eq!(body[1]["kind"], "rollup");
    }

    #[tokio::test]
    async fn unknown_pipeline_is_404() {
        let app = create_routes().with_state(state(None, Arc::new(FakeStore::new())));
        let (status, body) = send(app, post("/sync/nope", "")).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Unknown pipeline: nope");
    }

    #[tokio::test]
    async fn trigger_runs_pipeline_and_returns_summary() {
        let store = daily_store();
        let app = create_routes().with_state(state(None, store.clone()));

        let (status, body) =
            send(app, post("/sync/monthly-revenue", r#"{"today": "2026-11-01"}"#)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["pipeline"], "monthly-revenue");
        assert_eq!(body["success"], true);
        assert_eq!(body["value"], "1234.50");
        assert!(body["postedAt"].is_string());
        assert_eq!(store.rows("tblMonthly")[0].fields["Month"], json!("2026-10"));
    }

    #[tokio::test]
    async fn second_trigger_in_same_month_is_refused() {
        let store = daily_store();
        let app = create_routes().with_state(state(None, store.clone()));
        let body = r#"{"today": "2026-11-12"}"#;

        send(app.clone(), post("/sync/monthly-revenue", body)).await;
        let (status, summary) = send(app, post("/sync/monthly-revenue", body)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(summary["success"], false);
        assert_eq!(summary["message"], "already posted for 2026-10");
        assert_eq!(store.creates(), 1);
    }

    #[tokio::test]
    async fn malformed_body_is_400() {
        let app = create_routes().with_state(state(None, Arc::new(FakeStore::new())));
        let (status, body) = send(app, post("/sync/charges", r#"{"today": "yesterday"}"#)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid request");
    }

    #[tokio::test]
    async fn trigger_requires_secret_when_configured() {
        let app = create_routes().with_state(state(Some("s3cret"), Arc::new(FakeStore::new())));

        let (status, _) = send(app.clone(), post("/sync/charges", "")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let authorized = Request::post("/sync/charges")
            .header(header::AUTHORIZATION, "Bearer s3cret")
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(app, authorized).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["pipeline"], "charges");
    }
}
