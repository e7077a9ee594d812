//! Pipeline listing and on-demand runs.

use axum::{
    body::Bytes,
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, NaiveDate, Utc};
use hostsync_engine::SyncSummary;
use serde::{Deserialize, Serialize};

use crate::auth::AuthUser;
use crate::error::{AppError, Result};
use crate::sync::{run_sync, RunInput};
use crate::AppState;

/// Create sync routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/pipelines", get(list_pipelines))
        .route("/sync/{name}", post(trigger_sync))
}

/// One loaded pipeline.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineInfo {
    pub name: String,
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Optional body of `POST /sync/{name}`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SyncRequest {
    /// When the caller last saw this pipeline post
    pub last_posted_at: Option<DateTime<Utc>>,
    /// Business date override
    pub today: Option<NaiveDate>,
}

/// GET /pipelines - Names and kinds of loaded pipelines.
async fn list_pipelines(State(state): State<AppState>) -> Json<Vec<PipelineInfo>> {
    Json(
        state
            .pipelines
            .iter()
            .map(|p| PipelineInfo {
                name: p.name.clone(),
                kind: p.kind_name().to_string(),
                description: p.description.clone(),
            })
            .collect(),
    )
}

/// POST /sync/{name} - Run one pipeline now.
async fn trigger_sync(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(name): Path<String>,
    body: Bytes,
) -> Result<Json<SyncSummary>> {
    let request = if body.iter().all(u8::is_ascii_whitespace) {
        SyncRequest::default()
    } else {
        serde_json::from_slice::<SyncRequest>(&body)
            .map_err(|e| AppError::BadRequest(e.to_string()))?
    };

    let pipeline = state
        .pipelines
        .iter()
        .find(|p| p.name == name)
        .ok_or_else(|| AppError::NotFound(format!("Unknown pipeline: {name}")))?;

    let mut input = RunInput::at(Utc::now(), state.ctx.offset)
        .with_last_posted_at(request.last_posted_at);
    if let Some(today) = request.today {
        input = input.with_today(today);
    }

    tracing::info!(pipeline = %name, "on-demand run requested");
    let summary = run_sync(pipeline, &state.ctx, input).await;
    Ok(Json(summary))
}
