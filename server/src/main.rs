//! Hostsync Server - mirrors Hostaway data into Teable tables.
//!
//! Runs every loaded pipeline on a fixed interval and exposes an HTTP trigger
//! for on-demand runs. Pipeline logic lives in hostsync-engine; this crate
//! does the IO.

mod auth;
mod catalog;
mod clients;
mod config;
mod error;
mod routes;
mod scheduler;
mod sync;

use crate::config::Config;
use crate::sync::SyncContext;
use axum::Router;
use hostsync_engine::PipelineConfig;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub pipelines: Arc<Vec<PipelineConfig>>,
    pub ctx: SyncContext,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "hostsync_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    tracing::info!("Starting Hostsync Server on {}:{}", config.host, config.port);

    let ctx = SyncContext::from_config(&config)?;
    if ctx.source.is_none() {
        tracing::warn!("HOSTAWAY_TOKEN not set, reconcile pipelines will not run");
    }
    if ctx.destination.is_none() {
        tracing::warn!("TEABLE_TOKEN not set, no pipeline will run");
    }

    let pipelines = catalog::load(&config)?;
    tracing::info!(
        pipelines = ?pipelines.iter().map(|p| p.name.as_str()).collect::<Vec<_>>(),
        "pipelines loaded"
    );

    // Build application state
    let state = AppState {
        config: Arc::new(config.clone()),
        pipelines: Arc::new(pipelines),
        ctx,
    };

    scheduler::spawn(state.clone());

    // Build router
    let app = Router::new()
        .merge(routes::create_routes())
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state);

    // Start server
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
