//! HTTP exposition server for the Airthings exporter
//!
//! Every `GET /metrics` runs one scrape against the Airthings API and
//! renders the result together with the exporter's own metrics.

mod api;

use airthings_cloud::CollectionPipeline;
use airthings_core::{SharedStats, WebSettings};
use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

/// Content type of the Prometheus text exposition format
pub const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Shared application state
pub struct AppState {
    pub pipeline: Arc<CollectionPipeline>,
    pub stats: SharedStats,
}

impl AppState {
    pub fn new(pipeline: Arc<CollectionPipeline>, stats: SharedStats) -> Self {
        Self { pipeline, stats }
    }
}

/// Build the router without binding a socket
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/metrics", get(api::get_metrics_prometheus))
        .route("/api/stats", get(api::get_stats))
        .route("/api/health", get(api::health_check))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Start the web server and serve until ctrl-c
pub async fn start_server(
    settings: &WebSettings,
    pipeline: Arc<CollectionPipeline>,
    stats: SharedStats,
) -> anyhow::Result<()> {
    let app = router(Arc::new(AppState::new(pipeline, stats)));

    let addr = settings.listen_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Serving metrics at http://{}/metrics", addr);
    info!("  - Exporter stats at /api/stats");
    info!("  - Health check at /api/health");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Web server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        // No signal handler available; serve until the process is killed
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
