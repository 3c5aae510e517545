//! Status HTTP Server
//!
//! Optional Axum server exposing the collector's own health and metrics.
//!
//! # Endpoints
//!
//! - `GET /` - HTML landing page with links to metrics and health
//! - `GET /metrics` - Self metrics in Prometheus text format
//! - `GET /health` - 200 while the pipeline runs, 503 once shutdown has begun
//!
//! The server stops accepting connections when the shutdown signal fires.

use crate::config::ServerConfig;
use crate::metrics::MetricsCollector;
use crate::shutdown::Shutdown;
use anyhow::Context;
use axum::{
    extract::State,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use tokio::net::TcpListener;
use tracing::{error, info};

#[derive(Clone)]
struct AppState {
    metrics: MetricsCollector,
    shutdown: Shutdown,
}

/// Bind the listener up front so a taken port fails startup.
pub async fn bind(config: &ServerConfig) -> anyhow::Result<TcpListener> {
    let addr = format!("{}:{}", config.addr, config.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("could not bind status server to {}", addr))?;
    info!("Status server listening on {}", addr);
    Ok(listener)
}

pub fn router(metrics: MetricsCollector, shutdown: Shutdown) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/metrics", get(metrics_handler))
        .route("/health", get(health_handler))
        .with_state(AppState { metrics, shutdown })
}

/// Serve until shutdown.
pub async fn serve(
    listener: TcpListener,
    metrics: MetricsCollector,
    shutdown: Shutdown,
) -> anyhow::Result<()> {
    let app = router(metrics, shutdown.clone());

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.stopped().await })
        .await?;

    info!("Status server stopped");
    Ok(())
}

async fn root_handler() -> impl IntoResponse {
    axum::response::Html(
        r#"<html>
<head><title>tapmon</title></head>
<body>
<h1>Tapo Power Collector</h1>
<p><a href="/metrics">Metrics</a></p>
<p><a href="/health">Health</a></p>
</body>
</html>"#,
    )
}

async fn metrics_handler(State(state): State<AppState>) -> Response {
    match state.metrics.render() {
        Ok(metrics) => metrics.into_response(),
        Err(e) => {
            error!("Failed to render metrics: {}", e);
            (
                axum::http::StatusCode::INTERNAL_SERVER_ERROR,
                format!("Error rendering metrics: {}", e),
            )
                .into_response()
        }
    }
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    if state.shutdown.is_stopping() {
        (axum::http::StatusCode::SERVICE_UNAVAILABLE, "Shutting down")
    } else {
        (axum::http::StatusCode::OK, "OK")
    }
}
