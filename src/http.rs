//! HTTP server for the Prometheus metrics endpoint.
//!
//! Runs on a separate tokio task and serves `/metrics` for scraping.

use axum::{Router, routing::get};
use std::net::SocketAddr;

/// Handler for GET /metrics.
async fn metrics_handler() -> String {
    crate::metrics::gather_metrics()
}

/// Serve `/metrics` on `0.0.0.0:port` until the process exits.
pub async fn run_http_server(port: u16) {
    let app = Router::new().route("/metrics", get(metrics_handler));

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(%addr, error = %e, "Failed to bind metrics server");
            return;
        }
    };
    tracing::info!(%addr, "Prometheus metrics server listening");

    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!(error = %e, "Metrics server error");
    }
}

/// Spawn the metrics server unless `port` is 0.
pub fn spawn_metrics(port: u16) {
    if port == 0 {
        return;
    }
    crate::metrics::init();
    tokio::spawn(run_http_server(port));
}
