use anyhow::{Context, Result};
use axum::{Router, routing::get};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Install the Prometheus recorder
/// Returns a handle that renders the current metrics for scraping
pub fn init_metrics() -> Result<PrometheusHandle> {
    PrometheusBuilder::new()
        .install_recorder()
        .context("Failed to install Prometheus recorder")
}

/// Initialize ingestion metrics to zero/default values
/// This ensures metrics always appear in Prometheus queries even if no events have occurred
pub fn initialize_ingest_metrics() {
    // Feed connection
    metrics::gauge!("sbs.connection.connected").set(0.0);
    metrics::counter!("sbs.connection.failed_total").absolute(0);
    metrics::counter!("sbs.connection.reconnected_total").absolute(0);
    metrics::counter!("sbs.bytes.received_total").absolute(0);
    metrics::counter!("sbs.lines.received_total").absolute(0);

    // Decoding
    metrics::counter!("sbs.decode.success_total").absolute(0);
    metrics::counter!("sbs.decode.ignored_total").absolute(0);
    metrics::counter!("sbs.decode.failed_total").absolute(0);

    // Aggregation
    metrics::gauge!("aggregator.pending_aircraft").set(0.0);
    metrics::counter!("aggregator.flush.success_total").absolute(0);
    metrics::counter!("aggregator.flush.failed_total").absolute(0);
    metrics::counter!("aggregator.aircraft.created_total").absolute(0);
    metrics::counter!("aggregator.flights.created_total").absolute(0);
}

/// Router exposing `/metrics` for a rendered handle
pub fn metrics_router(handle: PrometheusHandle) -> Router {
    Router::new().route(
        "/metrics",
        get(move || {
            let handle = handle.clone();
            async move { handle.render() }
        }),
    )
}

/// Serve `/metrics` on the given port until `shutdown` is cancelled
pub async fn start_metrics_server(
    handle: PrometheusHandle,
    port: u16,
    shutdown: CancellationToken,
) -> Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Starting metrics server on http://{}/metrics", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind metrics server to {}", addr))?;

    axum::serve(listener, metrics_router(handle))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .context("Metrics server failed")
}
