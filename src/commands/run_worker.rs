use anyhow::Result;
use sbs1_web::db::{create_pool, run_migrations};
use sbs1_web::sbs::SbsConnection;
use sbs1_web::tracking_repo::PgTrackingRepository;
use sbs1_web::{FlightAggregator, IngestWorker, Settings};
use tracing::info;

use super::{spawn_metrics_server, spawn_shutdown_handler};

pub async fn handle_run_worker(
    settings: Settings,
    database_url: &str,
    host: String,
    port: u16,
) -> Result<()> {
    info!(
        "Starting SBS-1 worker - server: {}:{}, flight gap: {}h",
        host, port, settings.flight_gap_hours
    );

    let shutdown = spawn_shutdown_handler();
    spawn_metrics_server(&settings, shutdown.clone())?;

    let pool = create_pool(database_url, 2)?;
    run_migrations(&pool).await?;

    let aggregator = FlightAggregator::new(settings.aggregator_config());
    let mut worker = IngestWorker::new(
        aggregator,
        PgTrackingRepository::new(pool),
        settings.flush_errors,
    );

    let Some(connection) =
        SbsConnection::connect(settings.client_config(host, port), shutdown.clone()).await
    else {
        info!("Shutdown requested before the feed was reached");
        return Ok(());
    };

    worker.run(connection).await?;

    let pending = worker.aggregator().pending_count();
    if pending > 0 {
        info!("Dropping incomplete telemetry for {} aircraft", pending);
    }

    Ok(())
}
