pub mod fix_flights;
pub mod migrate;
pub mod run_worker;
pub mod serve;

pub use fix_flights::handle_fix_flights;
pub use migrate::handle_migrate;
pub use run_worker::handle_run_worker;
pub use serve::handle_serve;

use anyhow::Result;
use sbs1_web::Settings;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, error, info};

/// Cancel the returned token on SIGTERM or Ctrl+C
pub(crate) fn spawn_shutdown_handler() -> CancellationToken {
    let shutdown = CancellationToken::new();
    let token = shutdown.clone();

    tokio::spawn(async move {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{SignalKind, signal};

            let mut sigterm = match signal(SignalKind::terminate()) {
                Ok(sigterm) => sigterm,
                Err(err) => {
                    error!("Failed to register SIGTERM handler: {}", err);
                    return;
                }
            };

            tokio::select! {
                _ = sigterm.recv() => {
                    info!("Received SIGTERM, shutting down...");
                }
                result = tokio::signal::ctrl_c() => {
                    if let Err(err) = result {
                        error!("Failed to listen for SIGINT signal: {}", err);
                        return;
                    }
                    info!("Received SIGINT (Ctrl+C), shutting down...");
                }
            }
        }

        #[cfg(not(unix))]
        {
            if let Err(err) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for SIGINT signal: {}", err);
                return;
            }
            info!("Received SIGINT (Ctrl+C), shutting down...");
        }

        token.cancel();
    });

    shutdown
}

/// Start the Prometheus exporter when a metrics port is configured
pub(crate) fn spawn_metrics_server(settings: &Settings, shutdown: CancellationToken) -> Result<()> {
    let Some(port) = settings.metrics_port else {
        return Ok(());
    };

    let handle = sbs1_web::metrics::init_metrics()?;
    // Register metrics before the first scrape can happen
    sbs1_web::metrics::initialize_ingest_metrics();

    tokio::spawn(
        async move {
            if let Err(e) = sbs1_web::metrics::start_metrics_server(handle, port, shutdown).await {
                error!("{:#}", e);
            }
        }
        .instrument(tracing::info_span!("metrics_server")),
    );

    Ok(())
}
