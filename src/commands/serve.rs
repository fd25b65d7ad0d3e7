use anyhow::Result;
use sbs1_web::Settings;
use sbs1_web::db::{create_pool, run_migrations};
use sbs1_web::flight_positions_repo::FlightPositionsRepository;
use sbs1_web::web::{AppState, start_web_server};
use tracing::info;

use super::{spawn_metrics_server, spawn_shutdown_handler};

pub async fn handle_serve(settings: Settings, database_url: &str, bind: &str) -> Result<()> {
    info!("Starting web server \"{}\" on {}", settings.title, bind);

    let shutdown = spawn_shutdown_handler();
    spawn_metrics_server(&settings, shutdown.clone())?;

    let pool = create_pool(database_url, 10)?;
    run_migrations(&pool).await?;

    let state = AppState::new(
        FlightPositionsRepository::new(pool),
        &settings.title,
        settings.aircraft_seen_gap(),
    );

    start_web_server(bind, state, shutdown).await
}
