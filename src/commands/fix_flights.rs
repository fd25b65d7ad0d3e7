use anyhow::Result;
use sbs1_web::Settings;
use sbs1_web::db::{create_pool, run_migrations};
use sbs1_web::flights_repo::FlightsRepository;
use tracing::{info, warn};

pub async fn handle_fix_flights(settings: Settings, database_url: &str, dry_run: bool) -> Result<()> {
    let pool = create_pool(database_url, 2)?;
    run_migrations(&pool).await?;

    info!(
        "Merging flights split within {}h of each other{}",
        settings.flight_gap_hours,
        if dry_run { " (dry run)" } else { "" }
    );

    let stats = FlightsRepository::new(pool)
        .merge_split_flights(settings.flight_gap(), dry_run)
        .await?;

    info!(
        "{} aircraft examined, {} merged: {} flights kept, {} flights merged, {} positions moved",
        stats.aircraft_examined,
        stats.aircraft_merged,
        stats.flights_kept,
        stats.flights_merged,
        stats.positions_moved
    );
    if stats.errors > 0 {
        warn!("{} aircraft could not be merged", stats.errors);
    }

    Ok(())
}
