use anyhow::Result;
use sbs1_web::db::{create_pool, run_migrations};
use tracing::info;

pub async fn handle_migrate(database_url: &str) -> Result<()> {
    let pool = create_pool(database_url, 1)?;

    info!("Running database migrations...");
    let applied = run_migrations(&pool).await?;
    if applied == 0 {
        info!("Database schema is up to date");
    } else {
        info!("Applied {} migration(s)", applied);
    }

    Ok(())
}
