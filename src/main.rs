use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sbs1_web::Settings;
use tracing_subscriber::EnvFilter;

mod commands;

use commands::{handle_fix_flights, handle_migrate, handle_run_worker, handle_serve};

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[derive(Parser)]
#[command(name = "sbs1-web", version, about = "SBS-1 flight recorder and live map")]
struct Cli {
    /// PostgreSQL connection URL
    #[arg(long, env = "DATABASE_URL", global = true, hide_env_values = true)]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest an SBS-1 feed and record flights
    RunWorker {
        /// SBS-1 server hostname
        #[arg(long)]
        host: String,
        /// SBS-1 server port
        #[arg(long, default_value_t = 30003)]
        port: u16,
    },
    /// Serve the live map and /data.json
    Serve {
        /// Address to listen on
        #[arg(long, default_value = "0.0.0.0:5000")]
        bind: String,
    },
    /// Apply pending database migrations
    Migrate,
    /// Merge flights of the same aircraft that were split within the flight gap
    FixFlights {
        /// Report what would be merged without changing anything
        #[arg(long)]
        dry_run: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    let settings = Settings::from_env()?;
    let database_url = cli
        .database_url
        .context("DATABASE_URL must be set in the environment or with --database-url")?;

    match cli.command {
        Commands::RunWorker { host, port } => {
            handle_run_worker(settings, &database_url, host, port).await
        }
        Commands::Serve { bind } => handle_serve(settings, &database_url, &bind).await,
        Commands::Migrate => handle_migrate(&database_url).await,
        Commands::FixFlights { dry_run } => {
            handle_fix_flights(settings, &database_url, dry_run).await
        }
    }
}
