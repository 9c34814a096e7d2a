//! One-shot water level backfill.
//!
//! Runs the same purge + historical load the daemon performs at startup,
//! synchronously, then prints a per-run summary. Useful after an outage
//! longer than the service's own startup window, or to seed a fresh
//! database before the daemon is first started.
//!
//! Usage:
//!   cargo run --bin backfill
//!   cargo run --bin backfill -- --days 3
//!
//! Environment:
//!   DATABASE_URL - PostgreSQL connection string

use clap::Parser;
use floodsim_service::config::{DEFAULT_CONFIG_PATH, ServiceConfig};
use floodsim_service::daemon::run_backfill;
use floodsim_service::db;
use floodsim_service::ingest::PegelOnlineClient;
use floodsim_service::logging;
use floodsim_service::store::PgStore;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "backfill", about = "Purge expired water levels and reload recent history")]
struct Cli {
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Days of history to keep and load (overrides [ingest] retention_days)
    #[arg(long)]
    days: Option<u32>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = ServiceConfig::load_or_default(&cli.config)?;
    logging::init(&config.logging.level);

    let days = cli.days.unwrap_or(config.ingest.retention_days);
    if days == 0 {
        return Err("--days must be at least 1".into());
    }

    let mut store = PgStore::new(db::connect_and_verify(db::REQUIRED_TABLES)?);
    let source = PegelOnlineClient::new(&config.source.base_url, config.source.timeout())?;

    println!("Water level backfill ({} days)", days);
    println!("==============================\n");

    let report = run_backfill(&mut store, &source, days)?;
    report.log_summary();

    println!("Stations:          {}", report.stations);
    println!("  loaded:          {}", report.loaded);
    println!("  without data:    {}", report.empty);
    println!("  failed:          {}", report.failed);
    println!("Readings inserted: {}", report.inserted);
    println!("Readings purged:   {}", report.purged);

    if report.failed > 0 {
        return Err(format!("{} station(s) failed to save", report.failed).into());
    }
    Ok(())
}
