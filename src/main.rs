//! Flood Simulation Service - Main Daemon
//!
//! A server-side daemon that:
//! 1. Purges expired water levels and backfills recent history at startup
//! 2. Polls every gauge station's current water level on a fixed period
//! 3. Optionally serves terrain elevation and water level queries over HTTP
//!
//! Usage:
//!   cargo run --release                      # Ingestion only
//!   cargo run --release -- --endpoint 8080   # Ingestion + HTTP endpoint on port 8080
//!   cargo run --release -- --no-backfill     # Skip the startup backfill
//!
//! SIGINT or SIGTERM stops the endpoint and the poller.
//!
//! Environment:
//!   DATABASE_URL - PostgreSQL connection string
//!   RUST_LOG     - log filter, overrides [logging] level

use clap::Parser;
use floodsim_service::config::{DEFAULT_CONFIG_PATH, ServiceConfig};
use floodsim_service::daemon::{DaemonConfig, Poller, spawn_backfill};
use floodsim_service::db;
use floodsim_service::endpoint;
use floodsim_service::ingest::PegelOnlineClient;
use floodsim_service::logging;
use floodsim_service::shutdown::ShutdownSignal;
use floodsim_service::store::PgStore;
use floodsim_service::terrain::PostgisTerrain;
use std::path::PathBuf;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "floodsim_service", version, about = "Flood simulation backend service")]
struct Cli {
    /// Path to the configuration file (defaults apply when it is missing)
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Serve the HTTP query API on this port (overrides [endpoint] port)
    #[arg(long, value_name = "PORT")]
    endpoint: Option<u16>,

    /// Skip the startup purge and historical backfill
    #[arg(long)]
    no_backfill: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = ServiceConfig::load_or_default(&cli.config)?;
    if let Some(port) = cli.endpoint {
        config.endpoint.port = Some(port);
    }
    if cli.no_backfill {
        config.ingest.run_backfill = false;
    }

    logging::init(&config.logging.level);
    info!(config = %cli.config.display(), "Flood simulation service starting");

    // Validate provisioning once up front; every worker then opens its own
    // connection.
    let poller_client = db::connect_and_verify(db::REQUIRED_TABLES)?;
    info!("Database validated");

    let daemon_config = DaemonConfig::from(&config.ingest);
    let shutdown = ShutdownSignal::new();

    if let Err(e) = shutdown.cancel_on_os_signal() {
        error!(error = %e, "Failed to install signal handler");
    }

    if config.ingest.run_backfill {
        start_backfill(&config, daemon_config.retention_days);
    } else {
        info!("Startup backfill disabled");
    }

    let source = PegelOnlineClient::new(&config.source.base_url, config.source.timeout())?;
    let poller = Poller::new(
        PgStore::new(poller_client),
        source,
        daemon_config,
        shutdown.clone(),
    );
    let poller_handle = poller.spawn()?;

    match config.endpoint.port {
        Some(port) => {
            let store = PgStore::new(db::connect_with_validation()?);
            let terrain = PostgisTerrain::new(db::connect_with_validation()?, config.terrain.srid);

            if let Err(e) = endpoint::start_endpoint_server(
                &config.endpoint.bind,
                port,
                store,
                terrain,
                &shutdown,
            ) {
                error!(error = %e, "Endpoint server error");
            }

            // The endpoint is the foreground task; once it is gone, stop
            // polling too.
            shutdown.cancel();
        }
        None => {
            info!("HTTP endpoint disabled, running ingestion only");
            shutdown.wait();
        }
    }

    match poller_handle.join() {
        Ok(state) => info!(?state, "Polling worker finished"),
        Err(_) => error!("Polling worker panicked"),
    }

    Ok(())
}

/// Starts the detached backfill worker. Startup never waits for it and
/// shutdown does not join it, so a failure to set it up is only logged.
fn start_backfill(config: &ServiceConfig, retention_days: u32) {
    let client = match db::connect_with_validation() {
        Ok(client) => client,
        Err(e) => {
            error!(error = %e, "Backfill skipped: database connection failed");
            return;
        }
    };
    let source = match PegelOnlineClient::new(&config.source.base_url, config.source.timeout()) {
        Ok(source) => source,
        Err(e) => {
            error!(error = %e, "Backfill skipped: HTTP client setup failed");
            return;
        }
    };
    if let Err(e) = spawn_backfill(PgStore::new(client), source, retention_days) {
        error!(error = %e, "Backfill skipped: failed to spawn worker");
    }
}
