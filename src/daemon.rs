/// Ingestion workers for the water level service.
///
/// Two independent procedures over the same store and source interfaces:
/// 1. Startup backfill (one-shot): purge data past the retention horizon,
///    then load the horizon's worth of history for every station
/// 2. Recurring poll: after an initial delay, fetch every station's current
///    value on a fixed period until shutdown is requested
///
/// Each runs on its own thread with its own store handle. They coordinate
/// only through the store's unique key, so a backfill overlapping the first
/// poll is safe. Failures are contained per station and per cycle; nothing
/// here ends the process.

use crate::ingest::GaugeSource;
use crate::model::{NewMeasurement, Station, StoreError};
use crate::shutdown::ShutdownSignal;
use crate::store::TimeSeriesStore;
use chrono::{Duration as ChronoDuration, Utc};
use std::io;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, warn};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Maximum age of stored measurements, and how far back the backfill reaches.
pub const RETENTION_DAYS: u32 = 10;

/// Time between polling cycles.
pub const POLL_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Grace period before the first cycle so the host can finish booting.
pub const INITIAL_DELAY: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaemonConfig {
    pub retention_days: u32,
    pub poll_interval: Duration,
    pub initial_delay: Duration,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            retention_days: RETENTION_DAYS,
            poll_interval: POLL_INTERVAL,
            initial_delay: INITIAL_DELAY,
        }
    }
}

// ---------------------------------------------------------------------------
// Startup backfill
// ---------------------------------------------------------------------------

/// Outcome of one backfill run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackfillReport {
    pub stations: usize,
    /// Stations whose history was fetched and saved.
    pub loaded: usize,
    /// Stations for which the source returned nothing.
    pub empty: usize,
    /// Stations whose save failed.
    pub failed: usize,
    pub purged: u64,
    pub inserted: usize,
}

impl BackfillReport {
    pub fn log_summary(&self) {
        let message = format!(
            "Backfill complete: {}/{} stations loaded, {} without data, {} failed; \
             {} readings inserted, {} expired readings purged",
            self.loaded, self.stations, self.empty, self.failed, self.inserted, self.purged
        );

        if self.failed == 0 {
            info!("{}", message);
        } else if self.loaded == 0 {
            error!("{}", message);
        } else {
            warn!("{}", message);
        }
    }
}

/// Purges expired measurements, then loads `retention_days` of history for
/// every station.
///
/// Purging runs first so a long-stopped service does not import data it
/// would immediately discard. Per-station failures are logged and counted;
/// only a failed purge or station listing aborts the run.
pub fn run_backfill<S, G>(
    store: &mut S,
    source: &G,
    retention_days: u32,
) -> Result<BackfillReport, StoreError>
where
    S: TimeSeriesStore + ?Sized,
    G: GaugeSource + ?Sized,
{
    let mut report = BackfillReport::default();

    let cutoff = Utc::now()
        .checked_sub_signed(ChronoDuration::days(i64::from(retention_days)))
        .ok_or_else(|| {
            StoreError::InvalidData(format!("retention of {} days is out of range", retention_days))
        })?;
    info!(%cutoff, "Deleting measurements older than retention horizon");
    report.purged = store.purge_older_than(cutoff)?;

    let stations = store.list_stations()?;
    report.stations = stations.len();

    for station in &stations {
        info!(
            station = %station.name,
            station_id = %station.id,
            days = retention_days,
            "Loading historical data"
        );

        let history = source.historical_values(station.id, retention_days);
        if history.is_empty() {
            warn!(station = %station.name, "No historical data received");
            report.empty += 1;
            continue;
        }

        let recorded_at = Utc::now();
        let batch: Vec<NewMeasurement> = history
            .iter()
            .map(|reading| NewMeasurement {
                station_id: station.id,
                timestamp: reading.timestamp,
                water_level_cm: reading.value,
                recorded_at,
            })
            .collect();

        match store.save_measurements(&batch) {
            Ok(inserted) => {
                info!(
                    station = %station.name,
                    fetched = batch.len(),
                    inserted,
                    "Loaded historical measurements"
                );
                report.loaded += 1;
                report.inserted += inserted;
            }
            Err(e) => {
                error!(station = %station.name, error = %e, "Failed to save historical measurements");
                report.failed += 1;
            }
        }
    }

    Ok(report)
}

/// Runs the backfill on its own thread.
///
/// The thread never reports failure to the host: errors are logged and the
/// handle yields `None`. Shutdown does not wait for it.
pub fn spawn_backfill<S, G>(
    mut store: S,
    source: G,
    retention_days: u32,
) -> io::Result<JoinHandle<Option<BackfillReport>>>
where
    S: TimeSeriesStore + Send + 'static,
    G: GaugeSource + Send + 'static,
{
    thread::Builder::new()
        .name("backfill".to_string())
        .spawn(move || {
            info!("Water level startup backfill: loading historical data");
            match run_backfill(&mut store, &source, retention_days) {
                Ok(report) => {
                    report.log_summary();
                    Some(report)
                }
                Err(e) => {
                    error!(error = %e, "Error during historical data loading");
                    None
                }
            }
        })
}

// ---------------------------------------------------------------------------
// Recurring poll
// ---------------------------------------------------------------------------

/// Lifecycle of the polling worker. `Stopped` is terminal and only reached
/// through the shutdown signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollerState {
    Starting,
    PollingCycle,
    Sleeping,
    Stopped,
}

/// Outcome of one polling cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub stations: usize,
    pub saved: usize,
    pub no_data: usize,
    pub failed: usize,
}

pub struct Poller<S, G> {
    store: S,
    source: G,
    config: DaemonConfig,
    shutdown: ShutdownSignal,
    state: PollerState,
}

impl<S, G> Poller<S, G>
where
    S: TimeSeriesStore,
    G: GaugeSource,
{
    pub fn new(store: S, source: G, config: DaemonConfig, shutdown: ShutdownSignal) -> Self {
        Self {
            store,
            source,
            config,
            shutdown,
            state: PollerState::Starting,
        }
    }

    pub fn state(&self) -> PollerState {
        self.state
    }

    /// One pass over every station, sequentially.
    ///
    /// Only a failure to list stations fails the cycle; per-station fetch
    /// and save problems are logged and counted. Shutdown is checked before
    /// each station.
    pub fn poll_cycle(&mut self) -> Result<CycleReport, StoreError> {
        info!("Polling water levels");

        let stations = self.store.list_stations()?;
        let mut report = CycleReport {
            stations: stations.len(),
            ..CycleReport::default()
        };

        for station in &stations {
            if self.shutdown.is_cancelled() {
                debug!("Shutdown requested, ending cycle early");
                break;
            }

            match self.poll_station(station) {
                Ok(Some(level)) => {
                    info!(station = %station.name, water_level_cm = level, "Saved water level");
                    report.saved += 1;
                }
                Ok(None) => {
                    warn!(station = %station.name, "No water level data received");
                    report.no_data += 1;
                }
                Err(e) => {
                    error!(station = %station.name, error = %e, "Error polling station");
                    report.failed += 1;
                }
            }
        }

        Ok(report)
    }

    /// Fetches and stores one station's current value. The observation and
    /// capture instants are both "now": the source's current reading carries
    /// no timestamp this service trusts.
    fn poll_station(&mut self, station: &Station) -> Result<Option<f64>, StoreError> {
        let Some(level) = self.source.current_value(station.id) else {
            return Ok(None);
        };

        let now = Utc::now();
        self.store.save_measurements(&[NewMeasurement {
            station_id: station.id,
            timestamp: now,
            water_level_cm: level,
            recorded_at: now,
        }])?;
        self.store.touch_station_updated(station.id, now)?;

        Ok(Some(level))
    }

    /// Main loop: runs until the shutdown signal fires, then returns
    /// `PollerState::Stopped`.
    pub fn run(&mut self) -> PollerState {
        info!(
            poll_interval_secs = self.config.poll_interval.as_secs(),
            initial_delay_secs = self.config.initial_delay.as_secs(),
            "Water level polling started"
        );
        self.state = PollerState::Starting;

        if !self.shutdown.wait_timeout(self.config.initial_delay) {
            loop {
                self.state = PollerState::PollingCycle;
                match self.poll_cycle() {
                    Ok(report) => info!(
                        stations = report.stations,
                        saved = report.saved,
                        no_data = report.no_data,
                        failed = report.failed,
                        "Poll complete"
                    ),
                    Err(e) => error!(error = %e, "Error during water level polling"),
                }

                if self.shutdown.is_cancelled() {
                    break;
                }

                self.state = PollerState::Sleeping;
                debug!(seconds = self.config.poll_interval.as_secs(), "Next poll scheduled");
                if self.shutdown.wait_timeout(self.config.poll_interval) {
                    break;
                }
            }
        }

        self.state = PollerState::Stopped;
        info!("Water level polling stopped");
        self.state
    }
}

impl<S, G> Poller<S, G>
where
    S: TimeSeriesStore + Send + 'static,
    G: GaugeSource + Send + 'static,
{
    /// Runs the loop on a dedicated thread. Join the handle after cancelling
    /// the shutdown signal to reclaim it.
    pub fn spawn(mut self) -> io::Result<JoinHandle<PollerState>> {
        thread::Builder::new()
            .name("poller".to_string())
            .spawn(move || self.run())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
