/// Time-series persistence for gauge stations and their measurements.
///
/// The store owns the dedup and retention rules:
/// - `save_measurements` skips rows whose `(station_id, timestamp)` already
///   exists and persists the rest of the batch
/// - `purge_older_than` is one bulk conditional delete
///
/// Callers never pre-filter timestamps they have already seen. Concurrent
/// writers racing on the same key are resolved by the unique constraint,
/// not by locks in this process.
///
/// Two backends implement [`TimeSeriesStore`]:
/// - `pg`     - the production PostgreSQL backend (one connection per worker)
/// - `memory` - an in-process backend with the same semantics, used by
///              the scheduler and endpoint tests

pub mod memory;
pub mod pg;

use crate::model::{Measurement, NewMeasurement, StoreError, Station};
use chrono::{DateTime, Utc};
use uuid::Uuid;

pub use self::memory::MemoryStore;
pub use self::pg::PgStore;

/// Read/write access to stations and measurements.
///
/// Methods take `&mut self` because a backend may hold a single connection;
/// each worker thread owns its own store instance.
pub trait TimeSeriesStore {
    /// All provisioned stations. Order carries no meaning.
    fn list_stations(&mut self) -> Result<Vec<Station>, StoreError>;

    fn get_station(&mut self, id: Uuid) -> Result<Option<Station>, StoreError>;

    /// The measurement with the greatest `timestamp` for the station.
    fn latest_measurement(&mut self, station_id: Uuid) -> Result<Option<Measurement>, StoreError>;

    /// Measurements with `timestamp >= since`, ascending by `timestamp`.
    fn measurements_since(
        &mut self,
        station_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<Vec<Measurement>, StoreError>;

    /// Appends a batch, silently skipping duplicates.
    ///
    /// Returns the number of rows actually inserted. An empty batch is a
    /// no-op and never touches the backend.
    fn save_measurements(&mut self, batch: &[NewMeasurement]) -> Result<usize, StoreError>;

    /// Deletes every measurement with `timestamp < cutoff`, across all
    /// stations. Returns the number of rows removed.
    fn purge_older_than(&mut self, cutoff: DateTime<Utc>) -> Result<u64, StoreError>;

    /// Sets `last_updated`. Unknown station ids are ignored.
    fn touch_station_updated(&mut self, station_id: Uuid, at: DateTime<Utc>) -> Result<(), StoreError>;
}
