/// In-process time-series store.
///
/// Mirrors the PostgreSQL backend's rules (unique station/timestamp key,
/// bulk age purge, ascending range reads) over a shared in-memory table.
/// Cloning a `MemoryStore` yields another handle to the same data, the way
/// two connections see the same database.

use crate::model::{Measurement, NewMeasurement, StoreError, Station};
use crate::store::TimeSeriesStore;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

#[derive(Debug, Default)]
struct Tables {
    stations: Vec<Station>,
    /// Keyed by (station_id, timestamp): the unique index.
    measurements: BTreeMap<(Uuid, DateTime<Utc>), Measurement>,
    next_id: i64,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_stations(stations: Vec<Station>) -> Self {
        Self {
            tables: Arc::new(Mutex::new(Tables {
                stations,
                ..Tables::default()
            })),
        }
    }

    /// Out-of-band provisioning, the in-memory equivalent of an INSERT
    /// into the stations table.
    pub fn add_station(&self, station: Station) -> Result<(), StoreError> {
        self.lock()?.stations.push(station);
        Ok(())
    }

    /// Removes a station and, like the FK's ON DELETE CASCADE, all of its
    /// measurements.
    pub fn remove_station(&self, id: Uuid) -> Result<(), StoreError> {
        let mut tables = self.lock()?;
        tables.stations.retain(|s| s.id != id);
        tables.measurements.retain(|(station_id, _), _| *station_id != id);
        Ok(())
    }

    pub fn measurement_count(&self) -> Result<usize, StoreError> {
        Ok(self.lock()?.measurements.len())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>, StoreError> {
        self.tables
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".to_string()))
    }
}

impl TimeSeriesStore for MemoryStore {
    fn list_stations(&mut self) -> Result<Vec<Station>, StoreError> {
        Ok(self.lock()?.stations.clone())
    }

    fn get_station(&mut self, id: Uuid) -> Result<Option<Station>, StoreError> {
        Ok(self.lock()?.stations.iter().find(|s| s.id == id).cloned())
    }

    fn latest_measurement(&mut self, station_id: Uuid) -> Result<Option<Measurement>, StoreError> {
        let tables = self.lock()?;
        Ok(tables
            .measurements
            .range((station_id, DateTime::<Utc>::MIN_UTC)..=(station_id, DateTime::<Utc>::MAX_UTC))
            .next_back()
            .map(|(_, m)| m.clone()))
    }

    fn measurements_since(
        &mut self,
        station_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<Vec<Measurement>, StoreError> {
        let tables = self.lock()?;
        Ok(tables
            .measurements
            .range((station_id, since)..=(station_id, DateTime::<Utc>::MAX_UTC))
            .map(|(_, m)| m.clone())
            .collect())
    }

    fn save_measurements(&mut self, batch: &[NewMeasurement]) -> Result<usize, StoreError> {
        if batch.is_empty() {
            return Ok(0);
        }

        let mut tables = self.lock()?;

        // Foreign key check first so a bad batch leaves nothing behind.
        if let Some(orphan) = batch
            .iter()
            .find(|m| !tables.stations.iter().any(|s| s.id == m.station_id))
        {
            return Err(StoreError::InvalidData(format!(
                "station {} does not exist",
                orphan.station_id
            )));
        }

        let mut inserted = 0;
        for m in batch {
            let key = (m.station_id, m.timestamp);
            if tables.measurements.contains_key(&key) {
                continue;
            }
            tables.next_id += 1;
            let id = tables.next_id;
            tables.measurements.insert(
                key,
                Measurement {
                    id,
                    station_id: m.station_id,
                    timestamp: m.timestamp,
                    water_level_cm: m.water_level_cm,
                    recorded_at: m.recorded_at,
                },
            );
            inserted += 1;
        }

        Ok(inserted)
    }

    fn purge_older_than(&mut self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut tables = self.lock()?;
        let before = tables.measurements.len();
        tables.measurements.retain(|(_, timestamp), _| *timestamp >= cutoff);
        Ok((before - tables.measurements.len()) as u64)
    }

    fn touch_station_updated(&mut self, station_id: Uuid, at: DateTime<Utc>) -> Result<(), StoreError> {
        let mut tables = self.lock()?;
        if let Some(station) = tables.stations.iter_mut().find(|s| s.id == station_id) {
            station.last_updated = Some(at);
        }
        Ok(())
    }
}
