/// PostgreSQL backend for the time-series store.
///
/// Tables (see `sql/001_initial_schema.sql`):
/// - `water_level_stations`     - keyed by UUID
/// - `water_level_measurements` - surrogate id, UNIQUE (station_id, timestamp),
///                                FK to stations with ON DELETE CASCADE
///
/// Dedup relies on `ON CONFLICT (station_id, timestamp) DO NOTHING`, so a
/// duplicate row never aborts the rest of its batch. Retention is a single
/// `DELETE ... WHERE timestamp < $1`.

use crate::model::{Measurement, NewMeasurement, StoreError, Station};
use crate::store::TimeSeriesStore;
use chrono::{DateTime, Utc};
use postgres::{Client, Row};
use uuid::Uuid;

const STATION_COLUMNS: &str =
    "id, name, water_body, latitude, longitude, created_at, last_updated";

const MEASUREMENT_COLUMNS: &str = "id, station_id, timestamp, water_level_cm, recorded_at";

/// Time-series store over one PostgreSQL connection.
pub struct PgStore {
    client: Client,
}

impl PgStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Hands the connection back, e.g. for test cleanup.
    pub fn into_inner(self) -> Client {
        self.client
    }
}

fn station_from_row(row: &Row) -> Result<Station, StoreError> {
    Ok(Station {
        id: row.try_get(0)?,
        name: row.try_get(1)?,
        water_body: row.try_get(2)?,
        latitude: row.try_get(3)?,
        longitude: row.try_get(4)?,
        created_at: row.try_get(5)?,
        last_updated: row.try_get(6)?,
    })
}

fn measurement_from_row(row: &Row) -> Result<Measurement, StoreError> {
    Ok(Measurement {
        id: row.try_get(0)?,
        station_id: row.try_get(1)?,
        timestamp: row.try_get(2)?,
        water_level_cm: row.try_get(3)?,
        recorded_at: row.try_get(4)?,
    })
}

impl TimeSeriesStore for PgStore {
    fn list_stations(&mut self) -> Result<Vec<Station>, StoreError> {
        let sql = format!("SELECT {} FROM water_level_stations ORDER BY name", STATION_COLUMNS);
        let rows = self.client.query(sql.as_str(), &[])?;

        rows.iter().map(station_from_row).collect()
    }

    fn get_station(&mut self, id: Uuid) -> Result<Option<Station>, StoreError> {
        let sql = format!("SELECT {} FROM water_level_stations WHERE id = $1", STATION_COLUMNS);
        let row = self.client.query_opt(sql.as_str(), &[&id])?;

        row.as_ref().map(station_from_row).transpose()
    }

    fn latest_measurement(&mut self, station_id: Uuid) -> Result<Option<Measurement>, StoreError> {
        let sql = format!(
            "SELECT {} FROM water_level_measurements
             WHERE station_id = $1
             ORDER BY timestamp DESC
             LIMIT 1",
            MEASUREMENT_COLUMNS
        );
        let row = self.client.query_opt(sql.as_str(), &[&station_id])?;

        row.as_ref().map(measurement_from_row).transpose()
    }

    fn measurements_since(
        &mut self,
        station_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<Vec<Measurement>, StoreError> {
        let sql = format!(
            "SELECT {} FROM water_level_measurements
             WHERE station_id = $1 AND timestamp >= $2
             ORDER BY timestamp ASC",
            MEASUREMENT_COLUMNS
        );
        let rows = self.client.query(sql.as_str(), &[&station_id, &since])?;

        rows.iter().map(measurement_from_row).collect()
    }

    fn save_measurements(&mut self, batch: &[NewMeasurement]) -> Result<usize, StoreError> {
        if batch.is_empty() {
            return Ok(0);
        }

        let mut tx = self.client.transaction()?;
        let stmt = tx.prepare(
            "INSERT INTO water_level_measurements
             (station_id, timestamp, water_level_cm, recorded_at)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (station_id, timestamp) DO NOTHING",
        )?;

        let mut inserted = 0;
        for m in batch {
            let rows_affected = tx.execute(
                &stmt,
                &[&m.station_id, &m.timestamp, &m.water_level_cm, &m.recorded_at],
            )?;
            inserted += rows_affected as usize;
        }

        tx.commit()?;
        Ok(inserted)
    }

    fn purge_older_than(&mut self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
        let deleted = self.client.execute(
            "DELETE FROM water_level_measurements WHERE timestamp < $1",
            &[&cutoff],
        )?;
        Ok(deleted)
    }

    fn touch_station_updated(&mut self, station_id: Uuid, at: DateTime<Utc>) -> Result<(), StoreError> {
        // Zero rows affected for an unknown id is fine.
        self.client.execute(
            "UPDATE water_level_stations SET last_updated = $2 WHERE id = $1",
            &[&station_id, &at],
        )?;
        Ok(())
    }
}
