/// Core data types for the flood simulation data service.
///
/// Stations, measurements, terrain envelopes and the error types shared by
/// the store, terrain and ingest layers. No I/O lives here.

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Gauge stations and measurements
// ---------------------------------------------------------------------------

/// A fixed gauge location producing periodic water-level observations.
///
/// Stations are provisioned out-of-band. This service only reads them and
/// bumps `last_updated` after a successful poll.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Station {
    pub id: Uuid,
    pub name: String,
    pub water_body: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub last_updated: Option<DateTime<Utc>>,
}

impl Station {
    /// A station with only the required fields set.
    pub fn new(id: Uuid, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            water_body: None,
            latitude: None,
            longitude: None,
            created_at: Utc::now(),
            last_updated: None,
        }
    }
}

/// One stored water-level observation.
///
/// `timestamp` is the instant the reading is *of*; `recorded_at` is when
/// this service captured it. `(station_id, timestamp)` is unique.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Measurement {
    pub id: i64,
    pub station_id: Uuid,
    pub timestamp: DateTime<Utc>,
    /// Signed: negative values are below gauge datum.
    pub water_level_cm: f64,
    pub recorded_at: DateTime<Utc>,
}

/// A measurement that has not been written yet (no surrogate id).
#[derive(Debug, Clone, PartialEq)]
pub struct NewMeasurement {
    pub station_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub water_level_cm: f64,
    pub recorded_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Terrain
// ---------------------------------------------------------------------------

/// Axis-aligned envelope in the terrain's planar reference system.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RasterBounds {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl RasterBounds {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self { min_x, min_y, max_x, max_y }
    }

    /// Smallest envelope covering both `self` and `other`.
    pub fn union(&self, other: &RasterBounds) -> RasterBounds {
        RasterBounds {
            min_x: self.min_x.min(other.min_x),
            min_y: self.min_y.min(other.min_y),
            max_x: self.max_x.max(other.max_x),
            max_y: self.max_y.max(other.max_y),
        }
    }

    /// Boundary-inclusive, matching `ST_Intersects` on a tile edge.
    pub fn contains_point(&self, x: f64, y: f64) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }

    pub fn contains(&self, other: &RasterBounds) -> bool {
        other.min_x >= self.min_x
            && other.min_y >= self.min_y
            && other.max_x <= self.max_x
            && other.max_y <= self.max_y
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Persistence failures other than the expected duplicate-key conflict.
///
/// "No data" is never a `StoreError`; reads return `None` or an empty `Vec`.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database operation failed.
    #[error("database error: {0}")]
    Database(#[from] postgres::Error),

    /// The backing store could not be reached (non-database backends).
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A stored row could not be mapped to a domain type.
    #[error("invalid data: {0}")]
    InvalidData(String),
}

/// Errors raised while talking to the remote gauge source.
///
/// These never leave the `GaugeSource` trait methods: they are logged and
/// degraded to "no value".
#[derive(Debug, Error)]
pub enum SourceError {
    /// Transport-level failure (DNS, connect, timeout, body read).
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-2xx HTTP response.
    #[error("HTTP error: {0}")]
    Status(u16),

    /// The response body could not be deserialized.
    #[error("Parse error: {0}")]
    Parse(String),

    /// A timestamp in the payload could not be interpreted.
    #[error("Invalid timestamp: {0}")]
    Timestamp(String),
}
