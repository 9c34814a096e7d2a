/// Remote gauge data sources.
///
/// A source only reads: it never persists anything and never returns an
/// error to the scheduler. Upstream failures are logged where they happen
/// and degrade to "no value" / "no readings".

pub mod pegelonline;

#[cfg(test)]
pub(crate) mod fixtures;

use chrono::{DateTime, Utc};
use uuid::Uuid;

pub use self::pegelonline::PegelOnlineClient;

/// One historical value from the remote source, already normalized to UTC.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SourceReading {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

/// Fetch interface the ingestion scheduler depends on.
pub trait GaugeSource {
    /// Current water level (cm) for a station, `None` on any failure.
    fn current_value(&self, station_id: Uuid) -> Option<f64>;

    /// The last `days` days of readings, empty on any failure.
    fn historical_values(&self, station_id: Uuid, days: u32) -> Vec<SourceReading>;
}
