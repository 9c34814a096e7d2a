/// PegelOnline REST API client (German federal waterways gauge network).
///
/// Handles URL construction, JSON parsing and timestamp normalization for:
///   https://www.pegelonline.wsv.de/webservices/rest-api/v2
///
/// Only the `W` (water level, cm) timeseries is used. See `fixtures.rs`
/// for annotated examples of the response structure.

use crate::ingest::{GaugeSource, SourceReading};
use crate::model::SourceError;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

pub const PEGELONLINE_API_BASE: &str = "https://www.pegelonline.wsv.de/webservices/rest-api/v2";

// ---------------------------------------------------------------------------
// Serde structures
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct CurrentMeasurement {
    value: f64,
}

#[derive(Deserialize)]
struct RawMeasurement {
    timestamp: String,
    value: f64,
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Converts a PegelOnline timestamp to UTC.
///
/// Timestamps with an offset or `Z` are converted; timestamps with no
/// offset are taken to already be UTC.
pub fn normalize_timestamp(raw: &str) -> Result<DateTime<Utc>, SourceError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }

    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
        .map(|naive| naive.and_utc())
        .map_err(|e| SourceError::Timestamp(format!("'{}': {}", raw, e)))
}

/// Parses a `currentmeasurement.json` body into the water level in cm.
pub fn parse_current_measurement(json: &str) -> Result<f64, SourceError> {
    let current: CurrentMeasurement = serde_json::from_str(json)
        .map_err(|e| SourceError::Parse(format!("JSON deserialization failed: {}", e)))?;
    Ok(current.value)
}

/// Parses a `measurements.json` body into UTC-normalized readings.
///
/// One unreadable timestamp fails the whole payload: a partially
/// interpreted series would silently shift the dedup keys.
pub fn parse_measurements(json: &str) -> Result<Vec<SourceReading>, SourceError> {
    let raw: Vec<RawMeasurement> = serde_json::from_str(json)
        .map_err(|e| SourceError::Parse(format!("JSON deserialization failed: {}", e)))?;

    raw.into_iter()
        .map(|m| {
            Ok(SourceReading {
                timestamp: normalize_timestamp(&m.timestamp)?,
                value: m.value,
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// HTTP client
// ---------------------------------------------------------------------------

pub struct PegelOnlineClient {
    http: reqwest::blocking::Client,
    base_url: String,
}

impl PegelOnlineClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, SourceError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("floodsim_service/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn current_measurement_url(&self, station_id: Uuid) -> String {
        format!("{}/stations/{}/W/currentmeasurement.json", self.base_url, station_id)
    }

    /// `start=P{days}D` is an ISO 8601 period counted back from now.
    pub fn measurements_url(&self, station_id: Uuid, days: u32) -> String {
        format!(
            "{}/stations/{}/W/measurements.json?start=P{}D",
            self.base_url, station_id, days
        )
    }

    /// Current water level, with the failure cause.
    pub fn fetch_current(&self, station_id: Uuid) -> Result<f64, SourceError> {
        let url = self.current_measurement_url(station_id);
        debug!(%url, "Fetching current water level");

        let body = self.get_body(&url)?;
        parse_current_measurement(&body)
    }

    /// Historical readings, with the failure cause.
    pub fn fetch_historical(&self, station_id: Uuid, days: u32) -> Result<Vec<SourceReading>, SourceError> {
        let url = self.measurements_url(station_id, days);
        info!(days, %url, "Fetching historical water levels");

        let body = self.get_body(&url)?;
        parse_measurements(&body)
    }

    fn get_body(&self, url: &str) -> Result<String, SourceError> {
        let response = self
            .http
            .get(url)
            .header("Accept", "application/json")
            .send()?;

        if !response.status().is_success() {
            return Err(SourceError::Status(response.status().as_u16()));
        }

        Ok(response.text()?)
    }
}

/// A non-success status is an upstream condition (station offline, unknown
/// id) and logs as a warning; transport and parse failures log as errors.
fn log_fetch_failure(station_id: Uuid, operation: &str, err: &SourceError) {
    match err {
        SourceError::Status(code) => {
            warn!(%station_id, status = *code, "{} failed: {}", operation, err)
        }
        _ => error!(%station_id, "{} failed: {}", operation, err),
    }
}

impl GaugeSource for PegelOnlineClient {
    fn current_value(&self, station_id: Uuid) -> Option<f64> {
        self.fetch_current(station_id)
            .map_err(|e| log_fetch_failure(station_id, "current water level fetch", &e))
            .ok()
    }

    fn historical_values(&self, station_id: Uuid, days: u32) -> Vec<SourceReading> {
        self.fetch_historical(station_id, days)
            .map_err(|e| log_fetch_failure(station_id, "historical water level fetch", &e))
            .unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::fixtures::*;
    use chrono::TimeZone;

    fn station() -> Uuid {
        Uuid::parse_str("a6ee8177-107b-47dd-bcfd-30960ccc6e9c").unwrap()
    }

    fn client() -> PegelOnlineClient {
        PegelOnlineClient::new(PEGELONLINE_API_BASE, Duration::from_secs(5)).unwrap()
    }

    // --- URL construction ---------------------------------------------------

    #[test]
    fn test_current_url_targets_water_level_series() {
        let url = client().current_measurement_url(station());
        assert_eq!(
            url,
            "https://www.pegelonline.wsv.de/webservices/rest-api/v2/stations/\
             a6ee8177-107b-47dd-bcfd-30960ccc6e9c/W/currentmeasurement.json"
        );
    }

    #[test]
    fn test_measurements_url_uses_iso_period() {
        let url = client().measurements_url(station(), 10);
        assert!(url.ends_with("/W/measurements.json?start=P10D"), "got: {}", url);
    }

    #[test]
    fn test_trailing_slash_in_base_url_is_dropped() {
        let c = PegelOnlineClient::new("http://localhost:8089/api/", Duration::from_secs(1)).unwrap();
        assert!(c.current_measurement_url(station()).starts_with("http://localhost:8089/api/stations/"));
    }

    // --- Parsing: happy path ------------------------------------------------

    #[test]
    fn test_parse_current_measurement_value() {
        let value = parse_current_measurement(fixture_current_measurement_json()).unwrap();
        assert!((value - 312.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_parse_measurements_normalizes_offset_to_utc() {
        let readings = parse_measurements(fixture_measurements_json()).unwrap();

        assert_eq!(readings.len(), 3);
        assert_eq!(readings[0].timestamp, Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap());
        assert_eq!(readings[2].timestamp, Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap());
        assert_eq!(readings[1].value, 311.0);
    }

    #[test]
    fn test_parse_mixed_offsets_and_naive_timestamp() {
        let readings = parse_measurements(fixture_mixed_offsets_json()).unwrap();

        let times: Vec<_> = readings.iter().map(|r| r.timestamp).collect();
        assert_eq!(
            times,
            vec![
                Utc.with_ymd_and_hms(2024, 1, 15, 7, 0, 0).unwrap(),
                Utc.with_ymd_and_hms(2024, 1, 15, 7, 15, 0).unwrap(),
                // No offset: taken as UTC, not shifted.
                Utc.with_ymd_and_hms(2024, 1, 15, 7, 30, 0).unwrap(),
            ]
        );
        assert_eq!(readings[2].value, -3.5);
    }

    #[test]
    fn test_same_instant_in_different_offsets_compares_equal() {
        let a = normalize_timestamp("2024-05-01T14:00:00+02:00").unwrap();
        let b = normalize_timestamp("2024-05-01T12:00:00Z").unwrap();
        let c = normalize_timestamp("2024-05-01T12:00:00").unwrap();
        assert_eq!(a, b);
        assert_eq!(b, c);
    }

    #[test]
    fn test_fractional_seconds_are_kept() {
        let t = normalize_timestamp("2024-05-01T12:00:00.250").unwrap();
        assert_eq!(t.timestamp_subsec_millis(), 250);
    }

    #[test]
    fn test_parse_empty_measurements() {
        let readings = parse_measurements(fixture_empty_measurements_json()).unwrap();
        assert!(readings.is_empty());
    }

    // --- Parsing: failures --------------------------------------------------

    #[test]
    fn test_non_json_body_is_parse_error() {
        assert!(matches!(
            parse_current_measurement(fixture_not_json()),
            Err(SourceError::Parse(_))
        ));
        assert!(matches!(
            parse_measurements(fixture_not_json()),
            Err(SourceError::Parse(_))
        ));
    }

    #[test]
    fn test_unreadable_timestamp_fails_payload() {
        let result = parse_measurements(fixture_bad_timestamp_json());
        match result {
            Err(SourceError::Timestamp(msg)) => assert!(msg.contains("yesterday at noon")),
            other => panic!("expected timestamp error, got {:?}", other),
        }
    }

    // --- Degradation --------------------------------------------------------

    #[test]
    fn test_unreachable_source_degrades_to_no_value() {
        // Nothing listens on the discard port.
        let c = PegelOnlineClient::new("http://127.0.0.1:9", Duration::from_secs(2)).unwrap();

        assert_eq!(c.current_value(station()), None);
        assert!(c.historical_values(station(), 10).is_empty());
    }
}
