/// HTTP endpoint for querying terrain and water level data
///
/// Read-only JSON API for the simulation front end and ad-hoc tooling.
/// Routing is a pure function over the store and terrain traits so it can
/// be exercised without a socket; the server loop only moves bytes.
///
/// Endpoints:
/// - GET /health
/// - GET /api/terrain/elevation?x={x}&y={y}
/// - GET /api/terrain/bounds
/// - GET /api/terrain/info
/// - GET /api/waterlevel/stations
/// - GET /api/waterlevel/current/{station_id}
/// - GET /api/waterlevel/history/{station_id}?days={n}
/// - GET /api/waterlevel/current-all

use crate::config::MAX_RETENTION_DAYS;
use crate::daemon::RETENTION_DAYS;
use crate::model::{Station, StoreError};
use crate::shutdown::ShutdownSignal;
use crate::store::TimeSeriesStore;
use crate::terrain::TerrainQuery;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, error, info};
use uuid::Uuid;

const AVAILABLE_ENDPOINTS: &[&str] = &[
    "/health",
    "/api/terrain/elevation?x={x}&y={y}",
    "/api/terrain/bounds",
    "/api/terrain/info",
    "/api/waterlevel/stations",
    "/api/waterlevel/current/{station_id}",
    "/api/waterlevel/history/{station_id}?days={n}",
    "/api/waterlevel/current-all",
];

/// How often the accept loop wakes up to check for shutdown.
const ACCEPT_POLL: Duration = Duration::from_millis(250);

// ---------------------------------------------------------------------------
// Response Types
// ---------------------------------------------------------------------------

/// Latest reading of one station
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CurrentReading {
    pub station_id: Uuid,
    pub station_name: String,
    pub water_level_cm: f64,
    pub timestamp: DateTime<Utc>,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryPoint {
    pub timestamp: DateTime<Utc>,
    pub water_level_cm: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StationHistory {
    pub station_id: Uuid,
    pub station_name: String,
    pub days: u32,
    pub points: Vec<HistoryPoint>,
}

// ---------------------------------------------------------------------------
// Data Fetching
// ---------------------------------------------------------------------------

/// Latest reading of a station, `None` when it has no measurements.
pub fn current_reading<S>(store: &mut S, station: &Station) -> Result<Option<CurrentReading>, StoreError>
where
    S: TimeSeriesStore + ?Sized,
{
    Ok(store.latest_measurement(station.id)?.map(|m| CurrentReading {
        station_id: station.id,
        station_name: station.name.clone(),
        water_level_cm: m.water_level_cm,
        timestamp: m.timestamp,
        recorded_at: m.recorded_at,
    }))
}

/// Latest reading for every station that has one. Stations without any
/// measurement are left out rather than reported as empty.
pub fn current_all<S>(store: &mut S) -> Result<Vec<CurrentReading>, StoreError>
where
    S: TimeSeriesStore + ?Sized,
{
    let mut readings = Vec::new();
    for station in store.list_stations()? {
        if let Some(reading) = current_reading(store, &station)? {
            readings.push(reading);
        }
    }
    Ok(readings)
}

/// The last `days` days of a station, oldest first. `None` for an unknown
/// station. A window reaching past the earliest representable instant
/// covers everything stored.
pub fn history<S>(store: &mut S, station_id: Uuid, days: u32) -> Result<Option<StationHistory>, StoreError>
where
    S: TimeSeriesStore + ?Sized,
{
    let Some(station) = store.get_station(station_id)? else {
        return Ok(None);
    };

    let since = Utc::now()
        .checked_sub_signed(ChronoDuration::days(i64::from(days)))
        .unwrap_or(DateTime::<Utc>::MIN_UTC);
    let points = store
        .measurements_since(station_id, since)?
        .into_iter()
        .map(|m| HistoryPoint {
            timestamp: m.timestamp,
            water_level_cm: m.water_level_cm,
        })
        .collect();

    Ok(Some(StationHistory {
        station_id,
        station_name: station.name,
        days,
        points,
    }))
}

// ---------------------------------------------------------------------------
// Routing
// ---------------------------------------------------------------------------

/// Status code and JSON body for one request.
pub fn route<S, T>(method: &str, url: &str, store: &mut S, terrain: &mut T) -> (u16, Value)
where
    S: TimeSeriesStore + ?Sized,
    T: TerrainQuery + ?Sized,
{
    if method != "GET" {
        return (405, json!({ "error": "Method not allowed", "method": method }));
    }

    let (path, query) = url.split_once('?').unwrap_or((url, ""));
    let path = path.trim_end_matches('/');

    let result = match path {
        "/health" => Ok(handle_health()),
        "/api/terrain/elevation" => handle_elevation(terrain, query),
        "/api/terrain/bounds" => handle_bounds(terrain),
        "/api/terrain/info" => terrain.info().map(|info| json_ok(&info)),
        "/api/waterlevel/stations" => store.list_stations().map(|stations| json_ok(&stations)),
        "/api/waterlevel/current-all" => current_all(store).map(|all| json_ok(&all)),
        _ => {
            if let Some(id) = path.strip_prefix("/api/waterlevel/current/") {
                handle_current(store, id)
            } else if let Some(id) = path.strip_prefix("/api/waterlevel/history/") {
                handle_history(store, id, query)
            } else {
                Ok(not_found_route())
            }
        }
    };

    result.unwrap_or_else(|e| {
        error!(%url, error = %e, "Query failed");
        (500, json!({ "error": "Internal server error", "detail": e.to_string() }))
    })
}

fn handle_health() -> (u16, Value) {
    (
        200,
        json!({
            "status": "ok",
            "service": "floodsim_service",
            "version": env!("CARGO_PKG_VERSION")
        }),
    )
}

fn handle_elevation<T>(terrain: &mut T, query: &str) -> Result<(u16, Value), StoreError>
where
    T: TerrainQuery + ?Sized,
{
    let (Some(x), Some(y)) = (query_f64(query, "x"), query_f64(query, "y")) else {
        return Ok((
            400,
            json!({ "error": "Query parameters x and y are required and must be numbers" }),
        ));
    };

    match terrain.elevation_at(x, y)? {
        Some(elevation) => Ok((
            200,
            json!({ "x": x, "y": y, "elevation": elevation, "has_elevation": true }),
        )),
        None => Ok((
            404,
            json!({ "error": "No elevation data at this location", "x": x, "y": y, "has_elevation": false }),
        )),
    }
}

fn handle_bounds<T>(terrain: &mut T) -> Result<(u16, Value), StoreError>
where
    T: TerrainQuery + ?Sized,
{
    Ok(match terrain.terrain_bounds()? {
        Some(bounds) => json_ok(&bounds),
        None => (404, json!({ "error": "No terrain tiles loaded" })),
    })
}

fn handle_current<S>(store: &mut S, raw_id: &str) -> Result<(u16, Value), StoreError>
where
    S: TimeSeriesStore + ?Sized,
{
    let station_id = match parse_station_id(raw_id) {
        Ok(id) => id,
        Err(response) => return Ok(response),
    };

    let Some(station) = store.get_station(station_id)? else {
        return Ok(station_not_found(station_id));
    };

    Ok(match current_reading(store, &station)? {
        Some(reading) => json_ok(&reading),
        None => (
            404,
            json!({ "error": "No measurements for station", "station_id": station_id }),
        ),
    })
}

fn handle_history<S>(store: &mut S, raw_id: &str, query: &str) -> Result<(u16, Value), StoreError>
where
    S: TimeSeriesStore + ?Sized,
{
    let station_id = match parse_station_id(raw_id) {
        Ok(id) => id,
        Err(response) => return Ok(response),
    };

    let days = match query_param(query, "days") {
        None => RETENTION_DAYS,
        Some(raw) => match raw.parse::<u32>() {
            Ok(days) if (1..=MAX_RETENTION_DAYS).contains(&days) => days,
            _ => {
                return Ok((
                    400,
                    json!({
                        "error": format!("days must be an integer between 1 and {}", MAX_RETENTION_DAYS),
                        "days": raw
                    }),
                ));
            }
        },
    };

    Ok(match history(store, station_id, days)? {
        Some(history) => json_ok(&history),
        None => station_not_found(station_id),
    })
}

fn parse_station_id(raw: &str) -> Result<Uuid, (u16, Value)> {
    Uuid::parse_str(raw).map_err(|_| {
        (
            400,
            json!({ "error": "Invalid station id, expected a UUID", "station_id": raw }),
        )
    })
}

fn station_not_found(station_id: Uuid) -> (u16, Value) {
    (404, json!({ "error": "Station not found", "station_id": station_id }))
}

fn not_found_route() -> (u16, Value) {
    (
        404,
        json!({ "error": "Not found", "available_endpoints": AVAILABLE_ENDPOINTS }),
    )
}

fn query_param<'a>(query: &'a str, key: &str) -> Option<&'a str> {
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(k, _)| *k == key)
        .map(|(_, v)| v)
}

fn query_f64(query: &str, key: &str) -> Option<f64> {
    query_param(query, key)?
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
}

/// 200 with the serialized body, or 500 if it cannot be serialized.
fn json_ok<T: Serialize>(value: &T) -> (u16, Value) {
    match serde_json::to_value(value) {
        Ok(body) => (200, body),
        Err(e) => {
            error!(error = %e, "Failed to serialize response");
            (500, json!({ "error": "Internal server error", "detail": e.to_string() }))
        }
    }
}

// ---------------------------------------------------------------------------
// HTTP Server
// ---------------------------------------------------------------------------

/// Serve requests on `bind:port` until `shutdown` is cancelled.
///
/// Requests are handled one at a time on the calling thread, with the
/// store and terrain handles owned by this server.
pub fn start_endpoint_server<S, T>(
    bind: &str,
    port: u16,
    mut store: S,
    mut terrain: T,
    shutdown: &ShutdownSignal,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>>
where
    S: TimeSeriesStore,
    T: TerrainQuery,
{
    let addr = format!("{}:{}", bind, port);
    let server = tiny_http::Server::http(&addr)?;

    info!("HTTP endpoint listening on http://{}", addr);
    for endpoint in AVAILABLE_ENDPOINTS {
        info!("  GET {}", endpoint);
    }

    while !shutdown.is_cancelled() {
        let request = match server.recv_timeout(ACCEPT_POLL) {
            Ok(Some(request)) => request,
            Ok(None) => continue,
            Err(e) => {
                error!(error = %e, "Failed to receive request");
                continue;
            }
        };

        let (status, body) = route(
            request.method().as_str(),
            request.url(),
            &mut store,
            &mut terrain,
        );
        debug!(method = %request.method(), url = request.url(), status, "Handled request");

        if let Err(e) = request.respond(create_response(status, &body)) {
            error!(error = %e, "Failed to send response");
        }
    }

    info!("HTTP endpoint stopped");
    Ok(())
}

/// Create HTTP response with JSON body
fn create_response(status_code: u16, json: &Value) -> tiny_http::Response<std::io::Cursor<Vec<u8>>> {
    let body = serde_json::to_string_pretty(json).unwrap_or_else(|_| json.to_string());

    let response = tiny_http::Response::from_data(body.into_bytes())
        .with_status_code(tiny_http::StatusCode::from(status_code));

    match tiny_http::Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..]) {
        Ok(header) => response.with_header(header),
        Err(()) => response,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
