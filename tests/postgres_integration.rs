/// Integration tests against a provisioned PostGIS database
///
/// Exercise the production backends (`PgStore`, `PostgisTerrain`) with the
/// same properties the in-memory backends are tested for. Test rows use
/// random station ids and tiles far outside any real dataset, and are
/// removed afterwards.
///
/// Prerequisites:
/// - PostgreSQL with the postgis and postgis_raster extensions
/// - DATABASE_URL set in .env
/// - sql/001_initial_schema.sql applied
///
/// Run with: cargo test --test postgres_integration -- --ignored --test-threads=1

use chrono::{Duration, TimeZone, Utc};
use floodsim_service::db;
use floodsim_service::model::NewMeasurement;
use floodsim_service::store::{PgStore, TimeSeriesStore};
use floodsim_service::terrain::{PostgisTerrain, TerrainQuery, TerrainStatus};
use postgres::{Client, NoTls};
use std::env;
use uuid::Uuid;

const TEST_SRID: i32 = 25832;
const TEST_TILE_PREFIX: &str = "TEST_floodsim_";

// ---------------------------------------------------------------------------
// Test Helpers
// ---------------------------------------------------------------------------

fn setup_test_db() -> Client {
    dotenv::dotenv().ok();
    let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    Client::connect(&database_url, NoTls).expect("Failed to connect to test database")
}

fn create_test_station(client: &mut Client) -> Uuid {
    let id = Uuid::new_v4();
    client
        .execute(
            "INSERT INTO water_level_stations (id, name, water_body) VALUES ($1, $2, 'TEST')",
            &[&id, &format!("TEST station {}", id)],
        )
        .expect("Failed to insert test station");
    id
}

fn cleanup_test_station(client: &mut Client, id: Uuid) {
    // Measurements go with it (ON DELETE CASCADE).
    let _ = client.execute("DELETE FROM water_level_stations WHERE id = $1", &[&id]);
}

/// Inserts a 2x2 tile of 10 m pixels, every pixel set to `value`.
fn insert_test_tile(client: &mut Client, name: &str, upper_left: (f64, f64), value: f64) {
    client
        .execute(
            "INSERT INTO terrain_raster (rast, filename)
             VALUES (
                 ST_AddBand(
                     ST_MakeEmptyRaster(2, 2, $1, $2, 10, -10, 0, 0, $3),
                     '32BF'::text, $4, -9999
                 ),
                 $5
             )",
            &[&upper_left.0, &upper_left.1, &TEST_SRID, &value, &format!("{}{}", TEST_TILE_PREFIX, name)],
        )
        .expect("Failed to insert test tile");
}

fn cleanup_test_tiles(client: &mut Client) {
    let _ = client.execute(
        "DELETE FROM terrain_raster WHERE filename LIKE $1",
        &[&format!("{}%", TEST_TILE_PREFIX)],
    );
}

fn reading(station_id: Uuid, minutes: i64, level: f64) -> NewMeasurement {
    let t = Utc::now() - Duration::hours(1) + Duration::minutes(minutes);
    NewMeasurement {
        station_id,
        timestamp: t,
        water_level_cm: level,
        recorded_at: t,
    }
}

// ---------------------------------------------------------------------------
// 1. Provisioning
// ---------------------------------------------------------------------------

#[test]
#[ignore]
fn test_required_tables_and_extension_present() {
    let result = db::connect_and_verify(db::REQUIRED_TABLES);
    assert!(result.is_ok(), "Provisioning check failed: {:?}", result.err());
}

#[test]
#[ignore]
fn test_missing_table_is_reported_by_name() {
    let result = db::connect_and_verify(&["nonexistent_table_floodsim"]);
    match result {
        Err(e) => assert!(e.to_string().contains("nonexistent_table_floodsim")),
        Ok(_) => panic!("missing table should be detected"),
    }
}

// ---------------------------------------------------------------------------
// 2. Time-series store
// ---------------------------------------------------------------------------

#[test]
#[ignore]
fn test_latest_and_since_scenario() {
    let mut setup = setup_test_db();
    let id = create_test_station(&mut setup);
    let mut store = PgStore::new(setup_test_db());

    let inserted = store
        .save_measurements(&[reading(id, 0, 100.0), reading(id, 5, 102.0), reading(id, 10, 99.0)])
        .unwrap();
    assert_eq!(inserted, 3);

    let latest = store.latest_measurement(id).unwrap().unwrap();
    assert_eq!(latest.water_level_cm, 99.0);

    let since = Utc::now() - Duration::hours(1) + Duration::minutes(3);
    let levels: Vec<f64> = store
        .measurements_since(id, since)
        .unwrap()
        .iter()
        .map(|m| m.water_level_cm)
        .collect();
    assert_eq!(levels, vec![102.0, 99.0]);

    cleanup_test_station(&mut setup, id);
}

#[test]
#[ignore]
fn test_duplicate_batch_is_ignored() {
    let mut setup = setup_test_db();
    let id = create_test_station(&mut setup);
    let mut store = PgStore::new(setup_test_db());

    let base = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
    let batch: Vec<NewMeasurement> = (0..3)
        .map(|i| NewMeasurement {
            station_id: id,
            timestamp: base + Duration::minutes(15 * i),
            water_level_cm: 300.0,
            recorded_at: Utc::now(),
        })
        .collect();

    assert_eq!(store.save_measurements(&batch).unwrap(), 3);
    assert_eq!(store.save_measurements(&batch).unwrap(), 0);
    assert_eq!(store.save_measurements(&[]).unwrap(), 0);

    let all = store.measurements_since(id, base).unwrap();
    assert_eq!(all.len(), 3);

    cleanup_test_station(&mut setup, id);
}

#[test]
#[ignore]
fn test_purge_removes_only_rows_before_cutoff() {
    let mut setup = setup_test_db();
    let id = create_test_station(&mut setup);
    let mut store = PgStore::new(setup_test_db());

    let now = Utc::now();
    let old = now - Duration::days(12);
    let recent = now - Duration::days(3);
    store
        .save_measurements(&[
            NewMeasurement { station_id: id, timestamp: old, water_level_cm: 1.0, recorded_at: now },
            NewMeasurement { station_id: id, timestamp: recent, water_level_cm: 2.0, recorded_at: now },
        ])
        .unwrap();

    store.purge_older_than(now - Duration::days(10)).unwrap();

    let remaining = store.measurements_since(id, old - Duration::days(1)).unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].timestamp.timestamp(), recent.timestamp());

    cleanup_test_station(&mut setup, id);
}

#[test]
#[ignore]
fn test_touch_station_updated() {
    let mut setup = setup_test_db();
    let id = create_test_station(&mut setup);
    let mut store = PgStore::new(setup_test_db());

    let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
    store.touch_station_updated(id, at).unwrap();
    store.touch_station_updated(Uuid::new_v4(), at).unwrap();

    let station = store.get_station(id).unwrap().unwrap();
    assert_eq!(station.last_updated, Some(at));
    assert!(store.list_stations().unwrap().iter().any(|s| s.id == id));

    cleanup_test_station(&mut setup, id);
}

// ---------------------------------------------------------------------------
// 3. Terrain
// ---------------------------------------------------------------------------

#[test]
#[ignore]
fn test_elevation_inside_and_outside_tile() {
    let mut setup = setup_test_db();
    cleanup_test_tiles(&mut setup);
    insert_test_tile(&mut setup, "single", (-8_000_000.0, -8_000_000.0), 42.0);

    let mut terrain = PostgisTerrain::new(setup_test_db(), TEST_SRID);

    let first = terrain.elevation_at(-7_999_995.0, -8_000_005.0).unwrap();
    let second = terrain.elevation_at(-7_999_995.0, -8_000_005.0).unwrap();
    assert_eq!(first, Some(42.0));
    assert_eq!(first, second);

    assert_eq!(terrain.elevation_at(-9_000_000.0, -9_000_000.0).unwrap(), None);

    let info = terrain.info().unwrap();
    assert!(info.raster_tile_count >= 1);
    assert_eq!(info.status, TerrainStatus::Ready);

    let bounds = terrain.bounds().unwrap().unwrap();
    assert!(bounds.contains_point(-8_000_000.0, -8_000_020.0));

    cleanup_test_tiles(&mut setup);
}

#[test]
#[ignore]
fn test_overlapping_tiles_resolve_to_lowest_rid() {
    let mut setup = setup_test_db();
    cleanup_test_tiles(&mut setup);
    insert_test_tile(&mut setup, "first", (-8_100_000.0, -8_100_000.0), 10.0);
    insert_test_tile(&mut setup, "second", (-8_100_000.0, -8_100_000.0), 20.0);

    let mut terrain = PostgisTerrain::new(setup_test_db(), TEST_SRID);
    for _ in 0..3 {
        assert_eq!(terrain.elevation_at(-8_099_995.0, -8_100_005.0).unwrap(), Some(10.0));
    }

    cleanup_test_tiles(&mut setup);
}
