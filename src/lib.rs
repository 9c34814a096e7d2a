/// floodsim_service: backend for a river flood simulation front end.
///
/// Answers point elevation queries against a tiled terrain raster and keeps
/// a rolling window of river gauge water levels fresh from PegelOnline.
///
/// # Module structure
///
/// ```text
/// floodsim_service
/// ├── model       - shared data types (Station, Measurement, RasterBounds, StoreError, …)
/// ├── config      - service configuration loader (floodsim.toml)
/// ├── db          - PostgreSQL connection + provisioning checks
/// ├── logging     - tracing subscriber setup
/// ├── shutdown    - cancellation signal shared by workers
/// ├── daemon      - startup backfill and recurring poll workers
/// ├── endpoint    - read-only JSON HTTP API
/// ├── ingest
/// │   ├── pegelonline - PegelOnline REST API: URL construction + JSON parsing
/// │   └── fixtures (test only) - representative API response payloads
/// ├── store
/// │   ├── pg      - PostgreSQL time-series backend
/// │   └── memory  - in-process backend with the same semantics
/// └── terrain
///     ├── postgis - PostGIS raster elevation queries
///     └── grid    - in-memory grid tiles with the same semantics
/// ```

/// Public modules
pub mod config;
pub mod daemon;
pub mod db;
pub mod endpoint;
pub mod ingest;
pub mod logging;
pub mod model;
pub mod shutdown;
pub mod store;
pub mod terrain;
