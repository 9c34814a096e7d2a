/// Spatial queries against the tiled terrain elevation surface.
///
/// Tiles live in the `terrain_raster` table as PostGIS rasters in a fixed
/// planar reference system (EPSG:25832 in this deployment). Point lookups
/// run inside the database so the spatial index can prune tiles before the
/// exact intersection test; raster bytes never cross the wire.
///
/// "No data" is `Ok(None)`, not an error: a point outside every tile, or
/// a bounds query over an empty tile set.

pub mod grid;
pub mod postgis;

use crate::model::{RasterBounds, StoreError};
use serde::Serialize;

pub use self::grid::{GridTerrain, GridTile};
pub use self::postgis::PostgisTerrain;

/// Read-only terrain queries.
pub trait TerrainQuery {
    /// Raster value at `(x, y)`, or `None` if no tile footprint contains it.
    fn elevation_at(&mut self, x: f64, y: f64) -> Result<Option<f64>, StoreError>;

    /// Envelope of the union of every tile, or `None` when there are none.
    fn bounds(&mut self) -> Result<Option<RasterBounds>, StoreError>;

    /// Number of loaded tiles. Zero means the dataset is not ready.
    fn tile_count(&mut self) -> Result<i64, StoreError>;

    /// Bounds plus tile count, or `None` when there are no tiles.
    fn terrain_bounds(&mut self) -> Result<Option<TerrainBounds>, StoreError> {
        let Some(bounds) = self.bounds()? else {
            return Ok(None);
        };
        let raster_tile_count = self.tile_count()?;
        Ok(Some(TerrainBounds::new(bounds, raster_tile_count)))
    }

    /// Readiness summary for diagnostics.
    fn info(&mut self) -> Result<TerrainInfo, StoreError> {
        let raster_tile_count = self.tile_count()?;
        let bounds = self.terrain_bounds()?;
        Ok(TerrainInfo {
            raster_tile_count,
            bounds,
            status: TerrainStatus::from_tile_count(raster_tile_count),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TerrainStatus {
    Ready,
    NoData,
}

impl TerrainStatus {
    pub fn from_tile_count(count: i64) -> Self {
        if count > 0 {
            TerrainStatus::Ready
        } else {
            TerrainStatus::NoData
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TerrainBounds {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
    pub width: f64,
    pub height: f64,
    pub raster_tile_count: i64,
}

impl TerrainBounds {
    pub fn new(bounds: RasterBounds, raster_tile_count: i64) -> Self {
        Self {
            min_x: bounds.min_x,
            min_y: bounds.min_y,
            max_x: bounds.max_x,
            max_y: bounds.max_y,
            width: bounds.width(),
            height: bounds.height(),
            raster_tile_count,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TerrainInfo {
    pub raster_tile_count: i64,
    pub bounds: Option<TerrainBounds>,
    pub status: TerrainStatus,
}
