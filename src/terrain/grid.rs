/// In-memory terrain made of regular grid tiles.
///
/// Same contract as the PostGIS backend: tiles are checked in ascending
/// id order, the first whose footprint contains the point answers, and a
/// nodata pixel answers `None`. Used to exercise terrain consumers without
/// a spatial database.

use crate::model::{RasterBounds, StoreError};
use crate::terrain::TerrainQuery;

/// One north-up raster tile. `values` is row-major, first row at the top.
#[derive(Debug, Clone, PartialEq)]
pub struct GridTile {
    pub rid: i64,
    /// Upper-left corner.
    pub origin_x: f64,
    pub origin_y: f64,
    pub pixel_size: f64,
    pub columns: usize,
    pub rows: usize,
    pub values: Vec<f64>,
    pub nodata: Option<f64>,
}

impl GridTile {
    pub fn envelope(&self) -> RasterBounds {
        RasterBounds::new(
            self.origin_x,
            self.origin_y - self.rows as f64 * self.pixel_size,
            self.origin_x + self.columns as f64 * self.pixel_size,
            self.origin_y,
        )
    }

    /// Pixel value under the point, `None` outside the tile or on nodata.
    pub fn sample(&self, x: f64, y: f64) -> Option<f64> {
        if !self.envelope().contains_point(x, y) || self.columns == 0 || self.rows == 0 {
            return None;
        }

        // The far edges belong to the last column/row.
        let col = (((x - self.origin_x) / self.pixel_size).floor() as usize).min(self.columns - 1);
        let row = (((self.origin_y - y) / self.pixel_size).floor() as usize).min(self.rows - 1);

        let value = *self.values.get(row * self.columns + col)?;
        match self.nodata {
            Some(nodata) if value == nodata => None,
            _ => Some(value),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct GridTerrain {
    tiles: Vec<GridTile>,
}

impl GridTerrain {
    pub fn new(mut tiles: Vec<GridTile>) -> Self {
        tiles.sort_by_key(|t| t.rid);
        Self { tiles }
    }
}

impl TerrainQuery for GridTerrain {
    fn elevation_at(&mut self, x: f64, y: f64) -> Result<Option<f64>, StoreError> {
        let hit = self
            .tiles
            .iter()
            .find(|t| t.envelope().contains_point(x, y));
        Ok(hit.and_then(|t| t.sample(x, y)))
    }

    fn bounds(&mut self) -> Result<Option<RasterBounds>, StoreError> {
        Ok(self
            .tiles
            .iter()
            .map(GridTile::envelope)
            .reduce(|acc, e| acc.union(&e)))
    }

    fn tile_count(&mut self) -> Result<i64, StoreError> {
        Ok(self.tiles.len() as i64)
    }
}
