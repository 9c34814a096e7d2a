/// PostGIS raster backend for terrain queries.
///
/// Table `terrain_raster (rid SERIAL, rast RASTER, filename TEXT)`.
/// Tiles are only ever inspected through spatial functions.

use crate::model::{RasterBounds, StoreError};
use crate::terrain::TerrainQuery;
use postgres::Client;

/// ETRS89 / UTM zone 32N, the CRS the terrain tiles were loaded in.
pub const DEFAULT_SRID: i32 = 25832;

pub struct PostgisTerrain {
    client: Client,
    srid: i32,
}

impl PostgisTerrain {
    pub fn new(client: Client, srid: i32) -> Self {
        Self { client, srid }
    }
}

impl TerrainQuery for PostgisTerrain {
    fn elevation_at(&mut self, x: f64, y: f64) -> Result<Option<f64>, StoreError> {
        // ST_Intersects uses the GIST index on the tile hulls before the
        // exact predicate. Overlapping tiles resolve to the lowest rid.
        let row = self.client.query_opt(
            "SELECT ST_Value(t.rast, p.geom)
             FROM terrain_raster t,
                  (SELECT ST_SetSRID(ST_MakePoint($1, $2), $3) AS geom) p
             WHERE ST_Intersects(t.rast, p.geom)
             ORDER BY t.rid
             LIMIT 1",
            &[&x, &y, &self.srid],
        )?;

        match row {
            // A NULL sample (nodata pixel) is still "no elevation here".
            Some(row) => Ok(row.try_get::<_, Option<f64>>(0)?),
            None => Ok(None),
        }
    }

    fn bounds(&mut self) -> Result<Option<RasterBounds>, StoreError> {
        // ST_Extent aggregates over every row; an empty table yields NULL.
        let row = self.client.query_one(
            "SELECT ST_XMin(e.ext), ST_YMin(e.ext), ST_XMax(e.ext), ST_YMax(e.ext)
             FROM (SELECT ST_Extent(ST_Envelope(rast)) AS ext FROM terrain_raster) e",
            &[],
        )?;

        let min_x: Option<f64> = row.try_get(0)?;
        let min_y: Option<f64> = row.try_get(1)?;
        let max_x: Option<f64> = row.try_get(2)?;
        let max_y: Option<f64> = row.try_get(3)?;

        match (min_x, min_y, max_x, max_y) {
            (Some(min_x), Some(min_y), Some(max_x), Some(max_y)) => {
                Ok(Some(RasterBounds::new(min_x, min_y, max_x, max_y)))
            }
            _ => Ok(None),
        }
    }

    fn tile_count(&mut self) -> Result<i64, StoreError> {
        let row = self.client.query_one("SELECT COUNT(*) FROM terrain_raster", &[])?;
        Ok(row.try_get(0)?)
    }
}
