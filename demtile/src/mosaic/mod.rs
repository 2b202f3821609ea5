//! Mosaic construction: the grid of tiles covering a region of interest.
//!
//! A mosaic is the rectangular bounding-box grid of tiles spanned by a
//! cloud of (lat, lon) points. Tiles are ordered in "book order": rows
//! run north to south, and within a row tiles run west to east. This
//! ordering is deterministic, so a mosaic doubles as the fixed work plan
//! handed to the worker pool.

use thiserror::Error;

use crate::coord::{project_latitude, project_longitude, TilePoint};
use crate::tile::{Resolution, Tile};

/// Errors raised by point-indexed lookups into a mosaic.
///
/// A query outside the mosaic's rectangle is a caller contract violation,
/// not a recoverable condition.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MosaicError {
    #[error("latitude {0} is not covered by this mosaic")]
    LatitudeNotCovered(i16),

    #[error("longitude {0} is not covered by this mosaic")]
    LongitudeNotCovered(i16),
}

/// The ordered set of tiles covering the bounding box of a region.
#[derive(Debug, Clone)]
pub struct Mosaic {
    resolution: Resolution,
    /// North-west anchor tile point; `None` for an empty mosaic.
    nw: Option<TilePoint>,
    /// (rows, cols); (0, 0) for an empty mosaic.
    shape: (usize, usize),
    tiles: Vec<Tile>,
}

impl Mosaic {
    /// Builds the mosaic covering the bounding box of `region`.
    ///
    /// Every point is floor-projected into the valid grid first, so the
    /// mosaic always lies inside it. An empty region yields an empty
    /// mosaic with shape (0, 0).
    pub fn cover(region: &[(f64, f64)], resolution: Resolution) -> Self {
        if region.is_empty() {
            return Self {
                resolution,
                nw: None,
                shape: (0, 0),
                tiles: Vec::new(),
            };
        }

        let lats: Vec<i16> = region.iter().map(|&(lat, _)| project_latitude(lat)).collect();
        let lons: Vec<i16> = region.iter().map(|&(_, lon)| project_longitude(lon)).collect();

        // region is non-empty, so min/max exist
        let lat_n = *lats.iter().max().unwrap();
        let lat_s = *lats.iter().min().unwrap();
        let lon_e = *lons.iter().max().unwrap();
        let lon_w = *lons.iter().min().unwrap();

        let rows = (lat_n - lat_s + 1) as usize;
        let cols = (lon_e - lon_w + 1) as usize;

        let mut tiles = Vec::with_capacity(rows * cols);
        for lat in (lat_s..=lat_n).rev() {
            for lon in lon_w..=lon_e {
                tiles.push(Tile::new(TilePoint { lat, lon }, resolution));
            }
        }

        Self {
            resolution,
            nw: Some(TilePoint { lat: lat_n, lon: lon_w }),
            shape: (rows, cols),
            tiles,
        }
    }

    /// Builds the mosaic covering the entire valid grid.
    ///
    /// Used by store-wide reconciliation.
    pub fn global(resolution: Resolution) -> Self {
        Self::cover(&[(-90.0, -180.0), (89.0, 179.0)], resolution)
    }

    /// The (rows, cols) shape of the mosaic.
    pub fn shape(&self) -> (usize, usize) {
        self.shape
    }

    /// The north-west anchor point, if the mosaic is non-empty.
    pub fn nw(&self) -> Option<TilePoint> {
        self.nw
    }

    /// The resolution every tile in the mosaic carries.
    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    /// The tiles in book order (north to south, west to east).
    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    /// Consumes the mosaic, yielding its tiles as a work plan.
    pub fn into_tiles(self) -> Vec<Tile> {
        self.tiles
    }

    /// Returns the tile containing the given coordinates.
    ///
    /// The coordinates are projected into the grid first; a projected
    /// point outside the mosaic's rectangle is an error.
    pub fn tile_at(&self, lat: f64, lon: f64) -> Result<&Tile, MosaicError> {
        let lat = project_latitude(lat);
        let lon = project_longitude(lon);

        let nw = match self.nw {
            Some(nw) => nw,
            None => return Err(MosaicError::LatitudeNotCovered(lat)),
        };
        let (rows, cols) = self.shape;

        let row = (nw.lat - lat) as i64;
        let col = (lon - nw.lon) as i64;
        if row < 0 || row >= rows as i64 {
            return Err(MosaicError::LatitudeNotCovered(lat));
        }
        if col < 0 || col >= cols as i64 {
            return Err(MosaicError::LongitudeNotCovered(lon));
        }

        Ok(&self.tiles[row as usize * cols + col as usize])
    }
}

impl<'a> IntoIterator for &'a Mosaic {
    type Item = &'a Tile;
    type IntoIter = std::slice::Iter<'a, Tile>;

    fn into_iter(self) -> Self::IntoIter {
        self.tiles.iter()
    }
}
