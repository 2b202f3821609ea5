//! Geographic indexing for the global SRTM tile grid.
//!
//! SRTM tiles are one degree on a side and are addressed by the integer
//! (latitude, longitude) of their south-west corner. The valid grid covers
//! latitudes [-90, 89] and longitudes [-180, 179]; callers may pass any
//! floating point coordinate and it is floor-projected into the grid,
//! never rejected.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Northernmost valid tile latitude.
pub const MAX_LAT: i16 = 89;
/// Southernmost valid tile latitude.
pub const MIN_LAT: i16 = -90;
/// Easternmost valid tile longitude.
pub const MAX_LON: i16 = 179;
/// Westernmost valid tile longitude.
pub const MIN_LON: i16 = -180;

/// Number of tile rows in the global grid.
pub const GRID_ROWS: usize = 180;
/// Number of tile columns in the global grid.
pub const GRID_COLS: usize = 360;
/// Total number of cells in the global grid.
pub const GRID_CELLS: usize = GRID_ROWS * GRID_COLS;

/// Projects a latitude into the valid tile grid.
///
/// The value is floored to the containing integer degree and clamped to
/// [-90, 89]. Out-of-range inputs are clamped, never rejected.
#[inline]
pub fn project_latitude(lat: f64) -> i16 {
    (lat.floor() as i64).clamp(MIN_LAT as i64, MAX_LAT as i64) as i16
}

/// Projects a longitude into the valid tile grid.
///
/// The value is floored to the containing integer degree and clamped to
/// [-180, 179].
#[inline]
pub fn project_longitude(lon: f64) -> i16 {
    (lon.floor() as i64).clamp(MIN_LON as i64, MAX_LON as i64) as i16
}

/// The south-west corner of a tile, in integer degrees.
///
/// A `TilePoint` is always inside the valid grid; the constructors project
/// arbitrary coordinates before storing them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TilePoint {
    pub lat: i16,
    pub lon: i16,
}

impl TilePoint {
    /// Creates a tile point from floating point degrees, projecting into
    /// the valid grid.
    pub fn from_degrees(lat: f64, lon: f64) -> Self {
        Self {
            lat: project_latitude(lat),
            lon: project_longitude(lon),
        }
    }

    /// Creates a tile point from integer degrees, clamping into the valid
    /// grid.
    pub fn new(lat: i16, lon: i16) -> Self {
        Self {
            lat: lat.clamp(MIN_LAT, MAX_LAT),
            lon: lon.clamp(MIN_LON, MAX_LON),
        }
    }

    /// Returns this point's offset into the flat global grid.
    ///
    /// Cells are laid out row-major from (-90, -180); the offset is always
    /// in `0..GRID_CELLS`.
    pub fn grid_offset(&self) -> usize {
        let row = (self.lat - MIN_LAT) as usize;
        let col = (self.lon - MIN_LON) as usize;
        row * GRID_COLS + col
    }

    /// Inverts [`grid_offset`](Self::grid_offset).
    ///
    /// Returns `None` if the offset lies outside the global grid.
    pub fn from_grid_offset(offset: usize) -> Option<Self> {
        if offset >= GRID_CELLS {
            return None;
        }
        Some(Self {
            lat: (offset / GRID_COLS) as i16 + MIN_LAT,
            lon: (offset % GRID_COLS) as i16 + MIN_LON,
        })
    }
}

impl fmt::Display for TilePoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.lat, self.lon)
    }
}
