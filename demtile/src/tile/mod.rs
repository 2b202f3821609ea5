//! SRTM tile entity and its availability state machine.
//!
//! A tile is one addressable unit of the remote archive: a south-west
//! corner point plus a sampling resolution. Its canonical name and
//! filename are derived from the point, so a tile never needs to be
//! persisted itself; only its (point, status) pair is recorded, inside
//! the availability index.

use std::fmt;

use thiserror::Error;

use crate::coord::TilePoint;

/// Sampling resolution of a tile, in arc-seconds per pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resolution {
    /// SRTMGL1: one arc-second per pixel (3601x3601 samples).
    One,
    /// SRTMGL3: three arc-seconds per pixel (1201x1201 samples).
    Three,
}

impl Resolution {
    /// Arc-seconds per pixel.
    pub fn arcseconds(&self) -> u8 {
        match self {
            Resolution::One => 1,
            Resolution::Three => 3,
        }
    }

    /// Parses the resolution from arc-seconds; only 1 and 3 exist.
    pub fn from_arcseconds(arcseconds: u8) -> Option<Self> {
        match arcseconds {
            1 => Some(Resolution::One),
            3 => Some(Resolution::Three),
            _ => None,
        }
    }

    /// The dataset tag used in filenames and archive paths, e.g. `SRTMGL1`.
    pub fn dataset(&self) -> String {
        format!("SRTMGL{}", self.arcseconds())
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.arcseconds())
    }
}

/// Last-known availability of a tile.
///
/// The statuses form a small state machine: `Unknown` is the starting
/// point, a fetch resolves it to `Unavailable` or `Available`, and a
/// completed local write promotes `Available` to `Cached`. Reconciliation
/// against the local store may demote `Cached` back to `Available` when
/// the local copy has disappeared; nothing ever demotes to `Unavailable`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TileStatus {
    /// Never attempted; nothing is known about this tile.
    Unknown,
    /// The archive confirmed the dataset does not include this tile.
    Unavailable,
    /// The archive confirmed the tile exists, but there is no local copy.
    Available,
    /// A local copy of the tile is present in the store.
    Cached,
}

impl TileStatus {
    /// All statuses, in encoding order. Used for summary tables.
    pub const ALL: [TileStatus; 4] = [
        TileStatus::Unknown,
        TileStatus::Unavailable,
        TileStatus::Available,
        TileStatus::Cached,
    ];

    /// Encodes the status for the availability index file.
    ///
    /// This encoding is part of the version-1 index format; changing it
    /// requires bumping the index file version.
    pub fn as_byte(&self) -> u8 {
        match self {
            TileStatus::Unknown => 0,
            TileStatus::Unavailable => 1,
            TileStatus::Available => 2,
            TileStatus::Cached => 3,
        }
    }

    /// Decodes a status byte from the availability index file.
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(TileStatus::Unknown),
            1 => Some(TileStatus::Unavailable),
            2 => Some(TileStatus::Available),
            3 => Some(TileStatus::Cached),
            _ => None,
        }
    }

    /// Human-readable label for reports.
    pub fn label(&self) -> &'static str {
        match self {
            TileStatus::Unknown => "unknown",
            TileStatus::Unavailable => "unavailable",
            TileStatus::Available => "available",
            TileStatus::Cached => "cached",
        }
    }
}

impl fmt::Display for TileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Errors raised when interpreting tile names.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum NameError {
    /// The string does not match the `N|S dd E|W ddd` shape, or encodes a
    /// point outside the valid grid.
    #[error("malformed tile name: {0:?}")]
    Malformed(String),
}

/// One addressable unit of the SRTM archive.
///
/// Two tiles are equal iff their points and resolutions are equal; the
/// status does not participate in identity.
#[derive(Debug, Clone)]
pub struct Tile {
    pub point: TilePoint,
    pub resolution: Resolution,
    pub status: TileStatus,
}

impl Tile {
    /// Creates a tile with status `Unknown`.
    pub fn new(point: TilePoint, resolution: Resolution) -> Self {
        Self {
            point,
            resolution,
            status: TileStatus::Unknown,
        }
    }

    /// The canonical name of the tile, derived from its reference point,
    /// e.g. `N34W118` or `S01E009`.
    pub fn name(&self) -> String {
        let TilePoint { lat, lon } = self.point;
        format!(
            "{}{:02}{}{:03}",
            if lat >= 0 { 'N' } else { 'S' },
            lat.unsigned_abs(),
            if lon >= 0 { 'E' } else { 'W' },
            lon.unsigned_abs(),
        )
    }

    /// The canonical filename of the compressed tile blob, identical in
    /// the remote archive and the local store, e.g.
    /// `N34W118.SRTMGL1.hgt.zip`.
    pub fn filename(&self) -> String {
        format!("{}.{}.hgt.zip", self.name(), self.resolution.dataset())
    }

    /// Parses a canonical tile name back into its reference point.
    ///
    /// Inverse of [`name`](Self::name): for every valid point,
    /// `parse_name(&tile.name())` returns the tile's point.
    pub fn parse_name(name: &str) -> Result<TilePoint, NameError> {
        let malformed = || NameError::Malformed(name.to_string());
        let bytes = name.as_bytes();
        if bytes.len() != 7 {
            return Err(malformed());
        }

        let lat_sign: i16 = match bytes[0] {
            b'N' => 1,
            b'S' => -1,
            _ => return Err(malformed()),
        };
        let lon_sign: i16 = match bytes[3] {
            b'E' => 1,
            b'W' => -1,
            _ => return Err(malformed()),
        };
        let lat_abs: i16 = name[1..3].parse().map_err(|_| malformed())?;
        let lon_abs: i16 = name[4..7].parse().map_err(|_| malformed())?;

        let lat = lat_sign * lat_abs;
        let lon = lon_sign * lon_abs;
        if !(crate::coord::MIN_LAT..=crate::coord::MAX_LAT).contains(&lat)
            || !(crate::coord::MIN_LON..=crate::coord::MAX_LON).contains(&lon)
        {
            return Err(malformed());
        }
        Ok(TilePoint { lat, lon })
    }
}

impl PartialEq for Tile {
    fn eq(&self, other: &Self) -> bool {
        self.point == other.point && self.resolution == other.resolution
    }
}

impl Eq for Tile {}

impl std::hash::Hash for Tile {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.point.hash(state);
        self.resolution.hash(state);
    }
}

impl fmt::Display for Tile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}
