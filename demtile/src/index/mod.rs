//! The persistent tile availability index.
//!
//! One index file exists per resolution, alongside the cache root. The
//! file is a fixed-size table: an 8-byte header followed by one status
//! byte for every cell of the global grid, addressed by
//! [`TilePoint::grid_offset`]. This supports point-granularity random
//! access without ever loading the whole grid, and survives process
//! restarts.
//!
//! # Concurrency
//!
//! `get` and `set` take a shared reference and serialize on an internal
//! mutex around the file handle, so they are safe to call from any number
//! of workers. Distinct tiles touch disjoint bytes, so no cross-entry
//! ordering is needed; each single-byte write is atomic with respect to
//! concurrent readers.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, info};

use crate::coord::{TilePoint, GRID_CELLS};
use crate::mosaic::Mosaic;
use crate::tile::{Resolution, TileStatus};

/// Magic bytes opening a version-1 index file.
const MAGIC: &[u8; 7] = b"DEMAVIX";
/// Current index file format version.
const VERSION: u8 = 1;
/// Header length in bytes: magic plus version.
const HEADER_LEN: u64 = 8;
/// Total index file size in bytes.
const FILE_LEN: u64 = HEADER_LEN + GRID_CELLS as u64;

/// Errors raised by availability index operations.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("index I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// The index file exists but is not a readable version-1 index.
    /// Corrupt indexes are never auto-repaired.
    #[error("corrupt availability index: {path}")]
    Corrupt { path: PathBuf },
}

/// Filename of the index for a given resolution, e.g. `srtmgl1.idx`.
pub fn index_filename(resolution: Resolution) -> String {
    format!("srtmgl{}.idx", resolution.arcseconds())
}

/// One corrective transition applied by [`AvailabilityIndex::reconcile`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Correction {
    pub name: String,
    pub from: TileStatus,
    pub to: TileStatus,
}

/// Per-status tile counts over the global grid.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusSummary {
    counts: [u64; 4],
}

impl StatusSummary {
    /// The number of tiles recorded at `status`.
    pub fn count(&self, status: TileStatus) -> u64 {
        self.counts[status.as_byte() as usize]
    }

    /// Iterates (status, count) pairs in encoding order.
    pub fn iter(&self) -> impl Iterator<Item = (TileStatus, u64)> + '_ {
        TileStatus::ALL.iter().map(|&s| (s, self.count(s)))
    }
}

/// The persistent mapping from every grid point to its last-known status.
///
/// Absent entries behave as [`TileStatus::Unknown`]; a freshly created
/// index file is zero-filled, which encodes exactly that.
pub struct AvailabilityIndex {
    file: Mutex<File>,
    path: PathBuf,
}

impl AvailabilityIndex {
    /// Opens the index at `path`, creating a fresh all-`Unknown` index if
    /// the file does not exist.
    ///
    /// An existing file with the wrong size, magic, or version is
    /// reported as [`IndexError::Corrupt`] and never repaired in place.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, IndexError> {
        let path = path.as_ref().to_path_buf();

        if !path.exists() {
            info!(path = %path.display(), "creating new availability index");
            let mut file = OpenOptions::new()
                .read(true)
                .write(true)
                .create_new(true)
                .open(&path)?;
            let mut contents = Vec::with_capacity(FILE_LEN as usize);
            contents.extend_from_slice(MAGIC);
            contents.push(VERSION);
            contents.resize(FILE_LEN as usize, TileStatus::Unknown.as_byte());
            file.write_all(&contents)?;
            return Ok(Self {
                file: Mutex::new(file),
                path,
            });
        }

        let mut file = OpenOptions::new().read(true).write(true).open(&path)?;
        if file.metadata()?.len() != FILE_LEN {
            return Err(IndexError::Corrupt { path });
        }
        let mut header = [0u8; HEADER_LEN as usize];
        file.read_exact(&mut header)?;
        if &header[..7] != MAGIC || header[7] != VERSION {
            return Err(IndexError::Corrupt { path });
        }

        debug!(path = %path.display(), "opened availability index");
        Ok(Self {
            file: Mutex::new(file),
            path,
        })
    }

    /// The path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the recorded status of one tile point.
    pub fn get(&self, point: TilePoint) -> Result<TileStatus, IndexError> {
        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(HEADER_LEN + point.grid_offset() as u64))?;
        let mut byte = [0u8; 1];
        file.read_exact(&mut byte)?;
        TileStatus::from_byte(byte[0]).ok_or_else(|| IndexError::Corrupt {
            path: self.path.clone(),
        })
    }

    /// Records the status of one tile point.
    ///
    /// The write hits the backing file before the call returns, so a
    /// crash mid-batch leaves the index consistent with the work that
    /// actually completed.
    pub fn set(&self, point: TilePoint, status: TileStatus) -> Result<(), IndexError> {
        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(HEADER_LEN + point.grid_offset() as u64))?;
        file.write_all(&[status.as_byte()])?;
        Ok(())
    }

    /// Reconciles the index against the actual contents of the local
    /// store for every tile in `mosaic`.
    ///
    /// `local_names` is the set of tile names present in the store.
    /// Exactly two corrective transitions exist:
    ///
    /// - a tile present locally but not recorded `Cached` is promoted to
    ///   `Cached`;
    /// - a tile recorded `Cached` but absent locally is demoted to
    ///   `Available` (the archive is still assumed to know the tile
    ///   exists; only local presence is revised).
    ///
    /// Local presence is a weaker signal than archive-confirmed absence,
    /// so reconciliation never touches `Unavailable` and never promotes
    /// `Unknown` to `Available`. Running it twice with unchanged store
    /// contents is a no-op the second time.
    pub fn reconcile(
        &self,
        local_names: &std::collections::HashSet<String>,
        mosaic: &Mosaic,
    ) -> Result<Vec<Correction>, IndexError> {
        let mut corrections = Vec::new();

        for tile in mosaic {
            let name = tile.name();
            let is_cached = local_names.contains(&name);
            let status = self.get(tile.point)?;

            if is_cached && status != TileStatus::Cached {
                self.set(tile.point, TileStatus::Cached)?;
                debug!(tile = %name, "marked tile as locally cached");
                corrections.push(Correction {
                    name,
                    from: status,
                    to: TileStatus::Cached,
                });
            } else if status == TileStatus::Cached && !is_cached {
                self.set(tile.point, TileStatus::Available)?;
                debug!(tile = %name, "tile has disappeared from the local store");
                corrections.push(Correction {
                    name,
                    from: status,
                    to: TileStatus::Available,
                });
            }
        }

        Ok(corrections)
    }

    /// Counts tiles per status over the whole global grid.
    pub fn summary(&self) -> Result<StatusSummary, IndexError> {
        let mut body = vec![0u8; GRID_CELLS];
        {
            let mut file = self.file.lock();
            file.seek(SeekFrom::Start(HEADER_LEN))?;
            file.read_exact(&mut body)?;
        }

        let mut summary = StatusSummary::default();
        for byte in body {
            let status = TileStatus::from_byte(byte).ok_or_else(|| IndexError::Corrupt {
                path: self.path.clone(),
            })?;
            summary.counts[status.as_byte() as usize] += 1;
        }
        Ok(summary)
    }
}
