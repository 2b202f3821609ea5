//! The archive manager façade.
//!
//! [`ArchiveManager`] ties the components together and exposes the
//! operations surface consumed by the CLI: `sync` reconciles the index
//! against real store contents, `plan` reports tile-by-tile status for a
//! region without touching the network, `download` drives the worker
//! pool over a region's mosaic, and `authenticate` persists credentials.
//! Each operation is independently callable and idempotent.

use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use regex::Regex;
use thiserror::Error;
use tracing::info;

use crate::archive::{ArchiveConnector, ArchiveError, HttpConnector};
use crate::auth::{AuthError, CredentialStore, CREDENTIALS_FILENAME};
use crate::index::{index_filename, AvailabilityIndex, Correction, IndexError, StatusSummary};
use crate::mosaic::Mosaic;
use crate::pool::WorkerPool;
use crate::retriever::{RetrieveOutcome, Retriever};
use crate::store::{DiskStore, LocalStore, StoreError};
use crate::tile::{Resolution, TileStatus};

/// Default number of simultaneous connections to the remote archive.
pub const DEFAULT_POOL_SIZE: usize = 8;

/// Errors surfaced by manager operations.
#[derive(Debug, Error)]
pub enum ManagerError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Archive(#[from] ArchiveError),
}

/// Report produced by [`ArchiveManager::sync`].
#[derive(Debug)]
pub struct SyncReport {
    pub resolution: Resolution,
    /// Tile names present in the local store.
    pub tiles_present: usize,
    /// Corrective transitions applied by reconciliation.
    pub corrections: Vec<Correction>,
    /// Per-status counts over the global grid, after reconciliation.
    pub summary: StatusSummary,
}

impl fmt::Display for SyncReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "local store: {} tile{} present (SRTMGL{})",
            self.tiles_present,
            if self.tiles_present == 1 { "" } else { "s" },
            self.resolution
        )?;
        for correction in &self.corrections {
            writeln!(f, "  {}: {} -> {}", correction.name, correction.from, correction.to)?;
        }
        writeln!(f, "tile availability summary:")?;
        for (status, count) in self.summary.iter() {
            writeln!(
                f,
                "  {:>11}: {} tile{}",
                status.label(),
                count,
                if count == 1 { "" } else { "s" }
            )?;
        }
        Ok(())
    }
}

/// Report produced by [`ArchiveManager::plan`].
#[derive(Debug)]
pub struct PlanReport {
    /// (rows, cols) of the covering mosaic.
    pub shape: (usize, usize),
    /// Names of every tile needed to cover the region, in book order.
    pub necessary: Vec<String>,
    /// Tile names grouped by recorded status, in status encoding order.
    pub piles: Vec<(TileStatus, Vec<String>)>,
}

impl fmt::Display for PlanReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (rows, cols) = self.shape;
        writeln!(
            f,
            "mosaic: {}x{} grid, {} tile{}",
            rows,
            cols,
            self.necessary.len(),
            if self.necessary.len() == 1 { "" } else { "s" }
        )?;
        for (status, names) in &self.piles {
            writeln!(
                f,
                "  {:>11}: {} tile{}",
                status.label(),
                names.len(),
                if names.len() == 1 { "" } else { "s" }
            )?;
            for name in names {
                writeln!(f, "    {}", name)?;
            }
        }
        Ok(())
    }
}

/// Report produced by [`ArchiveManager::download`].
#[derive(Debug, Default)]
pub struct DownloadReport {
    /// Size of the work plan.
    pub planned: usize,
    /// Tiles fetched and written during this run.
    pub newly_cached: usize,
    /// Tiles skipped because the index already recorded a local copy.
    pub already_cached: usize,
    /// Tiles absent from the dataset (newly confirmed or already known).
    pub unavailable: usize,
    /// Tiles confirmed available but not cached (empty payload).
    pub confirmed_available: usize,
    /// Per-tile transport failures: (tile name, reason). These do not
    /// fail the batch.
    pub failures: Vec<(String, String)>,
}

impl fmt::Display for DownloadReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "work plan: {} tiles", self.planned)?;
        writeln!(f, "   newly cached: {}", self.newly_cached)?;
        writeln!(f, " already cached: {}", self.already_cached)?;
        writeln!(f, "    unavailable: {}", self.unavailable)?;
        if self.confirmed_available > 0 {
            writeln!(f, "      available: {}", self.confirmed_available)?;
        }
        if !self.failures.is_empty() {
            writeln!(f, "failures:")?;
            for (name, reason) in &self.failures {
                writeln!(f, "  {}: {}", name, reason)?;
            }
        }
        Ok(())
    }
}

/// Façade over the tile cache: store, index, credentials, and archive.
pub struct ArchiveManager {
    resolution: Resolution,
    store: Arc<dyn LocalStore>,
    index: Arc<AvailabilityIndex>,
    credentials: CredentialStore,
    connector: Arc<dyn ArchiveConnector>,
    pool_size: usize,
}

impl ArchiveManager {
    /// Opens a manager over the cache directory at `root`, with the
    /// production HTTP archive.
    ///
    /// The directory holds the tile blobs, the per-resolution
    /// availability index, and the credential store.
    pub fn open(root: impl AsRef<Path>, resolution: Resolution) -> Result<Self, ManagerError> {
        let root = root.as_ref();
        let store = Arc::new(DiskStore::open(root)?);
        let index = Arc::new(AvailabilityIndex::open(root.join(index_filename(resolution)))?);
        let credentials = CredentialStore::new(root.join(CREDENTIALS_FILENAME));
        Ok(Self::new(
            resolution,
            store,
            index,
            credentials,
            Arc::new(HttpConnector::default()),
        ))
    }

    /// Assembles a manager from explicitly chosen collaborators.
    pub fn new(
        resolution: Resolution,
        store: Arc<dyn LocalStore>,
        index: Arc<AvailabilityIndex>,
        credentials: CredentialStore,
        connector: Arc<dyn ArchiveConnector>,
    ) -> Self {
        Self {
            resolution,
            store,
            index,
            credentials,
            connector,
            pool_size: DEFAULT_POOL_SIZE,
        }
    }

    /// Sets the worker pool size used by `download`.
    pub fn with_pool_size(mut self, size: usize) -> Self {
        self.pool_size = size.max(1);
        self
    }

    /// The pattern matching this resolution's tile filenames in the
    /// store, capturing the tile name.
    fn filename_pattern(&self) -> Regex {
        Regex::new(&format!(
            r"^(?P<name>(N|S)\d{{2}}(E|W)\d{{3}})\.{}\.hgt\.zip$",
            self.resolution.dataset()
        ))
        .expect("tile filename pattern is valid")
    }

    /// Reconciles the availability index with the actual contents of the
    /// local store, over the entire global grid.
    ///
    /// Local-only: never touches the network.
    pub async fn sync(&self) -> Result<SyncReport, ManagerError> {
        let pattern = self.filename_pattern();
        let filenames = self.store.list(&pattern).await?;
        let names: HashSet<String> = filenames
            .iter()
            .filter_map(|filename| {
                pattern
                    .captures(filename)
                    .and_then(|captures| captures.name("name"))
                    .map(|m| m.as_str().to_string())
            })
            .collect();

        let globe = Mosaic::global(self.resolution);
        let corrections = self.index.reconcile(&names, &globe)?;
        let summary = self.index.summary()?;

        info!(
            present = names.len(),
            corrections = corrections.len(),
            "synced availability index"
        );
        Ok(SyncReport {
            resolution: self.resolution,
            tiles_present: names.len(),
            corrections,
            summary,
        })
    }

    /// Describes the work required to cover `region`: the mosaic's shape
    /// and every tile's recorded status.
    ///
    /// Local-only: never touches the network.
    pub fn plan(&self, region: &[(f64, f64)]) -> Result<PlanReport, ManagerError> {
        let mosaic = Mosaic::cover(region, self.resolution);

        let mut piles: Vec<(TileStatus, Vec<String>)> = TileStatus::ALL
            .iter()
            .map(|&status| (status, Vec::new()))
            .collect();
        for tile in &mosaic {
            let status = self.index.get(tile.point)?;
            piles[status.as_byte() as usize].1.push(tile.name());
        }

        Ok(PlanReport {
            shape: mosaic.shape(),
            necessary: mosaic.tiles().iter().map(|t| t.name()).collect(),
            piles,
        })
    }

    /// Retrieves every tile needed to cover `region`.
    ///
    /// Credentials are resolved once (explicit values first, then the
    /// credential store) and installed into a fresh archive client; the
    /// mosaic's tiles are then drained by a bounded worker pool against
    /// the shared index and store. An authentication failure aborts the
    /// batch; per-tile unavailability and transport failures do not.
    pub async fn download(
        &self,
        region: &[(f64, f64)],
        username: Option<&str>,
        password: Option<&str>,
    ) -> Result<DownloadReport, ManagerError> {
        let mosaic = Mosaic::cover(region, self.resolution);
        let credential = self.credentials.resolve(username, password)?;
        let archive = self.connector.connect(credential)?;

        let retriever = Arc::new(Retriever::new(
            archive,
            Arc::clone(&self.store),
            Arc::clone(&self.index),
        ));
        let pool = WorkerPool::new(self.pool_size);

        let planned = mosaic.len();
        info!(tiles = planned, workers = pool.size(), "starting download batch");
        let outcome = pool.run(mosaic.into_tiles(), retriever).await;

        if let Some(err) = outcome.auth_failure {
            return Err(ManagerError::Archive(err));
        }

        let mut report = DownloadReport {
            planned,
            newly_cached: outcome.count(RetrieveOutcome::Cached),
            already_cached: outcome.count(RetrieveOutcome::AlreadyCached),
            unavailable: outcome.count(RetrieveOutcome::MarkedUnavailable)
                + outcome.count(RetrieveOutcome::KnownUnavailable),
            confirmed_available: outcome.count(RetrieveOutcome::ConfirmedAvailable),
            ..Default::default()
        };
        for result in &outcome.results {
            if let Err(e) = &result.result {
                report.failures.push((result.tile.name(), e.to_string()));
            }
        }

        info!(
            cached = report.newly_cached,
            unavailable = report.unavailable,
            failures = report.failures.len(),
            "download batch finished"
        );
        Ok(report)
    }

    /// Persists a credential for later resolution.
    pub fn authenticate(&self, username: &str, password: &str) -> Result<(), ManagerError> {
        self.credentials.store(username, password)?;
        Ok(())
    }
}
