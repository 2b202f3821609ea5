//! Per-tile retrieval: the unit of work executed by pool workers.
//!
//! A retriever owns shared handles to the archive client, the local
//! store, and the availability index, and runs one tile through the
//! retrieval state machine: consult the index, skip or fetch, classify
//! the outcome, persist the blob, and record every status change in the
//! index the moment it happens. Because each mutation is persisted
//! immediately, a crash mid-batch leaves the index consistent with the
//! work that actually completed.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info};

use crate::archive::{ArchiveError, FetchOutcome, TileArchive};
use crate::index::{AvailabilityIndex, IndexError};
use crate::store::{LocalStore, StoreError};
use crate::tile::{Tile, TileStatus};

/// How one tile's retrieval concluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetrieveOutcome {
    /// The index already recorded the tile as absent from the dataset;
    /// nothing was fetched.
    KnownUnavailable,
    /// The index already recorded a local copy; nothing was fetched.
    AlreadyCached,
    /// The archive confirmed the tile is absent; recorded in the index.
    MarkedUnavailable,
    /// The archive returned an empty payload. The tile is recorded
    /// `Available` but nothing was cached.
    ConfirmedAvailable,
    /// The blob was fetched, written to the store, and recorded `Cached`.
    Cached,
}

/// Errors raised while retrieving one tile.
///
/// An [`ArchiveError::Authentication`] inside the `Archive` variant is a
/// batch-wide condition; everything else concerns only the one tile.
#[derive(Debug, Error)]
pub enum RetrieveError {
    #[error(transparent)]
    Archive(#[from] ArchiveError),

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl RetrieveError {
    /// Whether this failure invalidates the whole batch's credential.
    pub fn is_authentication(&self) -> bool {
        matches!(
            self,
            RetrieveError::Archive(ArchiveError::Authentication { .. })
        )
    }
}

/// Fetches single tiles against a shared index and store.
pub struct Retriever {
    archive: Arc<dyn TileArchive>,
    store: Arc<dyn LocalStore>,
    index: Arc<AvailabilityIndex>,
}

impl Retriever {
    pub fn new(
        archive: Arc<dyn TileArchive>,
        store: Arc<dyn LocalStore>,
        index: Arc<AvailabilityIndex>,
    ) -> Self {
        Self {
            archive,
            store,
            index,
        }
    }

    /// Runs one tile through the retrieval state machine.
    ///
    /// Tiles already recorded `Unavailable` or `Cached` are skipped at
    /// zero cost. Otherwise the archive is consulted: a confirmed miss is
    /// recorded `Unavailable`, a payload is recorded `Available`, written
    /// to the store, then recorded `Cached`. An authentication failure
    /// leaves the tile's index entry untouched.
    pub async fn retrieve(&self, tile: &Tile) -> Result<RetrieveOutcome, RetrieveError> {
        let name = tile.name();

        match self.index.get(tile.point)? {
            TileStatus::Unavailable => {
                debug!(tile = %name, "tile is known to be unavailable");
                return Ok(RetrieveOutcome::KnownUnavailable);
            }
            TileStatus::Cached => {
                debug!(tile = %name, "tile is already cached");
                return Ok(RetrieveOutcome::AlreadyCached);
            }
            TileStatus::Unknown | TileStatus::Available => {}
        }

        let contents = match self.archive.fetch(tile).await? {
            FetchOutcome::NotFound => {
                self.index.set(tile.point, TileStatus::Unavailable)?;
                info!(tile = %name, "tile is unavailable in the archive");
                return Ok(RetrieveOutcome::MarkedUnavailable);
            }
            FetchOutcome::Found(contents) => {
                self.index.set(tile.point, TileStatus::Available)?;
                contents
            }
        };

        if contents.is_empty() {
            // nothing to cache; the index already records the tile as available
            return Ok(RetrieveOutcome::ConfirmedAvailable);
        }

        self.store.write(&tile.filename(), contents).await?;
        self.index.set(tile.point, TileStatus::Cached)?;
        info!(tile = %name, "tile is now cached");
        Ok(RetrieveOutcome::Cached)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::archive::FetchOutcome;
    use crate::coord::TilePoint;
    use crate::index::index_filename;
    use crate::store::DiskStore;
    use crate::tile::Resolution;
    use crate::BoxFuture;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Archive double that serves a fixed response and counts fetches.
    pub(crate) struct MockArchive {
        pub response: Result<FetchOutcome, ArchiveError>,
        pub fetches: AtomicUsize,
    }

    impl MockArchive {
        pub fn new(response: Result<FetchOutcome, ArchiveError>) -> Self {
            Self {
                response,
                fetches: AtomicUsize::new(0),
            }
        }
    }

    impl TileArchive for MockArchive {
        fn fetch<'a>(
            &'a self,
            _tile: &'a Tile,
        ) -> BoxFuture<'a, Result<FetchOutcome, ArchiveError>> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            let response = self.response.clone();
            Box::pin(async move { response })
        }
    }

    struct Fixture {
        _dir: tempfile::TempDir,
        store: Arc<DiskStore>,
        index: Arc<AvailabilityIndex>,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(DiskStore::open(dir.path().join("store")).unwrap());
        let index = Arc::new(
            AvailabilityIndex::open(dir.path().join(index_filename(Resolution::One))).unwrap(),
        );
        Fixture {
            _dir: dir,
            store,
            index,
        }
    }

    fn tile() -> Tile {
        Tile::new(TilePoint::new(34, -118), Resolution::One)
    }

    #[tokio::test]
    async fn test_payload_is_cached_and_indexed() {
        let fx = fixture();
        let archive = Arc::new(MockArchive::new(Ok(FetchOutcome::Found(vec![7u8; 128]))));
        let retriever = Retriever::new(archive, fx.store.clone(), fx.index.clone());

        let outcome = retriever.retrieve(&tile()).await.unwrap();

        assert_eq!(outcome, RetrieveOutcome::Cached);
        assert_eq!(fx.index.get(tile().point).unwrap(), TileStatus::Cached);
        let blob = fx.store.read("N34W118.SRTMGL1.hgt.zip").await.unwrap();
        assert_eq!(blob.len(), 128);
    }

    #[tokio::test]
    async fn test_archive_miss_is_marked_unavailable() {
        let fx = fixture();
        let archive = Arc::new(MockArchive::new(Ok(FetchOutcome::NotFound)));
        let retriever = Retriever::new(archive, fx.store.clone(), fx.index.clone());

        let outcome = retriever.retrieve(&tile()).await.unwrap();

        assert_eq!(outcome, RetrieveOutcome::MarkedUnavailable);
        assert_eq!(fx.index.get(tile().point).unwrap(), TileStatus::Unavailable);
        assert!(matches!(
            fx.store.read("N34W118.SRTMGL1.hgt.zip").await,
            Err(StoreError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_known_unavailable_skips_fetch() {
        let fx = fixture();
        fx.index.set(tile().point, TileStatus::Unavailable).unwrap();
        let archive = Arc::new(MockArchive::new(Ok(FetchOutcome::NotFound)));
        let retriever = Retriever::new(archive.clone(), fx.store.clone(), fx.index.clone());

        let outcome = retriever.retrieve(&tile()).await.unwrap();

        assert_eq!(outcome, RetrieveOutcome::KnownUnavailable);
        assert_eq!(archive.fetches.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_already_cached_skips_fetch() {
        let fx = fixture();
        fx.index.set(tile().point, TileStatus::Cached).unwrap();
        let archive = Arc::new(MockArchive::new(Ok(FetchOutcome::Found(vec![1]))));
        let retriever = Retriever::new(archive.clone(), fx.store.clone(), fx.index.clone());

        let outcome = retriever.retrieve(&tile()).await.unwrap();

        assert_eq!(outcome, RetrieveOutcome::AlreadyCached);
        assert_eq!(archive.fetches.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_authentication_failure_leaves_index_untouched() {
        let fx = fixture();
        let archive = Arc::new(MockArchive::new(Err(ArchiveError::Authentication {
            url: "http://archive.example/tile".into(),
            status: 401,
        })));
        let retriever = Retriever::new(archive, fx.store.clone(), fx.index.clone());

        let err = retriever.retrieve(&tile()).await.unwrap_err();

        assert!(err.is_authentication());
        assert_eq!(fx.index.get(tile().point).unwrap(), TileStatus::Unknown);
    }

    #[tokio::test]
    async fn test_transport_failure_propagates_unmodified() {
        let fx = fixture();
        let archive = Arc::new(MockArchive::new(Err(ArchiveError::Transport {
            url: "http://archive.example/tile".into(),
            reason: "HTTP 503".into(),
        })));
        let retriever = Retriever::new(archive, fx.store.clone(), fx.index.clone());

        let err = retriever.retrieve(&tile()).await.unwrap_err();

        assert!(!err.is_authentication());
        assert!(matches!(
            err,
            RetrieveError::Archive(ArchiveError::Transport { .. })
        ));
        assert_eq!(fx.index.get(tile().point).unwrap(), TileStatus::Unknown);
    }

    #[tokio::test]
    async fn test_empty_payload_confirms_available_without_caching() {
        let fx = fixture();
        let archive = Arc::new(MockArchive::new(Ok(FetchOutcome::Found(Vec::new()))));
        let retriever = Retriever::new(archive, fx.store.clone(), fx.index.clone());

        let outcome = retriever.retrieve(&tile()).await.unwrap();

        assert_eq!(outcome, RetrieveOutcome::ConfirmedAvailable);
        assert_eq!(fx.index.get(tile().point).unwrap(), TileStatus::Available);
        assert!(matches!(
            fx.store.read("N34W118.SRTMGL1.hgt.zip").await,
            Err(StoreError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_available_tile_is_refetched() {
        // a previous run confirmed existence but the write never happened
        let fx = fixture();
        fx.index.set(tile().point, TileStatus::Available).unwrap();
        let archive = Arc::new(MockArchive::new(Ok(FetchOutcome::Found(vec![9u8; 16]))));
        let retriever = Retriever::new(archive.clone(), fx.store.clone(), fx.index.clone());

        let outcome = retriever.retrieve(&tile()).await.unwrap();

        assert_eq!(outcome, RetrieveOutcome::Cached);
        assert_eq!(archive.fetches.load(Ordering::SeqCst), 1);
    }
}
