//! End-to-end retrieval scenarios against a scripted archive.
//!
//! These tests exercise the full stack below the manager façade: region
//! to mosaic, credential resolution, the worker pool, the availability
//! index on disk, and the blob store, with only the HTTP layer replaced.

use std::collections::HashMap;
use std::sync::Arc;

use demtile::archive::{ArchiveConnector, ArchiveError, FetchOutcome, TileArchive};
use demtile::auth::{Credential, CredentialStore, CREDENTIALS_FILENAME};
use demtile::coord::TilePoint;
use demtile::index::{index_filename, AvailabilityIndex};
use demtile::manager::{ArchiveManager, ManagerError};
use demtile::store::{DiskStore, LocalStore, StoreError};
use demtile::tile::{Resolution, Tile, TileStatus};
use demtile::BoxFuture;

/// Archive double backed by a fixed name -> blob map.
///
/// Tiles present in the map are served; everything else is a confirmed
/// miss. An expected credential, when set, turns mismatches into
/// authentication failures the way the production archive would.
struct ScriptedArchive {
    blobs: HashMap<String, Vec<u8>>,
    expected: Option<Credential>,
    presented: Option<Credential>,
}

impl TileArchive for ScriptedArchive {
    fn fetch<'a>(&'a self, tile: &'a Tile) -> BoxFuture<'a, Result<FetchOutcome, ArchiveError>> {
        Box::pin(async move {
            if let Some(expected) = &self.expected {
                if self.presented.as_ref() != Some(expected) {
                    return Err(ArchiveError::Authentication {
                        url: format!("http://archive.test/{}", tile.filename()),
                        status: 401,
                    });
                }
            }
            match self.blobs.get(&tile.name()) {
                Some(blob) => Ok(FetchOutcome::Found(blob.clone())),
                None => Ok(FetchOutcome::NotFound),
            }
        })
    }
}

struct ScriptedConnector {
    blobs: HashMap<String, Vec<u8>>,
    expected: Option<Credential>,
}

impl ArchiveConnector for ScriptedConnector {
    fn connect(&self, credential: Credential) -> Result<Arc<dyn TileArchive>, ArchiveError> {
        Ok(Arc::new(ScriptedArchive {
            blobs: self.blobs.clone(),
            expected: self.expected.clone(),
            presented: Some(credential),
        }))
    }
}

struct Harness {
    _dir: tempfile::TempDir,
    manager: ArchiveManager,
    store: Arc<DiskStore>,
    index: Arc<AvailabilityIndex>,
}

fn harness(blobs: &[(&str, Vec<u8>)], expected: Option<Credential>) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(DiskStore::open(dir.path()).unwrap());
    let index = Arc::new(
        AvailabilityIndex::open(dir.path().join(index_filename(Resolution::One))).unwrap(),
    );
    let credentials = CredentialStore::new(dir.path().join(CREDENTIALS_FILENAME));
    let connector = Arc::new(ScriptedConnector {
        blobs: blobs
            .iter()
            .map(|(name, blob)| (name.to_string(), blob.clone()))
            .collect(),
        expected,
    });
    let manager = ArchiveManager::new(
        Resolution::One,
        store.clone(),
        index.clone(),
        credentials,
        connector,
    )
    .with_pool_size(4);
    Harness {
        _dir: dir,
        manager,
        store,
        index,
    }
}

/// Uncompressed size of a one-arc-second tile: two bytes per sample.
fn one_arcsecond_payload() -> Vec<u8> {
    vec![0u8; 2 * 3601 * 3601]
}

#[tokio::test]
async fn missing_tile_is_marked_unavailable_and_nothing_is_written() {
    let hx = harness(&[], None);

    let report = hx
        .manager
        .download(&[(0.5, 0.5)], Some("user"), Some("pass"))
        .await
        .unwrap();

    assert_eq!(report.planned, 1);
    assert_eq!(report.unavailable, 1);
    assert_eq!(report.newly_cached, 0);
    assert_eq!(
        hx.index.get(TilePoint::new(0, 0)).unwrap(),
        TileStatus::Unavailable
    );
    assert!(matches!(
        hx.store.read("N00E000.SRTMGL1.hgt.zip").await,
        Err(StoreError::NotFound { .. })
    ));
}

#[tokio::test]
async fn present_tile_is_cached_with_full_payload() {
    let hx = harness(&[("N34W118", one_arcsecond_payload())], None);

    let report = hx
        .manager
        .download(&[(34.2, -117.9)], Some("user"), Some("pass"))
        .await
        .unwrap();

    assert_eq!(report.newly_cached, 1);
    assert_eq!(
        hx.index.get(TilePoint::new(34, -118)).unwrap(),
        TileStatus::Cached
    );
    let blob = hx.store.read("N34W118.SRTMGL1.hgt.zip").await.unwrap();
    assert_eq!(blob.len(), 2 * 3601 * 3601);
}

#[tokio::test]
async fn cached_tiles_are_not_refetched_on_a_second_run() {
    let hx = harness(&[("N34W118", vec![1u8; 64])], None);
    let region = [(34.2, -117.9)];

    let first = hx
        .manager
        .download(&region, Some("user"), Some("pass"))
        .await
        .unwrap();
    let second = hx
        .manager
        .download(&region, Some("user"), Some("pass"))
        .await
        .unwrap();

    assert_eq!(first.newly_cached, 1);
    assert_eq!(second.newly_cached, 0);
    assert_eq!(second.already_cached, 1);
}

#[tokio::test]
async fn overlapping_regions_leave_a_consistent_index() {
    // 3x3 grid of blobs around the origin; two overlapping 2x2 regions
    let mut blobs = Vec::new();
    let payloads: Vec<Vec<u8>> = (0..9).map(|i| vec![i as u8; 32]).collect();
    let names: Vec<String> = (0..3)
        .flat_map(|lat| (0..3).map(move |lon| format!("N0{}E00{}", lat, lon)))
        .collect();
    for (name, payload) in names.iter().zip(&payloads) {
        blobs.push((name.as_str(), payload.clone()));
    }
    let hx = harness(&blobs, None);

    let first = hx
        .manager
        .download(&[(0.0, 0.0), (1.0, 1.0)], Some("user"), Some("pass"))
        .await
        .unwrap();
    let second = hx
        .manager
        .download(&[(1.0, 1.0), (2.0, 2.0)], Some("user"), Some("pass"))
        .await
        .unwrap();

    assert_eq!(first.newly_cached, 4);
    // the (1,1) tile overlaps and is already cached
    assert_eq!(second.newly_cached, 3);
    assert_eq!(second.already_cached, 1);

    for lat in 0..3i16 {
        for lon in 0..3i16 {
            let expected = if (0..=2).contains(&lat) && (0..=2).contains(&lon) {
                // corners (0,2) and (2,0) lie outside both 2x2 regions
                if (lat, lon) == (0, 2) || (lat, lon) == (2, 0) {
                    TileStatus::Unknown
                } else {
                    TileStatus::Cached
                }
            } else {
                TileStatus::Unknown
            };
            assert_eq!(
                hx.index.get(TilePoint::new(lat, lon)).unwrap(),
                expected,
                "tile ({}, {})",
                lat,
                lon
            );
        }
    }
}

#[tokio::test]
async fn sync_after_manual_deletion_demotes_the_tile() {
    let hx = harness(&[("N10E020", vec![9u8; 48])], None);

    hx.manager
        .download(&[(10.5, 20.5)], Some("user"), Some("pass"))
        .await
        .unwrap();
    assert_eq!(
        hx.index.get(TilePoint::new(10, 20)).unwrap(),
        TileStatus::Cached
    );

    // simulate the user deleting the blob out from under us
    std::fs::remove_file(hx.store.root().join("N10E020.SRTMGL1.hgt.zip")).unwrap();

    let report = hx.manager.sync().await.unwrap();
    assert_eq!(report.corrections.len(), 1);
    assert_eq!(
        hx.index.get(TilePoint::new(10, 20)).unwrap(),
        TileStatus::Available
    );
}

#[tokio::test]
async fn stored_credential_is_used_when_none_is_given() {
    let expected = Credential {
        username: "user".to_string(),
        password: "hunter2".to_string(),
    };
    let hx = harness(&[("N00E000", vec![1u8; 16])], Some(expected));

    hx.manager.authenticate("user", "hunter2").unwrap();
    let report = hx.manager.download(&[(0.5, 0.5)], None, None).await.unwrap();

    assert_eq!(report.newly_cached, 1);
}

#[tokio::test]
async fn wrong_credential_fails_the_whole_batch() {
    let expected = Credential {
        username: "user".to_string(),
        password: "hunter2".to_string(),
    };
    let hx = harness(&[("N00E000", vec![1u8; 16])], Some(expected));

    let err = hx
        .manager
        .download(&[(0.5, 0.5), (1.5, 1.5)], Some("user"), Some("wrong"))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ManagerError::Archive(ArchiveError::Authentication { .. })
    ));
    // a rejected credential must not poison the index
    assert_eq!(
        hx.index.get(TilePoint::new(0, 0)).unwrap(),
        TileStatus::Unknown
    );
    assert_eq!(
        hx.index.get(TilePoint::new(1, 1)).unwrap(),
        TileStatus::Unknown
    );
}
