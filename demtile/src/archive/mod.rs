//! Remote archive client: fetching tile blobs over HTTP.
//!
//! The [`TileArchive`] trait is the seam between the retrieval engine and
//! the network; [`HttpTileArchive`] is the production implementation
//! against the USGS LP DAAC archive. HTTP outcomes are classified into
//! the domain's terms here: a 404 is not an error but a confirmed
//! "the dataset does not include this tile".

mod http;

pub use http::{HttpTileArchive, DEFAULT_ARCHIVE_BASE};

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::auth::Credential;
use crate::tile::Tile;
use crate::BoxFuture;

/// Errors raised while fetching a tile from the remote archive.
#[derive(Debug, Clone, Error)]
pub enum ArchiveError {
    /// The archive rejected our credentials (HTTP 401/403). Fatal for
    /// the whole batch using this credential, not just the one tile.
    #[error("archive rejected credentials fetching {url} (HTTP {status})")]
    Authentication { url: String, status: u16 },

    /// The fetch did not complete within its timeout. No automatic retry.
    #[error("request to {url} timed out after {timeout_secs}s")]
    Timeout { url: String, timeout_secs: u64 },

    /// Any other transport failure; propagated unmodified to the caller.
    #[error("transport error fetching {url}: {reason}")]
    Transport { url: String, reason: String },

    #[error("failed to create HTTP client: {0}")]
    Client(String),
}

/// Outcome of a completed (non-failing) archive fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The archive holds the tile; here is its compressed byte stream.
    Found(Vec<u8>),
    /// The archive confirmed the dataset does not include this tile.
    NotFound,
}

/// A remote source of tile byte streams.
pub trait TileArchive: Send + Sync {
    /// Fetches the compressed blob for one tile.
    fn fetch<'a>(&'a self, tile: &'a Tile) -> BoxFuture<'a, Result<FetchOutcome, ArchiveError>>;
}

/// Builds an archive client bound to a resolved credential.
///
/// The manager resolves credentials once per download batch and asks the
/// connector for a client carrying them; injecting a connector is how
/// tests substitute a scripted archive for the real one.
pub trait ArchiveConnector: Send + Sync {
    fn connect(&self, credential: Credential) -> Result<Arc<dyn TileArchive>, ArchiveError>;
}

/// Connector for the production HTTP archive.
pub struct HttpConnector {
    pub base: String,
    pub timeout: Duration,
}

impl Default for HttpConnector {
    fn default() -> Self {
        Self {
            base: DEFAULT_ARCHIVE_BASE.to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

impl ArchiveConnector for HttpConnector {
    fn connect(&self, credential: Credential) -> Result<Arc<dyn TileArchive>, ArchiveError> {
        Ok(Arc::new(HttpTileArchive::with_timeout(
            self.base.clone(),
            Some(credential),
            self.timeout,
        )?))
    }
}
