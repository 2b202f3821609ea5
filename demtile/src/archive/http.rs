//! HTTP implementation of the tile archive client.

use std::time::Duration;

use tracing::{debug, warn};

use super::{ArchiveError, FetchOutcome, TileArchive};
use crate::auth::Credential;
use crate::tile::Tile;
use crate::BoxFuture;

/// Base URL of the USGS LP DAAC measures archive.
pub const DEFAULT_ARCHIVE_BASE: &str = "https://e4ftl01.cr.usgs.gov/MEASURES";

/// Default per-request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Archive client speaking HTTP(S) with basic auth and session cookies.
///
/// Earthdata authentication bounces the first request through a login
/// redirect and hands back a session cookie; enabling the cookie store
/// lets subsequent requests in the same batch reuse the session instead
/// of re-authenticating. The credential is installed once at
/// construction: one active credential context per client, not per task.
pub struct HttpTileArchive {
    client: reqwest::Client,
    base: String,
    credential: Option<Credential>,
    timeout: Duration,
}

impl HttpTileArchive {
    /// Creates a client for the given archive base URL.
    pub fn new(base: impl Into<String>, credential: Option<Credential>) -> Result<Self, ArchiveError> {
        Self::with_timeout(base, credential, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    /// Creates a client with a custom per-request timeout.
    pub fn with_timeout(
        base: impl Into<String>,
        credential: Option<Credential>,
        timeout: Duration,
    ) -> Result<Self, ArchiveError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .cookie_store(true)
            .build()
            .map_err(|e| ArchiveError::Client(e.to_string()))?;

        Ok(Self {
            client,
            base: base.into().trim_end_matches('/').to_string(),
            credential,
            timeout,
        })
    }

    /// The archive URL of one tile's blob, e.g.
    /// `<base>/SRTMGL1.003/2000.02.11/N34W118.SRTMGL1.hgt.zip`.
    pub fn tile_url(&self, tile: &Tile) -> String {
        format!(
            "{}/{}.003/2000.02.11/{}",
            self.base,
            tile.resolution.dataset(),
            tile.filename()
        )
    }
}

impl TileArchive for HttpTileArchive {
    fn fetch<'a>(&'a self, tile: &'a Tile) -> BoxFuture<'a, Result<FetchOutcome, ArchiveError>> {
        Box::pin(async move {
            let url = self.tile_url(tile);

            let mut request = self.client.get(&url);
            if let Some(credential) = &self.credential {
                request = request.basic_auth(&credential.username, Some(&credential.password));
            }

            let response = request.send().await.map_err(|e| {
                if e.is_timeout() {
                    ArchiveError::Timeout {
                        url: url.clone(),
                        timeout_secs: self.timeout.as_secs(),
                    }
                } else {
                    ArchiveError::Transport {
                        url: url.clone(),
                        reason: e.to_string(),
                    }
                }
            })?;

            let status = response.status();
            match status.as_u16() {
                401 | 403 => {
                    warn!(tile = %tile.name(), %status, "archive rejected credentials");
                    Err(ArchiveError::Authentication {
                        url,
                        status: status.as_u16(),
                    })
                }
                404 => {
                    debug!(tile = %tile.name(), "tile is not in the dataset");
                    Ok(FetchOutcome::NotFound)
                }
                _ if status.is_success() => {
                    let contents = response.bytes().await.map_err(|e| ArchiveError::Transport {
                        url,
                        reason: format!("failed to read response body: {}", e),
                    })?;
                    debug!(tile = %tile.name(), bytes = contents.len(), "fetched tile");
                    Ok(FetchOutcome::Found(contents.to_vec()))
                }
                _ => Err(ArchiveError::Transport {
                    url,
                    reason: format!("HTTP {}", status),
                }),
            }
        })
    }
}
