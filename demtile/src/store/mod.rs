//! Local tile store: the on-disk directory of downloaded tile blobs.
//!
//! The store is a flat directory holding one zip-compressed file per
//! cached tile, named identically to its remote filename. The [`LocalStore`]
//! trait is the seam the retrieval engine works against; [`DiskStore`] is
//! the production implementation.

use std::path::{Path, PathBuf};

use regex::Regex;
use thiserror::Error;
use tracing::debug;

use crate::BoxFuture;

/// Errors raised by local store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The named blob does not exist in the store. Callers that tolerate
    /// a missing blob (first-ever sync, empty caches) match on this.
    #[error("not found in local store: {name}")]
    NotFound { name: String },

    #[error("store I/O failed at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Byte-blob storage for tile files.
///
/// Implementations must make each `write` atomic: a concurrent reader
/// either sees the complete blob or no blob at all, never a partial one.
pub trait LocalStore: Send + Sync {
    /// Lists the filenames in the store matching `pattern`.
    fn list<'a>(&'a self, pattern: &'a Regex) -> BoxFuture<'a, Result<Vec<String>, StoreError>>;

    /// Reads a blob by filename.
    ///
    /// Returns [`StoreError::NotFound`] when the blob does not exist,
    /// distinguishable from other I/O failures.
    fn read<'a>(&'a self, name: &'a str) -> BoxFuture<'a, Result<Vec<u8>, StoreError>>;

    /// Writes a blob under `name`, replacing any previous contents.
    fn write<'a>(
        &'a self,
        name: &'a str,
        contents: Vec<u8>,
    ) -> BoxFuture<'a, Result<(), StoreError>>;
}

/// Directory-backed [`LocalStore`].
///
/// Writes go through a temporary file followed by a rename, so readers
/// never observe a partially written blob.
pub struct DiskStore {
    root: PathBuf,
}

impl DiskStore {
    /// Opens the store rooted at `root`, creating the directory if needed.
    pub fn open(root: impl AsRef<Path>) -> Result<Self, StoreError> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root).map_err(|source| StoreError::Io {
            path: root.clone(),
            source,
        })?;
        Ok(Self { root })
    }

    /// The store's root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn io_error(&self, path: PathBuf) -> impl FnOnce(std::io::Error) -> StoreError {
        move |source| StoreError::Io { path, source }
    }
}

impl LocalStore for DiskStore {
    fn list<'a>(&'a self, pattern: &'a Regex) -> BoxFuture<'a, Result<Vec<String>, StoreError>> {
        Box::pin(async move {
            let mut entries = tokio::fs::read_dir(&self.root)
                .await
                .map_err(self.io_error(self.root.clone()))?;

            let mut names = Vec::new();
            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(self.io_error(self.root.clone()))?
            {
                let filename = entry.file_name();
                let Some(filename) = filename.to_str() else {
                    continue;
                };
                if pattern.is_match(filename) {
                    names.push(filename.to_string());
                }
            }
            Ok(names)
        })
    }

    fn read<'a>(&'a self, name: &'a str) -> BoxFuture<'a, Result<Vec<u8>, StoreError>> {
        Box::pin(async move {
            let path = self.root.join(name);
            match tokio::fs::read(&path).await {
                Ok(contents) => Ok(contents),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StoreError::NotFound {
                    name: name.to_string(),
                }),
                Err(source) => Err(StoreError::Io { path, source }),
            }
        })
    }

    fn write<'a>(
        &'a self,
        name: &'a str,
        contents: Vec<u8>,
    ) -> BoxFuture<'a, Result<(), StoreError>> {
        Box::pin(async move {
            let path = self.root.join(name);
            let tmp = self.root.join(format!(".{}.partial", name));

            tokio::fs::write(&tmp, &contents)
                .await
                .map_err(self.io_error(tmp.clone()))?;
            tokio::fs::rename(&tmp, &path)
                .await
                .map_err(self.io_error(path.clone()))?;

            debug!(name, bytes = contents.len(), "wrote blob to local store");
            Ok(())
        })
    }
}
