//! Credential persistence and resolution for the remote archive.
//!
//! Credentials live in a small JSON file (username to password map)
//! alongside the cache root. Resolution prefers explicitly supplied
//! credentials and otherwise falls back to the store, failing loudly
//! when the store is empty, corrupt, or ambiguous. The resolved
//! credential is installed into the archive client at construction time;
//! there is one active credential context per download batch, not one
//! per task.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

/// Filename of the persisted credential store, relative to the cache root.
pub const CREDENTIALS_FILENAME: &str = "credentials.json";

/// A (username, password) pair for the remote archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub username: String,
    pub password: String,
}

/// Authentication failures.
///
/// Every variant aborts the operation that needed the credential; none
/// are silently swallowed.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("no stored credentials; please provide your Earthdata credentials")]
    Empty,

    /// The store file exists but cannot be parsed. Never auto-repaired
    /// during resolution; distinct from an empty store.
    #[error("corrupt credential store at {path}; please provide your Earthdata credentials")]
    Corrupt { path: PathBuf },

    #[error("no stored password for username {username:?}")]
    UnknownUsername { username: String },

    #[error("the credential store contains multiple usernames; please specify one")]
    Ambiguous,

    #[error("credential store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// The remote archive rejected the credential.
    #[error("archive rejected credentials: {0}")]
    Rejected(String),
}

/// File-backed username-to-password store.
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    /// Opens the store backed by `path`. The file need not exist yet.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// The path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the stored entries.
    ///
    /// A missing or empty file reads as an empty map; an unparsable file
    /// is [`AuthError::Corrupt`].
    pub fn load(&self) -> Result<BTreeMap<String, String>, AuthError> {
        let contents = match std::fs::read(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(e.into()),
        };
        if contents.is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_slice(&contents).map_err(|_| AuthError::Corrupt {
            path: self.path.clone(),
        })
    }

    /// Persists a credential, replacing any previous password for the
    /// same username.
    ///
    /// An unreadable existing store is treated as empty here: storing a
    /// fresh credential is how a corrupt store gets repaired, on explicit
    /// user action rather than automatically.
    pub fn store(&self, username: &str, password: &str) -> Result<(), AuthError> {
        let mut entries = match self.load() {
            Ok(entries) => entries,
            Err(AuthError::Corrupt { .. }) => BTreeMap::new(),
            Err(e) => return Err(e),
        };
        entries.insert(username.to_string(), password.to_string());

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents =
            serde_json::to_vec_pretty(&entries).expect("string map serialization cannot fail");
        std::fs::write(&self.path, contents)?;
        debug!(username, path = %self.path.display(), "stored credential");
        Ok(())
    }

    /// Resolves the credential to use for a download batch.
    ///
    /// - explicit username and password: used as-is, store untouched;
    /// - explicit username only: the stored password for it, or
    ///   [`AuthError::UnknownUsername`];
    /// - nothing explicit: the store's single entry, or
    ///   [`AuthError::Empty`] / [`AuthError::Ambiguous`].
    pub fn resolve(
        &self,
        username: Option<&str>,
        password: Option<&str>,
    ) -> Result<Credential, AuthError> {
        if let (Some(username), Some(password)) = (username, password) {
            return Ok(Credential {
                username: username.to_string(),
                password: password.to_string(),
            });
        }

        let entries = self.load()?;
        if entries.is_empty() {
            return Err(AuthError::Empty);
        }

        if let Some(username) = username {
            let password = entries.get(username).ok_or_else(|| AuthError::UnknownUsername {
                username: username.to_string(),
            })?;
            return Ok(Credential {
                username: username.to_string(),
                password: password.clone(),
            });
        }

        if entries.len() > 1 {
            return Err(AuthError::Ambiguous);
        }

        // exactly one entry; it must be the right one
        match entries.into_iter().next() {
            Some((username, password)) => Ok(Credential { username, password }),
            None => Err(AuthError::Empty),
        }
    }
}
