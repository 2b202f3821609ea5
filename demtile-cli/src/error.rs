//! CLI error type.

use thiserror::Error;

/// Errors surfaced to the terminal with a non-zero exit code.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("{0}")]
    Args(String),

    #[error(transparent)]
    Manager(#[from] demtile::manager::ManagerError),
}
