//! `demtile sync` - reconcile the availability index with the store.

use demtile::manager::ArchiveManager;

use crate::error::CliError;

pub async fn run(manager: &ArchiveManager) -> Result<(), CliError> {
    let report = manager.sync().await?;
    print!("{}", report);
    Ok(())
}
