//! `demtile download` - retrieve every tile covering a region.

use demtile::manager::ArchiveManager;

use crate::error::CliError;

use super::require_region;

pub async fn run(
    manager: &ArchiveManager,
    points: &[(f64, f64)],
    username: Option<&str>,
    password: Option<&str>,
) -> Result<(), CliError> {
    require_region(points)?;
    let report = manager.download(points, username, password).await?;
    print!("{}", report);
    Ok(())
}
