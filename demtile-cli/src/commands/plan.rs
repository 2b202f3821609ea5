//! `demtile plan` - show what covering a region would take.

use demtile::manager::ArchiveManager;

use crate::error::CliError;

use super::require_region;

pub fn run(manager: &ArchiveManager, points: &[(f64, f64)]) -> Result<(), CliError> {
    require_region(points)?;
    let report = manager.plan(points)?;
    print!("{}", report);
    Ok(())
}
