//! `demtile authenticate` - persist Earthdata credentials.

use demtile::manager::ArchiveManager;

use crate::error::CliError;

pub fn run(manager: &ArchiveManager, username: &str, password: &str) -> Result<(), CliError> {
    manager.authenticate(username, password)?;
    println!("Stored credentials for {}", username);
    Ok(())
}
