//! CLI command implementations.

pub mod authenticate;
pub mod download;
pub mod plan;
pub mod sync;

use crate::error::CliError;

/// Parse a `lat,lon` pair given in decimal degrees.
pub fn parse_point(s: &str) -> Result<(f64, f64), String> {
    let (lat, lon) = s
        .split_once(',')
        .ok_or_else(|| format!("expected lat,lon but got {:?}", s))?;
    let lat: f64 = lat
        .trim()
        .parse()
        .map_err(|_| format!("invalid latitude {:?}", lat.trim()))?;
    let lon: f64 = lon
        .trim()
        .parse()
        .map_err(|_| format!("invalid longitude {:?}", lon.trim()))?;
    Ok((lat, lon))
}

/// Require at least one region point.
pub fn require_region(points: &[(f64, f64)]) -> Result<(), CliError> {
    if points.is_empty() {
        return Err(CliError::Args(
            "specify the region with at least one --point lat,lon".to_string(),
        ));
    }
    Ok(())
}
