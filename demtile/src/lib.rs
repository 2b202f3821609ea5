//! demtile - local cache manager for SRTM elevation tiles
//!
//! This library maintains a local mirror of the tiles an application
//! needs from the global SRTM digital elevation model: a directory of
//! compressed tile blobs, a persistent availability index over the whole
//! 180x360 one-degree grid, and a concurrent retriever that fills the
//! cache from the USGS archive.
//!
//! The [`manager::ArchiveManager`] façade is the main entry point:
//!
//! ```ignore
//! use demtile::manager::ArchiveManager;
//! use demtile::tile::Resolution;
//!
//! let manager = ArchiveManager::open("/var/cache/demtile", Resolution::One)?;
//! manager.sync().await?;
//! let report = manager.download(&[(34.2, -118.5), (36.9, -117.1)], None, None).await?;
//! println!("{}", report);
//! ```

use std::future::Future;
use std::pin::Pin;

pub mod archive;
pub mod auth;
pub mod coord;
pub mod index;
pub mod manager;
pub mod mosaic;
pub mod pool;
pub mod retriever;
pub mod store;
pub mod tile;

/// Library version from Cargo.toml.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Boxed future used by dyn-compatible async traits.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
