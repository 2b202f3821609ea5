//! demtile CLI - manage a local cache of SRTM elevation tiles.

mod commands;
mod error;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use demtile::manager::{ArchiveManager, DEFAULT_POOL_SIZE};
use demtile::tile::Resolution;

use commands::parse_point;
use error::CliError;

#[derive(Parser)]
#[command(name = "demtile", version)]
#[command(about = "Manage a local cache of SRTM elevation tiles", long_about = None)]
struct Cli {
    /// Cache directory (default: the platform cache dir + /demtile)
    #[arg(long, global = true)]
    cache_dir: Option<PathBuf>,

    /// Tile resolution in arc-seconds per pixel (1 or 3)
    #[arg(long, global = true, default_value = "1")]
    resolution: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconcile the availability index with the tiles actually on disk
    Sync,

    /// Show what covering a region would take, without going online
    Plan {
        /// A region point as lat,lon in decimal degrees (repeatable)
        #[arg(long = "point", value_parser = parse_point)]
        points: Vec<(f64, f64)>,
    },

    /// Download every tile needed to cover a region
    Download {
        /// A region point as lat,lon in decimal degrees (repeatable)
        #[arg(long = "point", value_parser = parse_point)]
        points: Vec<(f64, f64)>,

        /// Earthdata username (falls back to stored credentials)
        #[arg(long)]
        username: Option<String>,

        /// Earthdata password (falls back to stored credentials)
        #[arg(long)]
        password: Option<String>,

        /// Number of concurrent downloads
        #[arg(long, default_value_t = DEFAULT_POOL_SIZE)]
        workers: usize,
    },

    /// Store Earthdata credentials for later downloads
    Authenticate {
        #[arg(long)]
        username: String,

        #[arg(long)]
        password: String,
    },
}

fn cache_dir(cli: &Cli) -> Result<PathBuf, CliError> {
    if let Some(dir) = &cli.cache_dir {
        return Ok(dir.clone());
    }
    dirs::cache_dir()
        .map(|dir| dir.join("demtile"))
        .ok_or_else(|| {
            CliError::Args("no platform cache directory; use --cache-dir".to_string())
        })
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let resolution = Resolution::from_arcseconds(cli.resolution).ok_or_else(|| {
        CliError::Args(format!(
            "unsupported resolution {}; SRTM tiles come in 1 or 3 arc-seconds",
            cli.resolution
        ))
    })?;
    let root = cache_dir(&cli)?;
    debug!(cache = %root.display(), resolution = cli.resolution, "opening tile cache");
    let manager = ArchiveManager::open(root, resolution)?;

    match &cli.command {
        Commands::Sync => commands::sync::run(&manager).await,
        Commands::Plan { points } => commands::plan::run(&manager, points),
        Commands::Download {
            points,
            username,
            password,
            workers,
        } => {
            let manager = manager.with_pool_size(*workers);
            commands::download::run(&manager, points, username.as_deref(), password.as_deref())
                .await
        }
        Commands::Authenticate { username, password } => {
            commands::authenticate::run(&manager, username, password)
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}
