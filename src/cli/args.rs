//! Command-line argument parsing for LIDAR Fetcher
//!
//! This module defines the CLI structure using clap derive macros: catalog
//! search, LIDAR tile downloads and object store credential management.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// LIDAR Fetcher - Download USGS 3DEP point cloud tiles
#[derive(Parser, Debug)]
#[command(
    name = "lidar_fetcher",
    version,
    about = "Search the National Map catalog and download LIDAR point cloud tiles",
    long_about = "A concurrent downloader for USGS LIDAR point cloud tiles.
Searches the catalog for an area of interest and date range, groups the results by
acquisition project and pulls the tiles from the requester-pays bucket. Re-running a
download resumes: files already on disk are skipped."
)]
pub struct Cli {
    /// Global options
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Global arguments available to all subcommands
#[derive(Args, Debug)]
pub struct GlobalArgs {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Very verbose logging (debug level)
    #[arg(long, global = true)]
    pub very_verbose: bool,

    /// Quiet mode - suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Configuration file path
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Search the catalog without downloading
    Search(SearchArgs),

    /// Search (or load saved results) and download tiles
    Download(DownloadArgs),

    /// Manage object store credentials
    Auth(AuthArgs),
}

/// Area of interest and date range shared by search and download
#[derive(Args, Debug, Clone, Default)]
pub struct QueryArgs {
    /// Polygon as "lon lat,lon lat,..." (at least three vertices)
    #[arg(long, value_name = "POLYGON")]
    pub polygon: Option<String>,

    /// Start date (YYYY-MM-DD)
    #[arg(long, value_name = "DATE")]
    pub start: Option<String>,

    /// End date (YYYY-MM-DD)
    #[arg(long, value_name = "DATE")]
    pub end: Option<String>,
}

impl QueryArgs {
    /// All three parts, or None if any is missing
    pub fn parts(&self) -> Option<(&str, &str, &str)> {
        Some((
            self.polygon.as_deref()?,
            self.start.as_deref()?,
            self.end.as_deref()?,
        ))
    }

    fn any_set(&self) -> bool {
        self.polygon.is_some() || self.start.is_some() || self.end.is_some()
    }
}

/// Arguments for the search command
#[derive(Args, Debug, Clone)]
pub struct SearchArgs {
    #[command(flatten)]
    pub query: QueryArgs,

    /// Write the unique results as JSON to this file
    #[arg(long, value_name = "FILE")]
    pub save: Option<PathBuf>,
}

impl SearchArgs {
    pub fn validate(&self) -> Result<(), String> {
        if self.query.parts().is_none() {
            return Err("--polygon, --start and --end are all required".to_string());
        }
        Ok(())
    }
}

/// Arguments for the download command
#[derive(Args, Debug, Clone)]
pub struct DownloadArgs {
    #[command(flatten)]
    pub query: QueryArgs,

    /// Download records from a saved search instead of querying the catalog
    #[arg(long, value_name = "FILE", conflicts_with_all = ["polygon", "start", "end"])]
    pub from: Option<PathBuf>,

    /// Output directory (overrides the configured one)
    #[arg(short, long, value_name = "DIR")]
    pub output: Option<PathBuf>,

    /// Number of concurrent workers
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Download at most this many randomly chosen files per project
    #[arg(long, value_name = "N")]
    pub max_files_per_project: Option<usize>,

    /// Show what would be downloaded without downloading
    #[arg(long)]
    pub dry_run: bool,
}

impl DownloadArgs {
    /// Check that exactly one record source was given and numbers are sane
    pub fn validate(&self) -> Result<(), String> {
        match (&self.from, self.query.parts()) {
            (Some(_), _) if self.query.any_set() => {
                return Err("--from cannot be combined with --polygon/--start/--end".to_string())
            }
            (None, None) => {
                return Err(
                    "Either --from FILE or all of --polygon, --start and --end are required"
                        .to_string(),
                )
            }
            _ => {}
        }

        if self.workers == Some(0) {
            return Err("Number of workers must be greater than 0".to_string());
        }

        if self.max_files_per_project == Some(0) {
            return Err("--max-files-per-project must be greater than 0".to_string());
        }

        Ok(())
    }
}

/// Arguments for authentication management
#[derive(Args, Debug)]
pub struct AuthArgs {
    #[command(subcommand)]
    pub action: AuthAction,
}

/// Authentication actions
#[derive(Subcommand, Debug)]
pub enum AuthAction {
    /// Set up object store credentials
    Setup,

    /// Verify current credentials against the bucket
    Verify,

    /// Show authentication status
    Status {
        /// Also check the credentials against the bucket
        #[arg(long)]
        verify: bool,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Get the logging level based on global arguments
    pub fn log_level(&self) -> tracing::Level {
        if self.global.quiet {
            tracing::Level::ERROR
        } else if self.global.very_verbose {
            tracing::Level::DEBUG
        } else if self.global.verbose {
            tracing::Level::INFO
        } else {
            tracing::Level::WARN
        }
    }
}
