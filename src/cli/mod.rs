//! Command-line interface components
//!
//! This module contains CLI-specific code for the LIDAR Fetcher application,
//! including argument parsing, progress display, and command handlers.

pub mod args;
pub mod commands;
pub mod progress;

pub use args::{AuthAction, AuthArgs, Cli, Commands, DownloadArgs, GlobalArgs, QueryArgs, SearchArgs};
pub use commands::{handle_auth, handle_download, handle_search, load_results, save_results};
pub use progress::{ProgressConfig, ProgressDisplay, ProgressTotals};
