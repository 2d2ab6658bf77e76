//! LIDAR Fetcher Library
//!
//! A Rust library for acquiring USGS 3DEP LIDAR point cloud tiles: paginated
//! catalog search, grouping by acquisition project, and resumable concurrent
//! downloads from the requester-pays bucket.

pub mod app;
pub mod auth;
pub mod cli;
pub mod config;
pub mod constants;
pub mod errors;

// Re-export commonly used types for convenience
pub use errors::{AppError, Result};
