//! Download worker pool
//!
//! A fixed number of workers drain one shared [`DownloadQueue`]. Each worker
//! pops a task, skips it when the destination already exists, otherwise
//! streams the object into a temporary file and renames it into place. A
//! failed task is logged and counted; it never stops the pool or the other
//! workers.
//!
//! # Module Organization
//!
//! - [`config`] - Worker configuration with validation and presets
//! - [`types`] - Progress events, task outcomes and the final report
//! - [`core`] - Individual worker implementation with download logic
//! - [`pool`] - Worker pool lifecycle and cooperative stop
//!
//! # Basic Usage
//!
//! ```rust,no_run
//! use std::path::Path;
//! use std::sync::Arc;
//! use lidar_fetcher::app::models::{CatalogRecord, DownloadTask};
//! use lidar_fetcher::app::store::{S3Store, StoreConfig, StoreCredentials};
//! use lidar_fetcher::app::worker::{ConfigPresets, WorkerPool};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let credentials = StoreCredentials::from_env()?;
//! let store = Arc::new(S3Store::new(&credentials, &StoreConfig::default()));
//!
//! let (progress_tx, mut progress_rx) = tokio::sync::mpsc::channel(100);
//! let mut pool = WorkerPool::new(ConfigPresets::production(), store)?.with_progress(progress_tx);
//!
//! let record = CatalogRecord::new("abc", "s3://usgs-lidar/Projects/X/tile.laz");
//! pool.enqueue(DownloadTask::new(record, "X", Path::new("LIDAR"))?)?;
//! pool.start(3)?;
//!
//! tokio::spawn(async move {
//!     while let Some(progress) = progress_rx.recv().await {
//!         println!("{}", progress.status_description());
//!     }
//! });
//!
//! let report = pool.wait().await;
//! println!("{} downloaded, {} failed", report.downloaded, report.failed);
//! # Ok(())
//! # }
//! ```
//!
//! [`DownloadQueue`]: crate::app::queue::DownloadQueue

pub mod config;
pub mod core;
pub mod pool;
pub mod types;

pub use config::{ConfigPresets, WorkerConfig, WorkerConfigBuilder};
pub use core::{DownloadWorker, DownloadWorkerBuilder};
pub use pool::{PoolState, StopHandle, WorkerPool};
pub use types::{
    DownloadReport, FailedTask, TaskOutcome, WorkerProgress, WorkerResult, WorkerStatus,
};
