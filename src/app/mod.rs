//! Core application logic for LIDAR Fetcher
//!
//! This module contains the catalog search client, project grouping, the
//! object store seam, the download queue and worker pool, and the
//! orchestrator that runs them as one pipeline.
//!
//! # Examples
//!
//! ```rust,no_run
//! use lidar_fetcher::app::{CatalogConfig, PaginatedSearchClient, ProjectGrouper, SearchQuery};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = PaginatedSearchClient::new(CatalogConfig::default())?;
//! let query = SearchQuery::parse(
//!     "-105.1 39.9,-105.0 39.9,-105.0 40.0,-105.1 40.0",
//!     "2016-01-01",
//!     "2016-12-31",
//! )?;
//!
//! let outcome = client.search(&query).await?;
//! for (project, records) in ProjectGrouper::new().group(&outcome.items) {
//!     println!("{}: {} files", project, records.len());
//! }
//! # Ok(())
//! # }
//! ```

pub mod catalog;
pub mod models;
pub mod orchestrator;
pub mod projects;
pub mod queue;
pub mod store;
pub mod worker;

// Re-export main public API
pub use catalog::{CatalogConfig, PaginatedSearchClient, Polygon, SearchOutcome, SearchQuery};
pub use models::{format_file_size, CatalogRecord, DownloadTask, ObjectLocation};
pub use orchestrator::{
    AcquisitionOrchestrator, AcquisitionPlan, AcquisitionReport, OrchestratorConfig,
};
pub use projects::{project_name_for, sample_per_project, ProjectGrouper, ProjectGroups};
pub use queue::DownloadQueue;
pub use store::{MemoryStore, ObjectStore, S3Store, StoreConfig, StoreCredentials};
pub use worker::{
    DownloadReport, StopHandle, WorkerConfig, WorkerPool, WorkerProgress, WorkerStatus,
};
