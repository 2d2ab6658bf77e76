//! Acquisition orchestration
//!
//! The orchestrator sequences one run: search the catalog, group the unique
//! records by project, optionally sample each project, turn records into
//! download tasks, then drain them through a [`WorkerPool`]. It reports final
//! counts even when some tasks failed.
//!
//! - [`config`] - Run settings (output root, worker pool, sampling, signals)
//! - [`plan`] - Grouped records converted into per-project task lists
//! - [`report`] - Final counts returned to the caller
//! - [`signals`] - Ctrl-C / SIGTERM mapped onto the pool's cooperative stop
//!
//! # Examples
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use lidar_fetcher::app::catalog::{CatalogConfig, PaginatedSearchClient, SearchQuery};
//! use lidar_fetcher::app::orchestrator::{AcquisitionOrchestrator, OrchestratorConfig};
//! use lidar_fetcher::app::store::{S3Store, StoreConfig, StoreCredentials};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let search = PaginatedSearchClient::new(CatalogConfig::default())?;
//! let orchestrator = AcquisitionOrchestrator::new(
//!     OrchestratorConfig::default().with_output_dir("LIDAR"),
//!     search,
//! )?;
//!
//! let credentials = StoreCredentials::from_env()?;
//! let store = Arc::new(S3Store::new(&credentials, &StoreConfig::default()));
//!
//! let query = SearchQuery::parse(
//!     "-105.1 39.9,-105.0 39.9,-105.0 40.0,-105.1 40.0",
//!     "2016-01-01",
//!     "2016-12-31",
//! )?;
//! let report = orchestrator.run(&query, store, None).await?;
//! println!("{}", report.summary_line());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod plan;
pub mod report;
pub mod signals;

use std::sync::Arc;
use std::time::Instant;

use rand::Rng;
use tokio::sync::mpsc;
use tracing::{error, info};

use crate::app::catalog::{PaginatedSearchClient, SearchOutcome, SearchQuery};
use crate::app::models::CatalogRecord;
use crate::app::projects::{sample_per_project, ProjectGrouper};
use crate::app::store::ObjectStore;
use crate::app::worker::{WorkerPool, WorkerProgress};
use crate::errors::{DownloadResult, Result, SearchResult};

pub use config::OrchestratorConfig;
pub use plan::{AcquisitionPlan, PlanSummary, ProjectPlan};
pub use report::AcquisitionReport;
pub use signals::{stop_on_signal, wait_for_signal};

/// Composes search, grouping and the download pool into one run
#[derive(Debug)]
pub struct AcquisitionOrchestrator {
    config: OrchestratorConfig,
    search: PaginatedSearchClient,
    grouper: ProjectGrouper,
}

impl AcquisitionOrchestrator {
    /// Create an orchestrator; the store is supplied per run
    pub fn new(config: OrchestratorConfig, search: PaginatedSearchClient) -> DownloadResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            search,
            grouper: ProjectGrouper::new(),
        })
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Run the catalog search alone
    pub async fn search(&self, query: &SearchQuery) -> SearchResult<SearchOutcome> {
        self.search.search(query).await
    }

    /// Group, sample and convert records into tasks
    pub fn plan(&self, records: &[CatalogRecord]) -> AcquisitionPlan {
        self.plan_with_rng(records, &mut rand::thread_rng())
    }

    /// [`Self::plan`] with a caller-supplied random source for sampling
    pub fn plan_with_rng<R: Rng + ?Sized>(
        &self,
        records: &[CatalogRecord],
        rng: &mut R,
    ) -> AcquisitionPlan {
        let mut groups = self.grouper.group(records);
        if let Some(max) = self.config.max_files_per_project {
            groups = sample_per_project(groups, max, rng);
        }

        let plan = AcquisitionPlan::build(groups, &self.config.output_dir);
        info!(
            "Planned {} tasks across {} projects",
            plan.task_count(),
            plan.projects.len()
        );
        plan
    }

    /// Search, plan and download
    ///
    /// # Errors
    ///
    /// A search failure aborts the run before anything is enqueued. Failed
    /// transfers do not; they are counted in the report.
    pub async fn run(
        &self,
        query: &SearchQuery,
        store: Arc<dyn ObjectStore>,
        progress: Option<mpsc::Sender<WorkerProgress>>,
    ) -> Result<AcquisitionReport> {
        let outcome = self.search(query).await.inspect_err(|e| {
            error!("Catalog search failed: {}", e);
        })?;

        info!(
            "Search returned {} unique records ({} duplicates removed)",
            outcome.len(),
            outcome.duplicates
        );

        let report = self.run_from_records(outcome.items, store, progress).await?;
        Ok(report)
    }

    /// Plan and download records obtained elsewhere, such as a saved search
    pub async fn run_from_records(
        &self,
        records: Vec<CatalogRecord>,
        store: Arc<dyn ObjectStore>,
        progress: Option<mpsc::Sender<WorkerProgress>>,
    ) -> DownloadResult<AcquisitionReport> {
        let plan = self.plan(&records);
        self.execute(&plan, records.len(), store, progress).await
    }

    /// Enqueue every planned task and drain the queue
    pub async fn execute(
        &self,
        plan: &AcquisitionPlan,
        records_found: usize,
        store: Arc<dyn ObjectStore>,
        progress: Option<mpsc::Sender<WorkerProgress>>,
    ) -> DownloadResult<AcquisitionReport> {
        let started = Instant::now();

        if plan.is_empty() {
            info!("Nothing to download");
            return Ok(AcquisitionReport::empty(
                records_found,
                plan,
                started.elapsed(),
            ));
        }

        let mut pool = WorkerPool::new(self.config.worker_config.clone(), store)?;
        if let Some(progress_tx) = progress {
            pool = pool.with_progress(progress_tx);
        }

        for project in &plan.projects {
            for task in &project.tasks {
                pool.enqueue(task.clone())?;
            }
        }

        pool.start(self.config.worker_config.worker_count)?;

        let signal_task = self
            .config
            .handle_signals
            .then(|| stop_on_signal(pool.stop_handle()));

        let download = pool.wait().await;

        if let Some(task) = signal_task {
            task.abort();
        }

        let report = AcquisitionReport::new(records_found, plan, download, started.elapsed());
        info!("Acquisition finished: {}", report.summary_line());
        Ok(report)
    }
}
