//! Core download worker implementation
//!
//! A worker loops over the shared queue: it checks the stop flag, pops a task
//! with a bounded wait, processes it and records the outcome. An empty queue
//! after the idle timeout ends the loop, so workers exit on their own once
//! every task has been claimed.

use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::config::WorkerConfig;
use super::pool::StopHandle;
use super::types::{PoolTally, TaskOutcome, WorkerProgress, WorkerResult, WorkerStatus};
use crate::app::models::DownloadTask;
use crate::app::queue::DownloadQueue;
use crate::app::store::ObjectStore;
use crate::constants::files::TEMP_FILE_SUFFIX;
use crate::errors::DownloadError;

/// Individual download worker
#[derive(Debug)]
pub struct DownloadWorker {
    /// Unique worker identifier
    id: u32,
    /// Worker configuration
    config: WorkerConfig,
    /// Shared task queue
    queue: Arc<DownloadQueue>,
    /// Shared store client
    store: Arc<dyn ObjectStore>,
    /// Outcome counters shared with the pool
    tally: Arc<PoolTally>,
    /// Cooperative stop flag
    stop: StopHandle,
    /// Progress reporting channel
    progress_tx: Option<mpsc::Sender<WorkerProgress>>,
}

impl DownloadWorker {
    /// Start the worker loop
    pub async fn run(self) -> WorkerResult<()> {
        info!("Worker {} starting", self.id);
        self.report_progress(WorkerProgress::new(self.id, WorkerStatus::Idle));

        let mut processed = 0usize;
        loop {
            if self.stop.is_stopped() {
                info!("Worker {} received stop signal", self.id);
                break;
            }

            let Some(task) = self.queue.pop_timeout(self.config.idle_timeout).await else {
                debug!("Worker {} found no work after {:?}", self.id, self.config.idle_timeout);
                break;
            };

            let outcome = self.process_task(&task).await;
            self.tally.record(&task, &outcome);
            self.report_outcome(&task, &outcome);
            processed += 1;
        }

        self.report_progress(WorkerProgress::new(self.id, WorkerStatus::Shutdown));
        info!("Worker {} shutting down after {} tasks", self.id, processed);
        Ok(())
    }

    /// Process one task: skip if present, otherwise transfer it
    pub(crate) async fn process_task(&self, task: &DownloadTask) -> TaskOutcome {
        match tokio::fs::try_exists(&task.local_path).await {
            Ok(true) => {
                debug!(
                    "Worker {} skipping {}: already downloaded",
                    self.id,
                    task.local_path.display()
                );
                return TaskOutcome::Skipped;
            }
            Ok(false) => {}
            Err(e) => {
                warn!(
                    "Worker {} could not check {}: {}",
                    self.id,
                    task.local_path.display(),
                    e
                );
                return TaskOutcome::Failed(e.into());
            }
        }

        self.report_progress(WorkerProgress::for_task(
            self.id,
            WorkerStatus::Downloading,
            task,
        ));

        match self.transfer(task).await {
            Ok(bytes) => {
                debug!(
                    "Worker {} downloaded {} ({} bytes)",
                    self.id, task.location.key, bytes
                );
                TaskOutcome::Downloaded(bytes)
            }
            Err(e) => {
                warn!(
                    "Worker {} failed to download {}: {}",
                    self.id, task.location.key, e
                );
                TaskOutcome::Failed(e)
            }
        }
    }

    /// Stream the object into a temporary file and rename it into place
    async fn transfer(&self, task: &DownloadTask) -> WorkerResult<u64> {
        if let Some(parent) = task.local_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let temp_path = temp_path_for(&task.local_path);
        let fetch = self.store.fetch_to_path(&task.location, &temp_path);

        let fetched = match tokio::time::timeout(self.config.transfer_timeout, fetch).await {
            Ok(result) => result,
            Err(_) => Err(DownloadError::Timeout {
                seconds: self.config.transfer_timeout.as_secs(),
            }),
        };

        let bytes = match fetched {
            Ok(bytes) => bytes,
            Err(e) => {
                remove_partial(&temp_path).await;
                return Err(e);
            }
        };

        if let Err(e) = tokio::fs::rename(&temp_path, &task.local_path).await {
            debug!("Worker {} rename failed: {}", self.id, e);
            remove_partial(&temp_path).await;
            return Err(DownloadError::AtomicRenameFailed {
                temp_path,
                final_path: task.local_path.clone(),
            });
        }

        Ok(bytes)
    }

    fn report_outcome(&self, task: &DownloadTask, outcome: &TaskOutcome) {
        let progress = match outcome {
            TaskOutcome::Downloaded(bytes) => WorkerProgress {
                bytes: *bytes,
                ..WorkerProgress::for_task(self.id, WorkerStatus::Completed, task)
            },
            TaskOutcome::Skipped => WorkerProgress::for_task(self.id, WorkerStatus::Skipped, task),
            TaskOutcome::Failed(error) => WorkerProgress {
                error_message: Some(error.to_string()),
                ..WorkerProgress::for_task(self.id, WorkerStatus::Failed, task)
            },
        };
        self.report_progress(progress);
    }

    /// Best-effort progress report; a full or closed channel never blocks work
    fn report_progress(&self, progress: WorkerProgress) {
        let Some(progress_tx) = &self.progress_tx else {
            return;
        };

        if let Err(e) = progress_tx.try_send(progress) {
            match e {
                mpsc::error::TrySendError::Full(_) => {
                    debug!("Worker {} progress channel full, skipping update", self.id);
                }
                mpsc::error::TrySendError::Closed(_) => {
                    debug!("Worker {} progress channel closed", self.id);
                }
            }
        }
    }

    /// Get worker ID
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Get worker configuration
    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }
}

/// Temporary path next to the destination: `<file name>.tmp`
pub(crate) fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(TEMP_FILE_SUFFIX);
    PathBuf::from(name)
}

async fn remove_partial(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!("Removed partial file {}", path.display()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove partial file {}: {}", path.display(), e),
    }
}

/// Builder for creating DownloadWorker instances with validation
#[derive(Debug, Default)]
pub struct DownloadWorkerBuilder {
    id: Option<u32>,
    config: Option<WorkerConfig>,
    queue: Option<Arc<DownloadQueue>>,
    store: Option<Arc<dyn ObjectStore>>,
    tally: Option<Arc<PoolTally>>,
    stop: Option<StopHandle>,
    progress_tx: Option<mpsc::Sender<WorkerProgress>>,
}

impl DownloadWorkerBuilder {
    /// Create a new worker builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set worker ID
    pub fn id(mut self, id: u32) -> Self {
        self.id = Some(id);
        self
    }

    /// Set worker configuration
    pub fn config(mut self, config: WorkerConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set task queue
    pub fn queue(mut self, queue: Arc<DownloadQueue>) -> Self {
        self.queue = Some(queue);
        self
    }

    /// Set object store
    pub fn store(mut self, store: Arc<dyn ObjectStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub(crate) fn tally(mut self, tally: Arc<PoolTally>) -> Self {
        self.tally = Some(tally);
        self
    }

    /// Set stop handle
    pub fn stop_handle(mut self, stop: StopHandle) -> Self {
        self.stop = Some(stop);
        self
    }

    /// Set progress channel (optional)
    pub fn progress_channel(mut self, progress_tx: mpsc::Sender<WorkerProgress>) -> Self {
        self.progress_tx = Some(progress_tx);
        self
    }

    /// Build the worker (validates all required fields are set)
    pub fn build(self) -> WorkerResult<DownloadWorker> {
        let id = self.id.ok_or_else(|| {
            DownloadError::ConfigurationError("Worker ID is required".to_string())
        })?;

        let config = self.config.ok_or_else(|| {
            DownloadError::ConfigurationError("Worker configuration is required".to_string())
        })?;

        let queue = self.queue.ok_or_else(|| {
            DownloadError::ConfigurationError("Task queue is required".to_string())
        })?;

        let store = self.store.ok_or_else(|| {
            DownloadError::ConfigurationError("Object store is required".to_string())
        })?;

        let stop = self.stop.ok_or_else(|| {
            DownloadError::ConfigurationError("Stop handle is required".to_string())
        })?;

        config.validate()?;

        Ok(DownloadWorker {
            id,
            config,
            queue,
            store,
            tally: self.tally.unwrap_or_default(),
            stop,
            progress_tx: self.progress_tx,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use tempfile::TempDir;

    use crate::app::models::CatalogRecord;
    use crate::app::store::MemoryStore;
    use crate::app::worker::config::ConfigPresets;

    fn task(root: &Path, key: &str) -> DownloadTask {
        let record = CatalogRecord::new(key, format!("s3://usgs-lidar/{}", key));
        DownloadTask::new(record, "P", root).unwrap()
    }

    fn worker(store: MemoryStore, config: WorkerConfig) -> (DownloadWorker, Arc<DownloadQueue>) {
        let queue = Arc::new(DownloadQueue::new());
        let worker = DownloadWorkerBuilder::new()
            .id(0)
            .config(config)
            .queue(queue.clone())
            .store(Arc::new(store))
            .stop_handle(StopHandle::new(queue.clone()))
            .build()
            .unwrap();
        (worker, queue)
    }

    #[tokio::test]
    async fn test_process_task_downloads_into_place() {
        let dir = TempDir::new().unwrap();
        let store = MemoryStore::new().with_object("Projects/P/a.laz", b"points".to_vec());
        let (worker, _) = worker(store, ConfigPresets::testing());
        let task = task(dir.path(), "Projects/P/a.laz");

        let outcome = worker.process_task(&task).await;

        assert!(matches!(outcome, TaskOutcome::Downloaded(6)));
        assert_eq!(std::fs::read(&task.local_path).unwrap(), b"points");
        assert!(!temp_path_for(&task.local_path).exists());
    }

    /// Existing destination files are never fetched again
    #[tokio::test]
    async fn test_process_task_skips_existing() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(MemoryStore::new().with_object("Projects/P/a.laz", b"new".to_vec()));
        let queue = Arc::new(DownloadQueue::new());
        let worker = DownloadWorkerBuilder::new()
            .id(0)
            .config(ConfigPresets::testing())
            .queue(queue.clone())
            .store(store.clone())
            .stop_handle(StopHandle::new(queue))
            .build()
            .unwrap();

        let task = task(dir.path(), "Projects/P/a.laz");
        std::fs::create_dir_all(task.local_path.parent().unwrap()).unwrap();
        std::fs::write(&task.local_path, b"old").unwrap();

        let outcome = worker.process_task(&task).await;

        assert!(matches!(outcome, TaskOutcome::Skipped));
        assert_eq!(store.fetch_count(), 0);
        assert_eq!(std::fs::read(&task.local_path).unwrap(), b"old");
    }

    /// A failed transfer leaves neither the destination nor a temp file
    #[tokio::test]
    async fn test_failed_transfer_leaves_no_partial_file() {
        let dir = TempDir::new().unwrap();
        let store = MemoryStore::new().with_failure("Projects/P/bad.laz");
        let (worker, _) = worker(store, ConfigPresets::testing());
        let task = task(dir.path(), "Projects/P/bad.laz");

        let outcome = worker.process_task(&task).await;

        assert!(matches!(
            outcome,
            TaskOutcome::Failed(DownloadError::Store { .. })
        ));
        assert!(!task.local_path.exists());
        assert!(!temp_path_for(&task.local_path).exists());
    }

    #[tokio::test]
    async fn test_missing_object_fails() {
        let dir = TempDir::new().unwrap();
        let (worker, _) = worker(MemoryStore::new(), ConfigPresets::testing());
        let task = task(dir.path(), "Projects/P/gone.laz");

        let outcome = worker.process_task(&task).await;
        assert!(matches!(
            outcome,
            TaskOutcome::Failed(DownloadError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_transfer_timeout() {
        let dir = TempDir::new().unwrap();
        let store = MemoryStore::new()
            .with_object("Projects/P/slow.laz", b"x".to_vec())
            .with_delay(Duration::from_secs(5));
        let config = WorkerConfig {
            transfer_timeout: Duration::from_millis(50),
            ..ConfigPresets::testing()
        };
        let (worker, _) = worker(store, config);
        let task = task(dir.path(), "Projects/P/slow.laz");

        let outcome = worker.process_task(&task).await;
        assert!(matches!(
            outcome,
            TaskOutcome::Failed(DownloadError::Timeout { .. })
        ));
        assert!(!task.local_path.exists());
    }

    /// The run loop drains the queue, then exits after the idle timeout
    #[tokio::test]
    async fn test_run_drains_queue_and_exits() {
        let dir = TempDir::new().unwrap();
        let store = MemoryStore::new()
            .with_object("Projects/P/a.laz", b"a".to_vec())
            .with_object("Projects/P/b.laz", b"bb".to_vec());
        let (tx, mut rx) = mpsc::channel(32);
        let queue = Arc::new(DownloadQueue::new());
        let tally = Arc::new(PoolTally::default());
        let worker = DownloadWorkerBuilder::new()
            .id(3)
            .config(ConfigPresets::testing())
            .queue(queue.clone())
            .store(Arc::new(store))
            .tally(tally.clone())
            .stop_handle(StopHandle::new(queue.clone()))
            .progress_channel(tx)
            .build()
            .unwrap();

        queue.push(task(dir.path(), "Projects/P/a.laz")).unwrap();
        queue.push(task(dir.path(), "Projects/P/b.laz")).unwrap();

        tokio::time::timeout(Duration::from_secs(5), worker.run())
            .await
            .unwrap()
            .unwrap();

        let report = tally.snapshot();
        assert_eq!(report.downloaded, 2);
        assert_eq!(report.bytes_downloaded, 3);

        let mut statuses = Vec::new();
        while let Ok(progress) = rx.try_recv() {
            statuses.push(progress.status_description());
        }
        assert!(statuses.contains(&"Downloading a.laz...".to_string()));
        assert_eq!(statuses.last().map(String::as_str), Some("Shutting down"));
    }

    #[test]
    fn test_builder_requires_fields() {
        let result = DownloadWorkerBuilder::new().id(1).build();
        assert!(matches!(
            result,
            Err(DownloadError::ConfigurationError(_))
        ));
    }

    #[test]
    fn test_temp_path_appends_suffix() {
        let path = Path::new("out/P/tile.copc.laz");
        assert_eq!(temp_path_for(path), PathBuf::from("out/P/tile.copc.laz.tmp"));
    }
}
