//! Worker type definitions and data structures
//!
//! Progress events sent by workers, per-task outcomes, and the shared tally
//! the pool turns into its final [`DownloadReport`].

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::app::models::{format_file_size, DownloadTask};
use crate::errors::DownloadError;

/// Result type for worker operations
pub type WorkerResult<T> = Result<T, DownloadError>;

/// Current status of a download worker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub enum WorkerStatus {
    /// Worker is waiting for a task
    Idle,
    /// Worker started transferring a task
    Downloading,
    /// Destination already existed; transfer skipped
    Skipped,
    /// Transfer finished and the file is in place
    Completed,
    /// Transfer failed; the task is dropped
    Failed,
    /// Worker is exiting
    Shutdown,
}

impl WorkerStatus {
    /// Whether this status ends processing of a task
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            WorkerStatus::Skipped | WorkerStatus::Completed | WorkerStatus::Failed
        )
    }
}

/// Progress event from a download worker
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerProgress {
    /// ID of the worker reporting progress
    pub worker_id: u32,
    /// Current worker status
    pub status: WorkerStatus,
    /// File the event is about
    pub file_name: Option<String>,
    /// Project the file belongs to
    pub project: Option<String>,
    /// Bytes written for a completed transfer
    pub bytes: u64,
    /// Error message for a failed transfer
    pub error_message: Option<String>,
    /// Timestamp of this progress report
    pub timestamp: DateTime<Utc>,
}

impl WorkerProgress {
    /// Create a progress event not tied to a task
    pub fn new(worker_id: u32, status: WorkerStatus) -> Self {
        Self {
            worker_id,
            status,
            file_name: None,
            project: None,
            bytes: 0,
            error_message: None,
            timestamp: Utc::now(),
        }
    }

    /// Create a progress event for a task
    pub fn for_task(worker_id: u32, status: WorkerStatus, task: &DownloadTask) -> Self {
        Self {
            file_name: Some(task.file_name().to_string()),
            project: Some(task.project.clone()),
            ..Self::new(worker_id, status)
        }
    }

    /// Human-readable status line
    pub fn status_description(&self) -> String {
        let file = self.file_name.as_deref().unwrap_or("file");
        match &self.status {
            WorkerStatus::Idle => "Waiting for work".to_string(),
            WorkerStatus::Downloading => format!("Downloading {}...", file),
            WorkerStatus::Skipped => format!("Skipping {} (already downloaded)", file),
            WorkerStatus::Completed => {
                format!("Downloaded {} ({})", file, format_file_size(self.bytes))
            }
            WorkerStatus::Failed => match &self.error_message {
                Some(error) => format!("Failed {}: {}", file, error),
                None => format!("Failed {}", file),
            },
            WorkerStatus::Shutdown => "Shutting down".to_string(),
        }
    }
}

/// Result of processing one task
#[derive(Debug)]
pub enum TaskOutcome {
    /// Object transferred; number of bytes written
    Downloaded(u64),
    /// Destination already existed
    Skipped,
    /// Transfer failed
    Failed(DownloadError),
}

/// A task that failed, kept for the final report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedTask {
    /// Object key in the store
    pub key: String,
    /// Destination that was not written
    pub local_path: PathBuf,
    /// Error description
    pub error: String,
}

/// Final counts of a download run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DownloadReport {
    /// Objects transferred
    pub downloaded: u64,
    /// Tasks whose destination already existed
    pub skipped: u64,
    /// Tasks whose transfer failed
    pub failed: u64,
    /// Tasks still queued when the pool was stopped
    pub cancelled: u64,
    /// Bytes written by successful transfers
    pub bytes_downloaded: u64,
    /// Details of each failure
    pub failures: Vec<FailedTask>,
}

impl DownloadReport {
    /// Tasks that reached a terminal outcome
    pub fn processed(&self) -> u64 {
        self.downloaded + self.skipped + self.failed
    }

    /// Whether every task succeeded or was skipped
    pub fn is_complete_success(&self) -> bool {
        self.failed == 0 && self.cancelled == 0
    }
}

/// Counters shared by all workers of a pool
#[derive(Debug, Default)]
pub(crate) struct PoolTally {
    downloaded: AtomicU64,
    skipped: AtomicU64,
    failed: AtomicU64,
    cancelled: AtomicU64,
    bytes_downloaded: AtomicU64,
    failures: Mutex<Vec<FailedTask>>,
}

impl PoolTally {
    /// Record the outcome of one task
    pub fn record(&self, task: &DownloadTask, outcome: &TaskOutcome) {
        match outcome {
            TaskOutcome::Downloaded(bytes) => {
                self.downloaded.fetch_add(1, Ordering::Relaxed);
                self.bytes_downloaded.fetch_add(*bytes, Ordering::Relaxed);
            }
            TaskOutcome::Skipped => {
                self.skipped.fetch_add(1, Ordering::Relaxed);
            }
            TaskOutcome::Failed(error) => {
                self.failed.fetch_add(1, Ordering::Relaxed);
                self.failures
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push(FailedTask {
                        key: task.location.key.clone(),
                        local_path: task.local_path.clone(),
                        error: error.to_string(),
                    });
            }
        }
    }

    /// Record tasks dropped from the queue by a stop
    pub fn record_cancelled(&self, count: u64) {
        self.cancelled.fetch_add(count, Ordering::Relaxed);
    }

    /// Snapshot of the counters
    pub fn snapshot(&self) -> DownloadReport {
        DownloadReport {
            downloaded: self.downloaded.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
            bytes_downloaded: self.bytes_downloaded.load(Ordering::Relaxed),
            failures: self
                .failures
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    use crate::app::models::CatalogRecord;

    fn task() -> DownloadTask {
        let record = CatalogRecord::new("id", "s3://usgs-lidar/Projects/P/tile_1.laz");
        DownloadTask::new(record, "P", Path::new("out")).unwrap()
    }

    /// Test status lines shown to the user
    ///
    /// Task start produces the "Downloading <file>..." line; terminal
    /// statuses include size or error detail.
    #[test]
    fn test_status_description() {
        let task = task();

        let progress = WorkerProgress::for_task(1, WorkerStatus::Downloading, &task);
        assert_eq!(progress.status_description(), "Downloading tile_1.laz...");
        assert_eq!(progress.project.as_deref(), Some("P"));

        let mut progress = WorkerProgress::for_task(1, WorkerStatus::Completed, &task);
        progress.bytes = 2048;
        assert_eq!(progress.status_description(), "Downloaded tile_1.laz (2.0 KB)");

        let mut progress = WorkerProgress::for_task(1, WorkerStatus::Failed, &task);
        progress.error_message = Some("Object not found: x".to_string());
        assert!(progress.status_description().contains("Object not found"));

        assert_eq!(
            WorkerProgress::new(2, WorkerStatus::Idle).status_description(),
            "Waiting for work"
        );
    }

    #[test]
    fn test_worker_status_terminal() {
        assert!(WorkerStatus::Completed.is_terminal());
        assert!(WorkerStatus::Skipped.is_terminal());
        assert!(WorkerStatus::Failed.is_terminal());
        assert!(!WorkerStatus::Downloading.is_terminal());
        assert!(!WorkerStatus::Idle.is_terminal());
    }

    #[test]
    fn test_tally_snapshot() {
        let tally = PoolTally::default();
        let task = task();

        tally.record(&task, &TaskOutcome::Downloaded(100));
        tally.record(&task, &TaskOutcome::Downloaded(50));
        tally.record(&task, &TaskOutcome::Skipped);
        tally.record(
            &task,
            &TaskOutcome::Failed(DownloadError::NotFound {
                key: task.location.key.clone(),
            }),
        );
        tally.record_cancelled(3);

        let report = tally.snapshot();
        assert_eq!(report.downloaded, 2);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(report.cancelled, 3);
        assert_eq!(report.bytes_downloaded, 150);
        assert_eq!(report.processed(), 4);
        assert!(!report.is_complete_success());
        assert_eq!(report.failures[0].key, "Projects/P/tile_1.laz");
    }
}
