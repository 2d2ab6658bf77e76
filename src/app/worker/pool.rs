//! Worker pool management and coordination
//!
//! The pool owns the queue, spawns a fixed number of workers over it and
//! collects their outcomes into a [`DownloadReport`]. Stopping is
//! cooperative: the shared flag keeps workers from claiming new tasks, while a
//! transfer already running finishes or fails on its own.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::config::{validate_worker_count, WorkerConfig};
use super::core::DownloadWorkerBuilder;
use super::types::{DownloadReport, PoolTally, WorkerProgress, WorkerResult};
use crate::app::models::DownloadTask;
use crate::app::queue::DownloadQueue;
use crate::app::store::ObjectStore;
use crate::errors::DownloadError;

#[derive(Debug, Default)]
struct StopState {
    requested: AtomicBool,
    notify: Notify,
}

/// Cloneable handle that requests a cooperative stop
///
/// Safe to move into signal handlers: stopping closes the queue and wakes
/// anything waiting on [`StopHandle::stopped`].
#[derive(Debug, Clone)]
pub struct StopHandle {
    state: Arc<StopState>,
    queue: Arc<DownloadQueue>,
}

impl StopHandle {
    pub(crate) fn new(queue: Arc<DownloadQueue>) -> Self {
        Self {
            state: Arc::new(StopState::default()),
            queue,
        }
    }

    /// Request a stop; idempotent
    pub fn stop(&self) {
        if !self.state.requested.swap(true, Ordering::AcqRel) {
            info!("Stop requested");
        }
        self.queue.close();
        self.state.notify.notify_waiters();
    }

    pub fn is_stopped(&self) -> bool {
        self.state.requested.load(Ordering::Acquire)
    }

    /// Resolve once a stop has been requested
    pub async fn stopped(&self) {
        loop {
            let notified = self.state.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.is_stopped() {
                return;
            }
            notified.await;
        }
    }
}

/// Current state of the worker pool
#[derive(Debug, Clone, PartialEq)]
pub enum PoolState {
    /// Pool has been created but not started
    Created,
    /// Pool is running with active workers
    Running,
    /// Stop requested; some workers are still finishing a transfer
    ShuttingDown,
    /// All workers have exited
    Shutdown,
}

/// Pool of download workers draining one shared queue
#[derive(Debug)]
pub struct WorkerPool {
    /// Worker configuration
    config: WorkerConfig,
    /// Shared task queue
    queue: Arc<DownloadQueue>,
    /// Shared store client
    store: Arc<dyn ObjectStore>,
    /// Outcome counters
    tally: Arc<PoolTally>,
    /// Cooperative stop flag
    stop: StopHandle,
    /// Optional progress channel handed to every worker
    progress_tx: Option<mpsc::Sender<WorkerProgress>>,
    /// Worker task handles still being tracked
    worker_handles: Vec<JoinHandle<WorkerResult<()>>>,
    /// Pool state
    state: PoolState,
}

impl WorkerPool {
    /// Create a pool over an initialized store
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::ConfigurationError`] for an invalid config.
    pub fn new(config: WorkerConfig, store: Arc<dyn ObjectStore>) -> WorkerResult<Self> {
        config.validate()?;

        let queue = Arc::new(DownloadQueue::new());
        let stop = StopHandle::new(queue.clone());

        Ok(Self {
            config,
            queue,
            store,
            tally: Arc::new(PoolTally::default()),
            stop,
            progress_tx: None,
            worker_handles: Vec::new(),
            state: PoolState::Created,
        })
    }

    /// Send worker progress events to `progress_tx`
    pub fn with_progress(mut self, progress_tx: mpsc::Sender<WorkerProgress>) -> Self {
        self.progress_tx = Some(progress_tx);
        self
    }

    /// Queue a task; never blocks
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::Rejected`] after the pool has been stopped.
    /// The rejection is logged and the task is dropped.
    pub fn enqueue(&self, task: DownloadTask) -> WorkerResult<()> {
        self.queue.push(task).inspect_err(|e| {
            warn!("{}", e);
        })
    }

    /// Spawn `worker_count` workers over the queue
    pub fn start(&mut self, worker_count: usize) -> WorkerResult<()> {
        if self.state != PoolState::Created {
            return Err(DownloadError::ConfigurationError(format!(
                "Cannot start pool in state: {:?}",
                self.state
            )));
        }
        validate_worker_count(worker_count)?;

        info!(
            "Starting {} workers for {} queued tasks",
            worker_count,
            self.queue.len()
        );

        for worker_id in 0..worker_count {
            let mut builder = DownloadWorkerBuilder::new()
                .id(worker_id as u32)
                .config(self.config.clone())
                .queue(self.queue.clone())
                .store(self.store.clone())
                .tally(self.tally.clone())
                .stop_handle(self.stop.clone());
            if let Some(progress_tx) = &self.progress_tx {
                builder = builder.progress_channel(progress_tx.clone());
            }
            let worker = builder.build()?;

            self.worker_handles
                .push(tokio::spawn(async move { worker.run().await }));
        }

        self.state = PoolState::Running;
        Ok(())
    }

    /// Request a cooperative stop and wait, bounded, for workers to exit
    ///
    /// Tasks still queued are dropped and counted as cancelled. Returns the
    /// number of workers still finishing an in-flight transfer when the
    /// shutdown wait ran out.
    pub async fn stop(&mut self) -> usize {
        self.stop.stop();
        self.finish_stop().await
    }

    /// Wait until every worker has exited or a stop is requested
    ///
    /// A stop request (for example from a signal handler holding a
    /// [`StopHandle`]) ends the wait early and performs the same bounded
    /// shutdown as [`WorkerPool::stop`].
    pub async fn wait(&mut self) -> DownloadReport {
        let stop = self.stop.clone();
        let mut handles = std::mem::take(&mut self.worker_handles);

        tokio::select! {
            _ = join_all(&mut handles) => {
                debug!("All workers exited");
            }
            _ = stop.stopped() => {
                info!("Stop requested while waiting for workers");
            }
        }

        handles.retain(|handle| !handle.is_finished());
        self.worker_handles = handles;

        if self.stop.is_stopped() {
            self.finish_stop().await;
        } else if self.worker_handles.is_empty() {
            self.state = PoolState::Shutdown;
        }

        let report = self.report();
        info!(
            "Download pool finished: {} downloaded, {} skipped, {} failed, {} cancelled",
            report.downloaded, report.skipped, report.failed, report.cancelled
        );
        report
    }

    async fn finish_stop(&mut self) -> usize {
        let cancelled = self.queue.drain().len();
        if cancelled > 0 {
            info!("Cancelled {} queued tasks", cancelled);
            self.tally.record_cancelled(cancelled as u64);
        }

        self.state = PoolState::ShuttingDown;
        let remaining = self.join_bounded(self.config.shutdown_timeout).await;
        if remaining == 0 {
            self.state = PoolState::Shutdown;
        } else {
            warn!(
                "{} workers still finishing in-flight transfers after {:?}",
                remaining, self.config.shutdown_timeout
            );
        }
        remaining
    }

    /// Join workers until `wait` elapses; keeps the handles still running
    async fn join_bounded(&mut self, wait: Duration) -> usize {
        let deadline = Instant::now() + wait;
        let mut still_running = Vec::new();

        for mut handle in std::mem::take(&mut self.worker_handles) {
            match tokio::time::timeout_at(deadline, &mut handle).await {
                Ok(result) => log_worker_result(result),
                Err(_) => still_running.push(handle),
            }
        }

        self.worker_handles = still_running;
        self.worker_handles.len()
    }

    /// True while at least one worker is alive
    pub fn is_downloading(&self) -> bool {
        self.worker_handles
            .iter()
            .any(|handle| !handle.is_finished())
    }

    /// Tasks not yet claimed by a worker
    pub fn queue_depth(&self) -> usize {
        self.queue.len()
    }

    /// Snapshot of the outcome counters
    pub fn report(&self) -> DownloadReport {
        self.tally.snapshot()
    }

    /// Handle for requesting a stop from elsewhere
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn state(&self) -> &PoolState {
        &self.state
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }
}

async fn join_all(handles: &mut [JoinHandle<WorkerResult<()>>]) {
    for handle in handles.iter_mut() {
        log_worker_result(handle.await);
    }
}

fn log_worker_result(result: Result<WorkerResult<()>, tokio::task::JoinError>) {
    match result {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!("Worker failed: {}", e),
        Err(e) => warn!("Worker panicked: {}", e),
    }
}
