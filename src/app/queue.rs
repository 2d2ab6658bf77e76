//! Unbounded FIFO of pending download tasks
//!
//! The queue is the only structure workers share. Popping a task is the single
//! point of mutual exclusion: once a worker has popped a task no other worker
//! can see it. Workers wait on an empty queue for a bounded time and then give
//! up, which is how the pool winds down once everything has been claimed.
//!
//! The lock is a `std::sync::Mutex` held only for a push or pop, never across
//! an `.await`, so enqueueing never blocks the caller.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::debug;

use crate::app::models::DownloadTask;
use crate::errors::{DownloadError, DownloadResult};

/// Shared queue of download tasks
#[derive(Debug, Default)]
pub struct DownloadQueue {
    tasks: Mutex<VecDeque<DownloadTask>>,
    available: Notify,
    closed: AtomicBool,
}

impl DownloadQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<DownloadTask>> {
        // A panic while holding the lock cannot leave the deque half-modified
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append a task
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::Rejected`] once the queue has been closed.
    pub fn push(&self, task: DownloadTask) -> DownloadResult<()> {
        if self.is_closed() {
            return Err(DownloadError::Rejected {
                reason: format!("queue closed, not accepting {}", task.location),
            });
        }

        self.lock().push_back(task);
        self.available.notify_one();
        Ok(())
    }

    /// Take the oldest task, waiting up to `wait` for one to arrive
    ///
    /// Returns `None` when the wait expires with the queue still empty, or as
    /// soon as the queue is closed.
    pub async fn pop_timeout(&self, wait: Duration) -> Option<DownloadTask> {
        let deadline = Instant::now() + wait;

        loop {
            let notified = self.available.notified();
            tokio::pin!(notified);
            // Register before checking so a push between check and wait is not lost
            notified.as_mut().enable();

            if self.is_closed() {
                return None;
            }
            if let Some(task) = self.lock().pop_front() {
                return Some(task);
            }

            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                if self.is_closed() {
                    return None;
                }
                return self.lock().pop_front();
            }
        }
    }

    /// Stop accepting and handing out tasks; wakes every waiting worker
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            debug!("Download queue closed with {} tasks pending", self.len());
        }
        self.available.notify_waiters();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Current number of unclaimed tasks
    ///
    /// Only an observation: concurrent pushes and pops may change it at once.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Remove and return every unclaimed task
    pub fn drain(&self) -> Vec<DownloadTask> {
        self.lock().drain(..).collect()
    }
}
