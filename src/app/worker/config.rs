//! Worker configuration management
//!
//! Configuration for the download pool: how many workers, how long an idle
//! worker waits before exiting, how long a stop waits for workers, and the
//! per-transfer time budget.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::workers;
use crate::errors::{DownloadError, DownloadResult};

/// Configuration for download workers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Number of concurrent workers to spawn
    pub worker_count: usize,
    /// How long a worker waits on an empty queue before exiting
    pub idle_timeout: Duration,
    /// Bounded wait for workers after a stop request
    pub shutdown_timeout: Duration,
    /// Upper bound for a single object transfer
    pub transfer_timeout: Duration,
    /// Channel buffer size for progress reporting
    pub progress_buffer_size: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            worker_count: workers::DEFAULT_WORKER_COUNT,
            idle_timeout: workers::IDLE_TIMEOUT,
            shutdown_timeout: workers::SHUTDOWN_TIMEOUT,
            transfer_timeout: workers::TRANSFER_TIMEOUT,
            progress_buffer_size: workers::CHANNEL_BUFFER_SIZE,
        }
    }
}

impl WorkerConfig {
    /// Validate configuration values and return errors for invalid settings
    pub fn validate(&self) -> DownloadResult<()> {
        validate_worker_count(self.worker_count)?;

        if self.idle_timeout.is_zero() {
            return Err(DownloadError::ConfigurationError(
                "Idle timeout must be greater than zero".to_string(),
            ));
        }

        if self.transfer_timeout.is_zero() {
            return Err(DownloadError::ConfigurationError(
                "Transfer timeout must be greater than zero".to_string(),
            ));
        }

        if self.progress_buffer_size == 0 {
            return Err(DownloadError::ConfigurationError(
                "Progress buffer size must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}

/// Reject worker counts outside `1..=MAX_WORKER_COUNT`
pub(crate) fn validate_worker_count(count: usize) -> DownloadResult<()> {
    if count == 0 {
        return Err(DownloadError::ConfigurationError(
            "Worker count cannot be zero".to_string(),
        ));
    }

    if count > workers::MAX_WORKER_COUNT {
        return Err(DownloadError::ConfigurationError(format!(
            "Worker count ({}) exceeds maximum ({})",
            count,
            workers::MAX_WORKER_COUNT
        )));
    }

    Ok(())
}

/// Builder for WorkerConfig
#[derive(Debug, Default)]
pub struct WorkerConfigBuilder {
    config: WorkerConfig,
}

impl WorkerConfigBuilder {
    /// Create a new builder with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of workers
    pub fn worker_count(mut self, count: usize) -> Self {
        self.config.worker_count = count;
        self
    }

    /// Set the idle timeout
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.config.idle_timeout = timeout;
        self
    }

    /// Set the shutdown wait
    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.config.shutdown_timeout = timeout;
        self
    }

    /// Set the transfer timeout
    pub fn transfer_timeout(mut self, timeout: Duration) -> Self {
        self.config.transfer_timeout = timeout;
        self
    }

    /// Set progress buffer size
    pub fn progress_buffer_size(mut self, size: usize) -> Self {
        self.config.progress_buffer_size = size;
        self
    }

    /// Build and validate the configuration
    pub fn build(self) -> DownloadResult<WorkerConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Configuration presets for different deployment scenarios
pub struct ConfigPresets;

impl ConfigPresets {
    /// Production configuration: the defaults
    pub fn production() -> WorkerConfig {
        WorkerConfig::default()
    }

    /// Testing configuration with fast timeouts
    pub fn testing() -> WorkerConfig {
        WorkerConfig {
            worker_count: 2,
            idle_timeout: Duration::from_millis(100),
            shutdown_timeout: Duration::from_millis(500),
            transfer_timeout: Duration::from_secs(5),
            progress_buffer_size: 64,
        }
    }
}
