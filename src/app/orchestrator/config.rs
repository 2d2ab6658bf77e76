//! Configuration for an acquisition run

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::app::worker::WorkerConfig;
use crate::constants::files;
use crate::errors::{DownloadError, DownloadResult};

/// Settings the orchestrator applies to one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Root directory; files land under `<output_dir>/<project>/`
    pub output_dir: PathBuf,
    /// Worker pool settings, including the worker count
    pub worker_config: WorkerConfig,
    /// Keep at most this many randomly chosen records per project
    pub max_files_per_project: Option<usize>,
    /// Stop the pool on Ctrl-C / SIGTERM
    pub handle_signals: bool,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from(files::DEFAULT_OUTPUT_DIR),
            worker_config: WorkerConfig::default(),
            max_files_per_project: None,
            handle_signals: true,
        }
    }
}

impl OrchestratorConfig {
    /// Set the output directory
    pub fn with_output_dir(mut self, output_dir: impl Into<PathBuf>) -> Self {
        self.output_dir = output_dir.into();
        self
    }

    /// Set the number of workers
    pub fn with_worker_count(mut self, count: usize) -> Self {
        self.worker_config.worker_count = count;
        self
    }

    /// Limit every project to `max` sampled records
    pub fn with_max_files_per_project(mut self, max: Option<usize>) -> Self {
        self.max_files_per_project = max;
        self
    }

    /// Enable or disable signal handling
    pub fn with_signal_handling(mut self, enabled: bool) -> Self {
        self.handle_signals = enabled;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> DownloadResult<()> {
        self.worker_config.validate()?;

        if self.max_files_per_project == Some(0) {
            return Err(DownloadError::ConfigurationError(
                "max_files_per_project must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builders() {
        let config = OrchestratorConfig::default()
            .with_output_dir("out")
            .with_worker_count(5)
            .with_max_files_per_project(Some(2))
            .with_signal_handling(false);

        assert_eq!(config.output_dir, PathBuf::from("out"));
        assert_eq!(config.worker_config.worker_count, 5);
        assert_eq!(config.max_files_per_project, Some(2));
        assert!(!config.handle_signals);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let config = OrchestratorConfig::default().with_max_files_per_project(Some(0));
        assert!(config.validate().is_err());

        let config = OrchestratorConfig::default().with_worker_count(0);
        assert!(config.validate().is_err());
    }
}
