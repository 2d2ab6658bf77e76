//! Configuration management for LIDAR Fetcher
//!
//! This module provides unified configuration management with automatic
//! first-run initialization, file discovery, and zero-config defaults. Every
//! section is optional in the file; missing keys fall back to defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::app::catalog::CatalogConfig;
use crate::app::orchestrator::OrchestratorConfig;
use crate::app::store::StoreConfig;
use crate::app::worker::WorkerConfig;
use crate::constants::{catalog, files, logging, store, workers};
use crate::errors::{ConfigError, ConfigResult};

/// Unified application configuration for TOML serialization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Catalog search settings
    pub catalog: CatalogConfig,
    /// Object store client settings
    pub store: StoreConfig,
    /// Download pipeline settings
    pub download: DownloadConfigToml,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// TOML-friendly download configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadConfigToml {
    /// Root directory for downloaded files
    pub output_dir: PathBuf,
    /// Number of concurrent workers
    pub worker_count: usize,
    /// How long an idle worker waits for work before exiting
    #[serde(with = "humantime_serde")]
    pub idle_timeout: Duration,
    /// Bounded wait for workers after a stop
    #[serde(with = "humantime_serde")]
    pub shutdown_timeout: Duration,
    /// Upper bound for a single transfer
    #[serde(with = "humantime_serde")]
    pub transfer_timeout: Duration,
    /// Channel buffer size for progress reporting
    pub progress_buffer_size: usize,
    /// Random sample size per project (unset = everything)
    pub max_files_per_project: Option<usize>,
}

impl Default for DownloadConfigToml {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from(files::DEFAULT_OUTPUT_DIR),
            worker_count: workers::DEFAULT_WORKER_COUNT,
            idle_timeout: workers::IDLE_TIMEOUT,
            shutdown_timeout: workers::SHUTDOWN_TIMEOUT,
            transfer_timeout: workers::TRANSFER_TIMEOUT,
            progress_buffer_size: workers::CHANNEL_BUFFER_SIZE,
            max_files_per_project: None,
        }
    }
}

impl DownloadConfigToml {
    /// Convert to runtime WorkerConfig
    pub fn worker_config(&self) -> WorkerConfig {
        WorkerConfig {
            worker_count: self.worker_count,
            idle_timeout: self.idle_timeout,
            shutdown_timeout: self.shutdown_timeout,
            transfer_timeout: self.transfer_timeout,
            progress_buffer_size: self.progress_buffer_size,
        }
    }

    /// Convert to runtime OrchestratorConfig
    pub fn to_runtime_config(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            output_dir: self.output_dir.clone(),
            worker_config: self.worker_config(),
            max_files_per_project: self.max_files_per_project,
            handle_signals: true,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default log level for the application
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: logging::DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration
    ///
    /// An explicit path must exist. Without one, the first file found in the
    /// standard locations is used, or the defaults if there is none.
    pub async fn load(config_file_override: Option<PathBuf>) -> ConfigResult<Self> {
        let config_path = match config_file_override {
            Some(path) => {
                if !path.exists() {
                    return Err(ConfigError::NotFound { path });
                }
                Some(path)
            }
            None => Self::find_config_file(),
        };

        let config = match config_path {
            Some(path) => Self::load_from_file(&path).await?,
            None => {
                debug!("No config file found, using defaults");
                Self::default()
            }
        };

        config.validate()?;
        Ok(config)
    }

    /// Reject values that would make a run impossible
    pub fn validate(&self) -> ConfigResult<()> {
        if self.catalog.page_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "catalog.page_size".to_string(),
                value: "0".to_string(),
                reason: "Page size must be at least 1".to_string(),
            });
        }

        if self.store.max_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                field: "store.max_attempts".to_string(),
                value: "0".to_string(),
                reason: "At least one attempt is required".to_string(),
            });
        }

        if let Err(e) = self.download.worker_config().validate() {
            return Err(ConfigError::InvalidValue {
                field: "download".to_string(),
                value: format!("worker_count = {}", self.download.worker_count),
                reason: e.to_string(),
            });
        }

        if self.download.max_files_per_project == Some(0) {
            return Err(ConfigError::InvalidValue {
                field: "download.max_files_per_project".to_string(),
                value: "0".to_string(),
                reason: "Remove the key to download every file".to_string(),
            });
        }

        Ok(())
    }

    /// Initialize configuration on first run
    ///
    /// Creates a commented default config file in the user config directory
    /// if none exists. Returns the path of the (possibly new) file.
    pub async fn initialize_first_run() -> ConfigResult<Option<PathBuf>> {
        let Some(config_path) = Self::default_config_path() else {
            debug!("No user config directory; skipping first-run setup");
            return Ok(None);
        };

        if config_path.exists() {
            return Ok(Some(config_path));
        }

        info!("Creating default configuration file...");
        Self::write_default_config(&config_path).await?;

        println!("📁 Created default configuration file:");
        println!("   {}", config_path.display());
        println!("   You can customize settings by editing this file.");
        println!();

        Ok(Some(config_path))
    }

    /// Write the commented default configuration to `path`
    pub async fn write_default_config(path: &Path) -> ConfigResult<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, Self::generate_default_config_content()).await?;
        Ok(())
    }

    /// Find configuration file in standard locations
    fn find_config_file() -> Option<PathBuf> {
        let local = PathBuf::from(files::LOCAL_CONFIG_FILE);
        std::iter::once(local)
            .chain(Self::default_config_path())
            .find(|path| {
                let found = path.exists();
                if found {
                    debug!("Found config file: {}", path.display());
                }
                found
            })
    }

    /// Get the default config file path for the current user
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(files::CONFIG_DIR_NAME).join("config.toml"))
    }

    /// Load configuration from a TOML file
    async fn load_from_file(path: &Path) -> ConfigResult<Self> {
        let content = tokio::fs::read_to_string(path).await?;
        let config: AppConfig = toml::from_str(&content)?;

        info!("Loaded configuration from: {}", path.display());
        Ok(config)
    }

    /// Generate default configuration content with helpful comments
    fn generate_default_config_content() -> String {
        format!(
            r#"# LIDAR Fetcher Configuration
# This file was automatically generated on first run.
# You can customize any of these settings to suit your needs.
# Durations accept values such as "500ms", "10s" or "30m".

[catalog]
# Products endpoint of the catalog
base_url = "{base_url}"
datasets = "{datasets}"
prod_formats = "{prod_formats}"
date_type = "{date_type}"

# Records per page and pause between page requests
page_size = {page_size}
page_delay = "500ms"

request_timeout = "30s"
connect_timeout = "10s"

[store]
# Used when AWS_REGION is not set
region = "{region}"
# Transport attempts per request, including the first
max_attempts = {max_attempts}
connect_timeout = "10s"
read_timeout = "10s"

[download]
# Files land under <output_dir>/<project>/
output_dir = "{output_dir}"
worker_count = {worker_count}
idle_timeout = "1s"
shutdown_timeout = "1s"
transfer_timeout = "30m"
progress_buffer_size = {buffer}

# Keep a random sample of at most N files per project
# max_files_per_project = 10

[logging]
level = "{level}"  # error, warn, info, debug, trace
"#,
            base_url = catalog::BASE_URL,
            datasets = catalog::DATASETS,
            prod_formats = catalog::PROD_FORMATS,
            date_type = catalog::DATE_TYPE,
            page_size = catalog::PAGE_SIZE,
            region = store::DEFAULT_REGION,
            max_attempts = store::MAX_ATTEMPTS,
            output_dir = files::DEFAULT_OUTPUT_DIR,
            worker_count = workers::DEFAULT_WORKER_COUNT,
            buffer = workers::CHANNEL_BUFFER_SIZE,
            level = logging::DEFAULT_LOG_LEVEL,
        )
    }
}
