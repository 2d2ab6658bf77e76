//! Remote object store access
//!
//! Workers only see the [`ObjectStore`] trait. The production implementation
//! is [`S3Store`], which reads from the requester-pays LIDAR bucket;
//! [`MemoryStore`] serves scripted contents for tests.
//!
//! # Examples
//!
//! ```rust,no_run
//! use std::path::Path;
//! use lidar_fetcher::app::models::ObjectLocation;
//! use lidar_fetcher::app::store::{ObjectStore, S3Store, StoreConfig, StoreCredentials};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let credentials = StoreCredentials::from_env()?;
//! let store = S3Store::new(&credentials, &StoreConfig::default());
//!
//! let location = ObjectLocation::parse("s3://usgs-lidar/Projects/X/tile.laz")?;
//! let bytes = store.fetch_to_path(&location, Path::new("tile.laz.tmp")).await?;
//! println!("{} bytes", bytes);
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::app::models::ObjectLocation;
use crate::constants::{env, store};
use crate::errors::{ConfigError, ConfigResult, DownloadResult};

pub mod memory;
pub mod s3;

pub use memory::MemoryStore;
pub use s3::S3Store;

/// Read access to the remote object store
///
/// Implementations are shared by all workers and must be safe for concurrent
/// calls; every call is an independent request.
#[async_trait]
pub trait ObjectStore: Send + Sync + fmt::Debug {
    /// Stream the object at `location` into a new file at `dest`
    ///
    /// Returns the number of bytes written. On error the caller owns cleanup
    /// of whatever was written to `dest`.
    async fn fetch_to_path(&self, location: &ObjectLocation, dest: &Path) -> DownloadResult<u64>;

    /// Cheap request proving the credentials can reach `bucket`
    async fn probe(&self, bucket: &str) -> DownloadResult<()>;
}

/// Object store client settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Region used when the environment does not name one
    pub region: String,
    /// Transport attempts per request, including the first
    pub max_attempts: u32,
    #[serde(with = "humantime_serde")]
    pub connect_timeout: Duration,
    #[serde(with = "humantime_serde")]
    pub read_timeout: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            region: store::DEFAULT_REGION.to_string(),
            max_attempts: store::MAX_ATTEMPTS,
            connect_timeout: store::CONNECT_TIMEOUT,
            read_timeout: store::READ_TIMEOUT,
        }
    }
}

/// Caller-supplied store credentials
#[derive(Clone, PartialEq, Eq)]
pub struct StoreCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    /// Region from the environment, if set
    pub region: Option<String>,
}

impl fmt::Debug for StoreCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("region", &self.region)
            .finish()
    }
}

impl StoreCredentials {
    /// Resolve credentials from the process environment
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingCredentials`] when the key id or secret
    /// is unset or blank.
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Resolve credentials through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_blank = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let access_key_id = non_blank(env::ACCESS_KEY_ID).ok_or(ConfigError::MissingCredentials)?;
        let secret_access_key =
            non_blank(env::SECRET_ACCESS_KEY).ok_or(ConfigError::MissingCredentials)?;

        Ok(Self {
            access_key_id,
            secret_access_key,
            region: non_blank(env::REGION),
        })
    }

    /// Region to use: environment first, then configuration
    pub fn region_or<'a>(&'a self, config: &'a StoreConfig) -> &'a str {
        self.region.as_deref().unwrap_or(config.region.as_str())
    }
}
