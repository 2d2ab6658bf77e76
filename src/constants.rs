//! Application constants for LIDAR Fetcher
//!
//! This module centralizes all constants used throughout the application,
//! organized by functional domain for maintainability and clarity.

use std::time::Duration;

/// Environment variable names for object store credentials
pub mod env {
    /// Access key identifier for the object store
    pub const ACCESS_KEY_ID: &str = "AWS_ACCESS_KEY_ID";

    /// Secret access key for the object store
    pub const SECRET_ACCESS_KEY: &str = "AWS_SECRET_ACCESS_KEY";

    /// Region of the object store
    pub const REGION: &str = "AWS_REGION";
}

/// Credential storage constants
pub mod auth {
    /// File permissions for .env file (Unix only) - owner read/write only
    #[cfg(unix)]
    pub const ENV_FILE_PERMISSIONS: u32 = 0o600;

    /// Minimum plausible length of an access key id
    pub const MIN_ACCESS_KEY_LENGTH: usize = 16;

    /// Maximum plausible length of an access key id
    pub const MAX_ACCESS_KEY_LENGTH: usize = 128;

    /// Credentials file in the working directory
    pub const DOTENV_FILE: &str = ".env";
}

/// National Map catalog API
pub mod catalog {
    use super::Duration;

    /// Products endpoint of the National Map access API
    pub const BASE_URL: &str = "https://tnmaccess.nationalmap.gov/api/v1/products";

    /// Dataset name for LIDAR point clouds
    pub const DATASETS: &str = "Lidar Point Cloud (LPC)";

    /// Only LAZ products are downloaded
    pub const PROD_FORMATS: &str = "LAZ";

    /// Response format requested from the catalog
    pub const OUTPUT_FORMAT: &str = "JSON";

    /// Date field the date range filters on
    pub const DATE_TYPE: &str = "dateCreated";

    /// Records per page; kept below the API maximum so truncated pages stay cheap
    pub const PAGE_SIZE: usize = 25;

    /// Pause between page requests to stay under the service's informal rate limit
    pub const PAGE_DELAY: Duration = Duration::from_millis(500);

    /// Maximum characters of a response body kept in a search error
    pub const ERROR_BODY_LIMIT: usize = 500;

    /// Minimum number of polygon vertices
    pub const MIN_POLYGON_VERTICES: usize = 3;
}

/// Object store configuration
pub mod store {
    use super::Duration;

    /// URL scheme of catalog download locators
    pub const SCHEME: &str = "s3";

    /// Region used when none is configured
    pub const DEFAULT_REGION: &str = "us-west-2";

    /// Public requester-pays bucket holding the USGS LIDAR projects
    pub const LIDAR_BUCKET: &str = "usgs-lidar";

    /// Transport-level attempts made by the store client per request
    pub const MAX_ATTEMPTS: u32 = 3;

    /// Store connection timeout
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

    /// Store read timeout
    pub const READ_TIMEOUT: Duration = Duration::from_secs(10);
}

/// HTTP client configuration constants
pub mod http {
    use super::Duration;

    /// Default user agent for all HTTP requests
    pub const USER_AGENT: &str = "LIDAR-Fetcher/0.1.0 (Geospatial Research Tool)";

    /// Default HTTP request timeout
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

    /// Connection establishment timeout
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

    /// Connection pool idle timeout
    pub const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(90);
}

/// File operation constants
pub mod files {
    /// Temporary file suffix for atomic operations
    pub const TEMP_FILE_SUFFIX: &str = ".tmp";

    /// Default output directory name
    pub const DEFAULT_OUTPUT_DIR: &str = "LIDAR";

    /// Name of the local config file looked up in the working directory
    pub const LOCAL_CONFIG_FILE: &str = "lidar-fetcher.toml";

    /// Directory name used under the user config dir
    pub const CONFIG_DIR_NAME: &str = "lidar-fetcher";
}

/// Project grouping constants
pub mod projects {
    /// Bucket for records whose filename matches no known naming convention
    pub const UNKNOWN: &str = "Unknown";
}

/// Worker and concurrency configuration
pub mod workers {
    use super::Duration;

    /// Default number of download workers
    pub const DEFAULT_WORKER_COUNT: usize = 3;

    /// Maximum recommended concurrent workers
    pub const MAX_WORKER_COUNT: usize = 32;

    /// How long an idle worker waits on an empty queue before exiting
    pub const IDLE_TIMEOUT: Duration = Duration::from_secs(1);

    /// Bounded wait for workers to exit after a stop request
    pub const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(1);

    /// Upper bound for a single object transfer
    pub const TRANSFER_TIMEOUT: Duration = Duration::from_secs(30 * 60);

    /// Channel buffer size for progress reporting
    pub const CHANNEL_BUFFER_SIZE: usize = 100;
}

/// Logging constants
pub mod logging {
    /// Default log level
    pub const DEFAULT_LOG_LEVEL: &str = "info";
}

// Re-export commonly used constants for convenience
pub use catalog::{BASE_URL as CATALOG_BASE_URL, PAGE_SIZE};
pub use env::{ACCESS_KEY_ID as ENV_ACCESS_KEY_ID, SECRET_ACCESS_KEY as ENV_SECRET_ACCESS_KEY};
pub use files::TEMP_FILE_SUFFIX;
pub use http::USER_AGENT;
pub use projects::UNKNOWN as UNKNOWN_PROJECT;
pub use workers::DEFAULT_WORKER_COUNT;
