//! Error types for LIDAR Fetcher
//!
//! Errors follow the three-way split of the acquisition pipeline:
//! configuration problems stop a run before any work starts, search failures
//! abort the catalog query as a whole, and download failures stay local to a
//! single task and are only counted.

use std::path::PathBuf;

use thiserror::Error;

use crate::constants::catalog::ERROR_BODY_LIMIT;

/// Configuration errors, fatal before any work starts
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Object store credentials are not available
    #[error(
        "Missing object store credentials. Set AWS_ACCESS_KEY_ID and AWS_SECRET_ACCESS_KEY or run 'auth setup'"
    )]
    MissingCredentials,

    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    NotFound { path: PathBuf },

    /// Invalid configuration format
    #[error("Invalid configuration format")]
    InvalidFormat(#[from] toml::de::Error),

    /// Invalid configuration value
    #[error("Invalid configuration value for {field}: {value}. {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    /// I/O error reading or writing configuration
    #[error("Configuration I/O error")]
    Io(#[from] std::io::Error),
}

/// Catalog search errors; any of them aborts the whole search
#[derive(Error, Debug)]
pub enum SearchError {
    /// The query itself cannot be sent
    #[error("Invalid search query: {reason}")]
    InvalidQuery { reason: String },

    /// Connection-level failure (DNS, TLS, timeout, reset)
    #[error("Catalog request failed")]
    Transport(#[from] reqwest::Error),

    /// Catalog answered with a non-success status
    #[error("Catalog returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// Catalog answered with a body that is not a valid page
    #[error("Malformed catalog response: {reason}")]
    MalformedBody { reason: String, body: String },
}

impl SearchError {
    /// Build a status error, keeping at most the first few hundred characters of the body
    pub fn status(status: u16, body: &str) -> Self {
        Self::Status {
            status,
            body: truncate_body(body),
        }
    }

    /// Build a malformed-body error with a truncated body excerpt
    pub fn malformed(reason: impl Into<String>, body: &str) -> Self {
        Self::MalformedBody {
            reason: reason.into(),
            body: truncate_body(body),
        }
    }

    /// HTTP status of the failing response, when one was received
    pub fn http_status(&self) -> Option<u16> {
        match self {
            SearchError::Status { status, .. } => Some(*status),
            SearchError::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Truncated response body, when one was received
    pub fn body(&self) -> Option<&str> {
        match self {
            SearchError::Status { body, .. } | SearchError::MalformedBody { body, .. } => {
                Some(body.as_str())
            }
            _ => None,
        }
    }
}

/// Keep at most `ERROR_BODY_LIMIT` characters, respecting char boundaries
pub fn truncate_body(body: &str) -> String {
    body.chars().take(ERROR_BODY_LIMIT).collect()
}

/// Per-task download errors; isolated, logged and counted
#[derive(Error, Debug)]
pub enum DownloadError {
    /// Download URL is not a `scheme://bucket/key` locator
    #[error("Invalid download locator: {url} - {reason}")]
    InvalidLocator { url: String, reason: String },

    /// Object does not exist in the store
    #[error("Object not found: {key}")]
    NotFound { key: String },

    /// Store rejected or failed the request
    #[error("Object store error for {key}: {message}")]
    Store { key: String, message: String },

    /// Transfer exceeded its time budget
    #[error("Transfer timed out after {seconds} seconds")]
    Timeout { seconds: u64 },

    /// I/O error during file operations
    #[error("File I/O error")]
    Io(#[from] std::io::Error),

    /// Atomic rename of the finished temporary file failed
    #[error("Atomic file operation failed: could not rename {temp_path} to {final_path}")]
    AtomicRenameFailed {
        temp_path: PathBuf,
        final_path: PathBuf,
    },

    /// Another record in the same run already writes to this path
    #[error("Destination {path} already claimed by {claimed_by}")]
    DuplicateDestination { path: PathBuf, claimed_by: String },

    /// Pool or worker misconfiguration
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// Task was not admitted to the queue
    #[error("Task rejected: {reason}")]
    Rejected { reason: String },
}

/// Credential setup errors
#[derive(Error, Debug)]
pub enum AuthError {
    /// Entered access key id looks wrong
    #[error("Invalid access key id: {reason}")]
    InvalidAccessKey { reason: String },

    /// Required value was left empty
    #[error("{field} cannot be empty")]
    EmptyValue { field: String },

    /// File I/O error during credential storage
    #[error("Failed to read or save credentials")]
    CredentialStorage(#[from] std::io::Error),

    /// Nothing to verify
    #[error("Credentials not configured. Run 'auth setup' first")]
    MissingCredentials,

    /// Credential check against the store failed
    #[error("Credential verification failed: {0}")]
    Verification(String),
}

/// Top-level application error that can represent any error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Search error
    #[error(transparent)]
    Search(#[from] SearchError),

    /// Download error
    #[error(transparent)]
    Download(#[from] DownloadError),

    /// Authentication error
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// JSON (de)serialization of saved results
    #[error("Invalid results file")]
    Json(#[from] serde_json::Error),

    /// Generic I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Generic application error with context
    #[error("Application error: {message}")]
    Generic { message: String },
}

impl AppError {
    /// Create a generic application error with a message
    pub fn generic(message: impl Into<String>) -> Self {
        Self::Generic {
            message: message.into(),
        }
    }

    /// Whether the error ends the run (everything except per-task download errors)
    pub fn is_fatal(&self) -> bool {
        !matches!(self, AppError::Download(_))
    }

    /// Get error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            AppError::Config(_) => "config",
            AppError::Search(_) => "search",
            AppError::Download(_) => "download",
            AppError::Auth(_) => "authentication",
            AppError::Json(_) => "results",
            AppError::Io(_) => "io",
            AppError::Generic { .. } => "generic",
        }
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, AppError>;

/// Configuration result type alias
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Search result type alias
pub type SearchResult<T> = std::result::Result<T, SearchError>;

/// Download result type alias
pub type DownloadResult<T> = std::result::Result<T, DownloadError>;

/// Authentication result type alias
pub type AuthResult<T> = std::result::Result<T, AuthError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_error_truncates_body() {
        let body = "x".repeat(2_000);
        let err = SearchError::status(502, &body);

        assert_eq!(err.http_status(), Some(502));
        assert_eq!(err.body().unwrap().len(), ERROR_BODY_LIMIT);
    }

    #[test]
    fn test_truncate_body_respects_char_boundaries() {
        let body = "é".repeat(ERROR_BODY_LIMIT + 10);
        let truncated = truncate_body(&body);
        assert_eq!(truncated.chars().count(), ERROR_BODY_LIMIT);
    }

    #[test]
    fn test_error_categories() {
        let err = AppError::Config(ConfigError::MissingCredentials);
        assert_eq!(err.category(), "config");
        assert!(err.is_fatal());

        let err = AppError::Download(DownloadError::NotFound {
            key: "a/b.laz".to_string(),
        });
        assert_eq!(err.category(), "download");
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_malformed_error_keeps_excerpt() {
        let err = SearchError::malformed("missing items", "<html>oops</html>");
        assert_eq!(err.body(), Some("<html>oops</html>"));
        assert_eq!(err.http_status(), None);
    }
}
