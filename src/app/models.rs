//! Data models for catalog records and download tasks
//!
//! A [`CatalogRecord`] is one item returned by the National Map catalog. It is
//! never modified after the search; the download phase turns it into a
//! [`DownloadTask`] whose destination path is a pure function of the output
//! root, the derived project name and the object key.
//!
//! # Examples
//!
//! ```rust
//! use std::path::Path;
//! use lidar_fetcher::app::models::{CatalogRecord, DownloadTask};
//!
//! let record = CatalogRecord::new(
//!     "abc123",
//!     "s3://usgs-lidar/Projects/CO_LasAnimas_2016/USGS_LPC_CO_LasAnimas_2016_13S_001.laz",
//! );
//! let task = DownloadTask::new(record, "CO_LasAnimas", Path::new("LIDAR")).unwrap();
//!
//! assert_eq!(task.location.bucket, "usgs-lidar");
//! assert!(task.local_path.ends_with("CO_LasAnimas/USGS_LPC_CO_LasAnimas_2016_13S_001.laz"));
//! ```

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::constants::store::SCHEME;
use crate::errors::{DownloadError, DownloadResult};

/// One dataset item discovered through the catalog
///
/// Only `sourceId` and `downloadURL` are interpreted. Every other field the
/// catalog returns is carried through untouched so that saved result files
/// keep the full record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogRecord {
    /// Catalog-assigned identifier, the sole deduplication key
    #[serde(rename = "sourceId")]
    pub source_id: String,

    /// Store locator of the backing object (`s3://bucket/key`)
    #[serde(rename = "downloadURL")]
    pub download_url: String,

    /// Raw project label as reported by the catalog
    #[serde(
        rename = "projectName",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub project_name: Option<String>,

    /// Human-readable title
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Object size in bytes when the catalog reports it
    #[serde(
        rename = "sizeInBytes",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub size_bytes: Option<u64>,

    /// Product format (e.g. "LAZ")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,

    /// Pass-through metadata not interpreted by the fetcher
    #[serde(flatten)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl CatalogRecord {
    /// Create a record with only the interpreted fields set
    pub fn new(source_id: impl Into<String>, download_url: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            download_url: download_url.into(),
            project_name: None,
            title: None,
            size_bytes: None,
            format: None,
            metadata: serde_json::Map::new(),
        }
    }

    /// Set the reported size
    pub fn with_size(mut self, size_bytes: u64) -> Self {
        self.size_bytes = Some(size_bytes);
        self
    }

    /// Final path segment of the download URL
    pub fn file_name(&self) -> &str {
        self.download_url
            .rsplit('/')
            .next()
            .unwrap_or(self.download_url.as_str())
    }
}

/// Bucket and key of an object in the remote store
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectLocation {
    pub bucket: String,
    pub key: String,
}

impl ObjectLocation {
    /// Parse an `s3://bucket/key` locator
    ///
    /// The first `/` after the scheme separates bucket from key; the key keeps
    /// every following segment.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::InvalidLocator`] when the scheme is not `s3`
    /// or the bucket or key is empty.
    pub fn parse(url: &str) -> DownloadResult<Self> {
        let invalid = |reason: &str| DownloadError::InvalidLocator {
            url: url.to_string(),
            reason: reason.to_string(),
        };

        let (scheme, rest) = url
            .split_once("://")
            .ok_or_else(|| invalid("missing scheme"))?;
        if scheme != SCHEME {
            return Err(invalid(&format!("unsupported scheme '{}'", scheme)));
        }

        let (bucket, key) = rest
            .split_once('/')
            .ok_or_else(|| invalid("missing object key"))?;
        if bucket.is_empty() {
            return Err(invalid("empty bucket"));
        }
        if key.is_empty() {
            return Err(invalid("empty object key"));
        }

        Ok(Self {
            bucket: bucket.to_string(),
            key: key.to_string(),
        })
    }

    /// Final path segment of the key
    pub fn file_name(&self) -> &str {
        self.key.rsplit('/').next().unwrap_or(self.key.as_str())
    }
}

impl fmt::Display for ObjectLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}/{}", SCHEME, self.bucket, self.key)
    }
}

/// One pending transfer
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadTask {
    /// Where the object lives
    pub location: ObjectLocation,
    /// Project bucket the record was grouped into
    pub project: String,
    /// Deterministic destination path
    pub local_path: PathBuf,
    /// Record the task was created from, kept for reporting
    pub record: CatalogRecord,
}

impl DownloadTask {
    /// Admit a record to the download phase
    ///
    /// # Errors
    ///
    /// Fails when the record's download URL is not a valid store locator.
    pub fn new(record: CatalogRecord, project: &str, output_root: &Path) -> DownloadResult<Self> {
        let location = ObjectLocation::parse(&record.download_url)?;
        let local_path = local_path_for(output_root, project, &location.key);
        Ok(Self {
            location,
            project: project.to_string(),
            local_path,
            record,
        })
    }

    /// File name of the destination
    pub fn file_name(&self) -> &str {
        self.location.file_name()
    }
}

/// Destination path: `output_root/project/<last key segment>`
pub fn local_path_for(output_root: &Path, project: &str, object_key: &str) -> PathBuf {
    let file_name = object_key.rsplit('/').next().unwrap_or(object_key);
    output_root.join(project).join(file_name)
}

/// Format a byte count for display
///
/// Bytes are shown as integers, KB and MB with one decimal and GB with two.
pub fn format_file_size(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    const GB: f64 = MB * 1024.0;

    let size = bytes as f64;
    if size < KB {
        format!("{} B", bytes)
    } else if size < MB {
        format!("{:.1} KB", size / KB)
    } else if size < GB {
        format!("{:.1} MB", size / MB)
    } else {
        format!("{:.2} GB", size / GB)
    }
}
