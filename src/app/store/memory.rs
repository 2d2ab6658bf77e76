//! In-memory [`ObjectStore`] with scripted failures
//!
//! Used by the pool and pipeline tests, and handy for exercising the download
//! path without credentials.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

use super::ObjectStore;
use crate::app::models::ObjectLocation;
use crate::errors::{DownloadError, DownloadResult};

/// Bytes written to the destination before a scripted failure
const PARTIAL_WRITE: &[u8] = b"partial";

/// Object store backed by a map of keys to contents
#[derive(Debug, Default)]
pub struct MemoryStore {
    objects: HashMap<String, Vec<u8>>,
    failing: HashSet<String>,
    delay: Option<Duration>,
    fetches: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `contents` for `key`
    pub fn with_object(mut self, key: impl Into<String>, contents: impl Into<Vec<u8>>) -> Self {
        self.objects.insert(key.into(), contents.into());
        self
    }

    /// Fail every fetch of `key` after writing a few bytes
    pub fn with_failure(mut self, key: impl Into<String>) -> Self {
        self.failing.insert(key.into());
        self
    }

    /// Sleep this long inside every fetch
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of fetches attempted so far
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn fetch_to_path(&self, location: &ObjectLocation, dest: &Path) -> DownloadResult<u64> {
        self.fetches.fetch_add(1, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if self.failing.contains(&location.key) {
            let mut file = tokio::fs::File::create(dest).await?;
            file.write_all(PARTIAL_WRITE).await?;
            return Err(DownloadError::Store {
                key: location.key.clone(),
                message: "connection reset mid-transfer".to_string(),
            });
        }

        let contents = self
            .objects
            .get(&location.key)
            .ok_or_else(|| DownloadError::NotFound {
                key: location.key.clone(),
            })?;

        tokio::fs::write(dest, contents).await?;
        Ok(contents.len() as u64)
    }

    async fn probe(&self, _bucket: &str) -> DownloadResult<()> {
        Ok(())
    }
}
