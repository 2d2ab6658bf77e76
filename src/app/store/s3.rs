//! Requester-pays S3 implementation of [`ObjectStore`]

use std::path::Path;

use async_trait::async_trait;
use aws_sdk_s3::config::retry::RetryConfig;
use aws_sdk_s3::config::timeout::TimeoutConfig;
use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::types::RequestPayer;
use aws_sdk_s3::Client;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use super::{ObjectStore, StoreConfig, StoreCredentials};
use crate::app::models::ObjectLocation;
use crate::errors::{DownloadError, DownloadResult};

/// Name recorded on the static credentials provider
const CREDENTIALS_PROVIDER: &str = "lidar-fetcher-environment";

/// Prefix listed when probing the LIDAR bucket
const PROBE_PREFIX: &str = "Projects/";

/// S3 client configured with explicit credentials, bounded retries and timeouts
///
/// Every request is sent with `RequestPayer::Requester`: the caller, not the
/// bucket owner, pays for the transfer.
#[derive(Debug, Clone)]
pub struct S3Store {
    client: Client,
}

impl S3Store {
    /// Build a client from resolved credentials
    pub fn new(credentials: &StoreCredentials, config: &StoreConfig) -> Self {
        let region = credentials.region_or(config).to_string();
        debug!(
            "Creating S3 client for region {} ({} attempts)",
            region, config.max_attempts
        );

        let sdk_credentials = Credentials::new(
            credentials.access_key_id.clone(),
            credentials.secret_access_key.clone(),
            None,
            None,
            CREDENTIALS_PROVIDER,
        );

        let sdk_config = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(region))
            .credentials_provider(sdk_credentials)
            .retry_config(RetryConfig::standard().with_max_attempts(config.max_attempts))
            .timeout_config(
                TimeoutConfig::builder()
                    .connect_timeout(config.connect_timeout)
                    .read_timeout(config.read_timeout)
                    .build(),
            )
            .build();

        Self {
            client: Client::from_conf(sdk_config),
        }
    }

    /// Wrap an already configured SDK client
    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn fetch_to_path(&self, location: &ObjectLocation, dest: &Path) -> DownloadResult<u64> {
        let output = self
            .client
            .get_object()
            .bucket(&location.bucket)
            .key(&location.key)
            .request_payer(RequestPayer::Requester)
            .send()
            .await
            .map_err(|e| {
                if e.as_service_error().is_some_and(|se| se.is_no_such_key()) {
                    DownloadError::NotFound {
                        key: location.key.clone(),
                    }
                } else {
                    DownloadError::Store {
                        key: location.key.clone(),
                        message: DisplayErrorContext(&e).to_string(),
                    }
                }
            })?;

        let mut body = output.body;
        let mut file = File::create(dest).await?;
        let mut written = 0u64;

        while let Some(chunk) = body.try_next().await.map_err(|e| DownloadError::Store {
            key: location.key.clone(),
            message: DisplayErrorContext(&e).to_string(),
        })? {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }

        file.flush().await?;
        file.sync_all().await?;

        debug!("Fetched {} ({} bytes)", location, written);
        Ok(written)
    }

    async fn probe(&self, bucket: &str) -> DownloadResult<()> {
        self.client
            .list_objects_v2()
            .bucket(bucket)
            .prefix(PROBE_PREFIX)
            .max_keys(1)
            .request_payer(RequestPayer::Requester)
            .send()
            .await
            .map_err(|e| DownloadError::Store {
                key: format!("{}/{}", bucket, PROBE_PREFIX),
                message: DisplayErrorContext(&e).to_string(),
            })?;

        debug!("Probe of bucket {} succeeded", bucket);
        Ok(())
    }
}
