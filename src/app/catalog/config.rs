//! Catalog client configuration and HTTP client construction

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::constants::{catalog, http};
use crate::errors::{SearchError, SearchResult};

/// Settings for the catalog search client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Products endpoint
    pub base_url: String,
    /// Dataset filter
    pub datasets: String,
    /// Product format filter
    pub prod_formats: String,
    /// Date field the range applies to
    pub date_type: String,
    /// Records requested per page
    pub page_size: usize,
    /// Pause between page requests
    #[serde(with = "humantime_serde")]
    pub page_delay: Duration,
    /// Whole-request timeout
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
    /// Connection establishment timeout
    #[serde(with = "humantime_serde")]
    pub connect_timeout: Duration,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            base_url: catalog::BASE_URL.to_string(),
            datasets: catalog::DATASETS.to_string(),
            prod_formats: catalog::PROD_FORMATS.to_string(),
            date_type: catalog::DATE_TYPE.to_string(),
            page_size: catalog::PAGE_SIZE,
            page_delay: catalog::PAGE_DELAY,
            request_timeout: http::DEFAULT_TIMEOUT,
            connect_timeout: http::CONNECT_TIMEOUT,
        }
    }
}

impl CatalogConfig {
    /// Configuration pointing at another endpoint, e.g. a local mock
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    /// Validate values that would make pagination impossible
    pub fn validate(&self) -> SearchResult<()> {
        if self.page_size == 0 {
            return Err(SearchError::InvalidQuery {
                reason: "page size must be greater than zero".to_string(),
            });
        }

        url::Url::parse(&self.base_url).map_err(|e| SearchError::InvalidQuery {
            reason: format!("invalid catalog URL '{}': {}", self.base_url, e),
        })?;

        Ok(())
    }

    /// Builds the HTTP client used for catalog requests
    pub fn build_http_client(&self) -> SearchResult<Client> {
        Client::builder()
            .timeout(self.request_timeout)
            .connect_timeout(self.connect_timeout)
            .user_agent(http::USER_AGENT)
            .pool_idle_timeout(http::POOL_IDLE_TIMEOUT)
            .build()
            .map_err(SearchError::Transport)
    }
}
