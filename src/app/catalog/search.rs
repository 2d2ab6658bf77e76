//! Paginated catalog search with cross-page deduplication
//!
//! The catalog collapses duplicates on its side as results accumulate, which
//! shifts the result window. The next offset is therefore always the number of
//! unique records collected so far, never `page * page_size`.

use std::collections::HashSet;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use super::config::CatalogConfig;
use super::query::SearchQuery;
use crate::app::models::CatalogRecord;
use crate::constants::catalog::OUTPUT_FORMAT;
use crate::errors::{SearchError, SearchResult};

/// Unique result set of one search
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchOutcome {
    /// Records, one per distinct `sourceId`, in catalog order
    pub items: Vec<CatalogRecord>,
    /// Total reported by the first page
    #[serde(skip)]
    pub reported_total: u64,
    /// Number of page requests issued
    #[serde(skip)]
    pub pages: usize,
    /// Records dropped because their `sourceId` had already been seen
    #[serde(skip)]
    pub duplicates: usize,
}

impl SearchOutcome {
    /// Wrap records loaded from elsewhere, dropping repeated ids
    pub fn from_items(items: Vec<CatalogRecord>) -> Self {
        let (items, duplicates) = dedup_by_source_id(items);
        Self {
            reported_total: items.len() as u64,
            items,
            pages: 0,
            duplicates,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Sum of reported sizes; records without a size count as zero
    pub fn total_size(&self) -> u64 {
        self.items.iter().filter_map(|r| r.size_bytes).sum()
    }
}

/// Catalog response page
#[derive(Debug, Deserialize)]
struct CatalogPage {
    #[serde(default)]
    total: u64,
    #[serde(default)]
    items: Vec<CatalogRecord>,
}

/// How one page changed the accumulated set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PageSummary {
    pub added: usize,
    pub duplicates: usize,
}

/// Accumulated unique records plus the ids already seen
#[derive(Debug, Default)]
pub(crate) struct ResultAccumulator {
    items: Vec<CatalogRecord>,
    seen: HashSet<String>,
    duplicates: usize,
}

impl ResultAccumulator {
    /// Append records whose `sourceId` has not been seen yet
    pub fn absorb(&mut self, page: Vec<CatalogRecord>) -> PageSummary {
        let mut summary = PageSummary {
            added: 0,
            duplicates: 0,
        };

        for record in page {
            if self.seen.insert(record.source_id.clone()) {
                self.items.push(record);
                summary.added += 1;
            } else {
                summary.duplicates += 1;
            }
        }

        self.duplicates += summary.duplicates;
        summary
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn duplicates(&self) -> usize {
        self.duplicates
    }

    pub fn into_items(self) -> Vec<CatalogRecord> {
        self.items
    }
}

/// Keep the first record for every `sourceId`, preserving order
///
/// Returns the unique records and the number removed.
pub fn dedup_by_source_id(items: Vec<CatalogRecord>) -> (Vec<CatalogRecord>, usize) {
    let before = items.len();
    let mut seen = HashSet::with_capacity(before);
    let unique: Vec<CatalogRecord> = items
        .into_iter()
        .filter(|record| seen.insert(record.source_id.clone()))
        .collect();
    let removed = before - unique.len();
    (unique, removed)
}

/// Client for the catalog products endpoint
#[derive(Debug, Clone)]
pub struct PaginatedSearchClient {
    client: Client,
    config: CatalogConfig,
}

impl PaginatedSearchClient {
    /// Creates a client with its own HTTP connection pool
    ///
    /// # Errors
    ///
    /// Returns `SearchError` if the configuration is invalid or the HTTP
    /// client cannot be built
    pub fn new(config: CatalogConfig) -> SearchResult<Self> {
        config.validate()?;
        let client = config.build_http_client()?;
        Ok(Self { client, config })
    }

    /// Creates a client around an existing HTTP client
    pub fn with_client(client: Client, config: CatalogConfig) -> Self {
        Self { client, config }
    }

    pub fn config(&self) -> &CatalogConfig {
        &self.config
    }

    /// Retrieve every record matching the query
    ///
    /// Pages are requested strictly in sequence, with the configured page
    /// delay between requests. Pagination stops on the first of:
    ///
    /// - a page that comes back empty;
    /// - the unique count reaching the total reported by the first page;
    /// - a non-empty page that adds no new records.
    ///
    /// The last condition exists because the next offset is the unique count
    /// so far. A page of known records leaves it unchanged, and without this
    /// stop the same offset would be requested forever. Whatever was
    /// collected up to that point is returned.
    ///
    /// # Errors
    ///
    /// Any transport failure, non-success status or undecodable page aborts
    /// the search; records collected so far are discarded.
    pub async fn search(&self, query: &SearchQuery) -> SearchResult<SearchOutcome> {
        query.validate()?;

        let polygon = query.polygon.to_query_param();
        info!(
            "Searching catalog from {} to {} over {} vertices",
            query.start_param(),
            query.end_param(),
            query.polygon.len()
        );

        let mut accumulator = ResultAccumulator::default();
        let mut reported_total: Option<u64> = None;
        let mut pages = 0usize;

        loop {
            let offset = accumulator.len();
            if pages > 0 {
                tokio::time::sleep(self.config.page_delay).await;
            }

            let page = match self.fetch_page(query, &polygon, offset).await {
                Ok(page) => page,
                Err(e) => {
                    error!(
                        "Catalog request at offset {} failed: {} (status: {:?}, body: {:?})",
                        offset,
                        e,
                        e.http_status(),
                        e.body()
                    );
                    return Err(e);
                }
            };
            pages += 1;

            let total = *reported_total.get_or_insert_with(|| {
                info!("Catalog reports {} matching records", page.total);
                page.total
            });

            if page.items.is_empty() {
                debug!("Page {} at offset {} is empty, stopping", pages, offset);
                break;
            }

            let page_len = page.items.len();
            let summary = accumulator.absorb(page.items);
            if summary.duplicates > 0 {
                warn!(
                    "Page {} contained {} duplicate records, kept {} new",
                    pages, summary.duplicates, summary.added
                );
            }
            debug!(
                "Page {} at offset {}: {} records, {} collected of {}",
                pages,
                offset,
                page_len,
                accumulator.len(),
                total
            );

            if accumulator.len() as u64 >= total {
                debug!("Collected all {} reported records", total);
                break;
            }
            if summary.added == 0 {
                warn!(
                    "Page {} added no new records; stopping with {} of {}",
                    pages,
                    accumulator.len(),
                    total
                );
                break;
            }
        }

        let page_duplicates = accumulator.duplicates();
        let (items, removed) = dedup_by_source_id(accumulator.into_items());
        if removed > 0 {
            warn!("Removed {} duplicate records in final pass", removed);
        }

        info!(
            "Search finished: {} unique records in {} pages",
            items.len(),
            pages
        );

        Ok(SearchOutcome {
            items,
            reported_total: reported_total.unwrap_or(0),
            pages,
            duplicates: page_duplicates + removed,
        })
    }

    /// Request parameters for one page
    fn page_params(
        &self,
        query: &SearchQuery,
        polygon: &str,
        offset: usize,
    ) -> Vec<(&'static str, String)> {
        vec![
            ("polygon", polygon.to_string()),
            ("datasets", self.config.datasets.clone()),
            ("prodFormats", self.config.prod_formats.clone()),
            ("outputFormat", OUTPUT_FORMAT.to_string()),
            ("dateType", self.config.date_type.clone()),
            ("start", query.start_param()),
            ("end", query.end_param()),
            ("maxResults", self.config.page_size.to_string()),
            ("offset", offset.to_string()),
        ]
    }

    async fn fetch_page(
        &self,
        query: &SearchQuery,
        polygon: &str,
        offset: usize,
    ) -> SearchResult<CatalogPage> {
        let params = self.page_params(query, polygon, offset);
        debug!("Requesting catalog page at offset {}", offset);

        let response = self
            .client
            .get(&self.config.base_url)
            .query(&params)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(SearchError::status(status.as_u16(), &body));
        }

        serde_json::from_str(&body).map_err(|e| SearchError::malformed(e.to_string(), &body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str) -> CatalogRecord {
        CatalogRecord::new(id, format!("s3://usgs-lidar/Projects/P/{}.laz", id))
    }

    fn records(ids: &[&str]) -> Vec<CatalogRecord> {
        ids.iter().map(|id| record(id)).collect()
    }

    #[test]
    fn test_accumulator_skips_seen_ids() {
        let mut acc = ResultAccumulator::default();

        let first = acc.absorb(records(&["a", "b", "c"]));
        assert_eq!(first, PageSummary { added: 3, duplicates: 0 });

        let second = acc.absorb(records(&["b", "c", "d", "e"]));
        assert_eq!(second, PageSummary { added: 2, duplicates: 2 });

        assert_eq!(acc.len(), 5);
        assert_eq!(acc.duplicates(), 2);
        let ids: Vec<_> = acc.into_items().into_iter().map(|r| r.source_id).collect();
        assert_eq!(ids, vec!["a", "b", "c", "d", "e"]);
    }

    /// Duplicates inside a single page are caught too
    #[test]
    fn test_accumulator_in_page_duplicates() {
        let mut acc = ResultAccumulator::default();
        let summary = acc.absorb(records(&["a", "a", "b"]));
        assert_eq!(summary, PageSummary { added: 2, duplicates: 1 });
    }

    #[test]
    fn test_dedup_by_source_id_keeps_first() {
        let mut items = records(&["x", "y", "x", "z", "y"]);
        items[2].title = Some("second x".to_string());

        let (unique, removed) = dedup_by_source_id(items);
        assert_eq!(removed, 2);
        assert_eq!(unique.len(), 3);
        assert_eq!(unique[0].source_id, "x");
        assert_eq!(unique[0].title, None);
    }

    #[test]
    fn test_outcome_serializes_items_only() {
        let outcome = SearchOutcome {
            items: records(&["a"]),
            reported_total: 10,
            pages: 2,
            duplicates: 1,
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert!(json.get("items").is_some());
        assert!(json.get("pages").is_none());

        let loaded: SearchOutcome = serde_json::from_value(json).unwrap();
        assert_eq!(loaded.items, outcome.items);
    }

    #[test]
    fn test_outcome_from_items() {
        let outcome = SearchOutcome::from_items(vec![
            record("a").with_size(10),
            record("a").with_size(10),
            record("b"),
        ]);
        assert_eq!(outcome.len(), 2);
        assert_eq!(outcome.duplicates, 1);
        assert_eq!(outcome.total_size(), 10);
    }

    #[test]
    fn test_page_params() {
        let client = PaginatedSearchClient::new(CatalogConfig::default()).unwrap();
        let query = SearchQuery::parse("0 0,1 0,1 1", "2016-01-01", "2016-12-31").unwrap();
        let params = client.page_params(&query, &query.polygon.to_query_param(), 47);

        let lookup = |name: &str| {
            params
                .iter()
                .find(|(k, _)| *k == name)
                .map(|(_, v)| v.as_str())
        };
        assert_eq!(lookup("polygon"), Some("0 0,1 0,1 1"));
        assert_eq!(lookup("maxResults"), Some("25"));
        assert_eq!(lookup("offset"), Some("47"));
        assert_eq!(lookup("outputFormat"), Some("JSON"));
        assert_eq!(lookup("prodFormats"), Some("LAZ"));
        assert_eq!(lookup("dateType"), Some("dateCreated"));
    }
}
