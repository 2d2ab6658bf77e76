//! National Map catalog search
//!
//! Finds LIDAR point-cloud products inside a polygon and date range.
//!
//! # Examples
//!
//! ```rust,no_run
//! use lidar_fetcher::app::catalog::{CatalogConfig, PaginatedSearchClient, SearchQuery};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = PaginatedSearchClient::new(CatalogConfig::default())?;
//! let query = SearchQuery::parse(
//!     "-104.5 37.0,-104.0 37.0,-104.0 37.5,-104.5 37.5",
//!     "2016-01-01",
//!     "2016-12-31",
//! )?;
//!
//! let outcome = client.search(&query).await?;
//! println!("{} unique records", outcome.len());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod query;
pub mod search;

pub use config::CatalogConfig;
pub use query::{parse_date, Polygon, SearchQuery, Vertex};
pub use search::{dedup_by_source_id, PaginatedSearchClient, SearchOutcome};
