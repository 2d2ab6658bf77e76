//! Search query parameters: area polygon and date range

use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::constants::catalog::MIN_POLYGON_VERTICES;
use crate::errors::{SearchError, SearchResult};

/// A (longitude, latitude) vertex already in the catalog's coordinate system
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vertex {
    pub lon: f64,
    pub lat: f64,
}

/// Ordered polygon vertices
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polygon(Vec<Vertex>);

impl Polygon {
    /// Build from `(lon, lat)` pairs
    pub fn new(points: impl IntoIterator<Item = (f64, f64)>) -> Self {
        Self(
            points
                .into_iter()
                .map(|(lon, lat)| Vertex { lon, lat })
                .collect(),
        )
    }

    pub fn vertices(&self) -> &[Vertex] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Catalog wire format: `"lon lat,lon lat,..."`
    pub fn to_query_param(&self) -> String {
        self.0
            .iter()
            .map(|v| format!("{} {}", v.lon, v.lat))
            .collect::<Vec<_>>()
            .join(",")
    }

    fn validate(&self) -> SearchResult<()> {
        if self.0.len() < MIN_POLYGON_VERTICES {
            return Err(SearchError::InvalidQuery {
                reason: format!(
                    "polygon needs at least {} vertices, got {}",
                    MIN_POLYGON_VERTICES,
                    self.0.len()
                ),
            });
        }
        if let Some(v) = self
            .0
            .iter()
            .find(|v| !v.lon.is_finite() || !v.lat.is_finite())
        {
            return Err(SearchError::InvalidQuery {
                reason: format!("non-finite polygon vertex {} {}", v.lon, v.lat),
            });
        }
        Ok(())
    }
}

impl FromStr for Polygon {
    type Err = SearchError;

    /// Parse the catalog wire format, whitespace-tolerant
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: String| SearchError::InvalidQuery { reason };

        let mut vertices = Vec::new();
        for pair in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let mut parts = pair.split_whitespace();
            let (Some(lon), Some(lat), None) = (parts.next(), parts.next(), parts.next()) else {
                return Err(invalid(format!(
                    "expected 'lon lat' but found '{}'",
                    pair
                )));
            };
            let lon = lon
                .parse::<f64>()
                .map_err(|e| invalid(format!("bad longitude '{}': {}", lon, e)))?;
            let lat = lat
                .parse::<f64>()
                .map_err(|e| invalid(format!("bad latitude '{}': {}", lat, e)))?;
            vertices.push(Vertex { lon, lat });
        }

        Ok(Self(vertices))
    }
}

impl fmt::Display for Polygon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_query_param())
    }
}

/// Parse an inclusive date bound given as `YYYY-MM-DD` or an ISO datetime
pub fn parse_date(value: &str) -> SearchResult<NaiveDate> {
    let value = value.trim();
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Ok(date);
    }
    if let Ok(datetime) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S") {
        return Ok(datetime.date());
    }
    if let Ok(datetime) = chrono::DateTime::parse_from_rfc3339(value) {
        return Ok(datetime.date_naive());
    }

    Err(SearchError::InvalidQuery {
        reason: format!("'{}' is not an ISO date", value),
    })
}

/// One catalog search: where and when
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchQuery {
    pub polygon: Polygon,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl SearchQuery {
    /// Create a query from already-typed values
    pub fn new(polygon: Polygon, start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            polygon,
            start,
            end,
        }
    }

    /// Create a query from the textual forms used on the command line
    pub fn parse(polygon: &str, start: &str, end: &str) -> SearchResult<Self> {
        let query = Self::new(polygon.parse()?, parse_date(start)?, parse_date(end)?);
        query.validate()?;
        Ok(query)
    }

    /// Reject queries the catalog cannot answer meaningfully
    pub fn validate(&self) -> SearchResult<()> {
        self.polygon.validate()?;
        if self.start > self.end {
            return Err(SearchError::InvalidQuery {
                reason: format!("start date {} is after end date {}", self.start, self.end),
            });
        }
        Ok(())
    }

    /// Start bound in the catalog's date format
    pub fn start_param(&self) -> String {
        self.start.format("%Y-%m-%d").to_string()
    }

    /// End bound in the catalog's date format
    pub fn end_param(&self) -> String {
        self.end.format("%Y-%m-%d").to_string()
    }
}
