//! Crawl position within the region × filter × page space

use crate::config::CrawlerConfig;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Bounds of the crawl space
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrawlBounds {
    /// Number of configured regions
    pub regions: usize,

    /// Highest filter value (inclusive)
    pub max_filter: u32,

    /// Highest page number (inclusive)
    pub max_page: u32,
}

impl CrawlBounds {
    /// Derives the bounds from the crawler configuration
    pub fn from_config(config: &CrawlerConfig) -> Self {
        Self {
            regions: config.regions.len(),
            max_filter: config.max_filter,
            max_page: config.max_page,
        }
    }

    /// Total number of catalog pages in the crawl space
    pub fn total_units(&self) -> u64 {
        self.regions as u64 * u64::from(self.max_filter) * u64::from(self.max_page)
    }
}

/// Position of the next catalog page to visit
///
/// Ordering is lexicographic over (region, filter, page), which is exactly
/// the visiting order of the crawl.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawlPosition {
    pub region_index: usize,
    pub filter_value: u32,
    pub page: u32,
}

impl CrawlPosition {
    /// The first position of every crawl: `{0, 1, 1}`
    pub const fn initial() -> Self {
        Self {
            region_index: 0,
            filter_value: 1,
            page: 1,
        }
    }

    pub const fn new(region_index: usize, filter_value: u32, page: u32) -> Self {
        Self {
            region_index,
            filter_value,
            page,
        }
    }

    /// Returns true if the position lies inside the crawl space
    pub fn is_within(&self, bounds: &CrawlBounds) -> bool {
        self.region_index < bounds.regions
            && (1..=bounds.max_filter).contains(&self.filter_value)
            && (1..=bounds.max_page).contains(&self.page)
    }

    /// Returns the position visited after this one, or `None` when this is the last
    pub fn next(&self, bounds: &CrawlBounds) -> Option<Self> {
        if self.page < bounds.max_page {
            return Some(Self::new(self.region_index, self.filter_value, self.page + 1));
        }
        if self.filter_value < bounds.max_filter {
            return Some(Self::new(self.region_index, self.filter_value + 1, 1));
        }
        if self.region_index + 1 < bounds.regions {
            return Some(Self::new(self.region_index + 1, 1, 1));
        }
        None
    }

    /// Zero-based index of this position in visiting order
    pub fn ordinal(&self, bounds: &CrawlBounds) -> u64 {
        let per_region = u64::from(bounds.max_filter) * u64::from(bounds.max_page);
        self.region_index as u64 * per_region
            + u64::from(self.filter_value.saturating_sub(1)) * u64::from(bounds.max_page)
            + u64::from(self.page.saturating_sub(1))
    }
}

impl Default for CrawlPosition {
    fn default() -> Self {
        Self::initial()
    }
}

impl fmt::Display for CrawlPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "(region {}, filter {}, page {})",
            self.region_index, self.filter_value, self.page
        )
    }
}
