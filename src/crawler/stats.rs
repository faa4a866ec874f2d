//! Counters accumulated over one crawl run

use std::time::Duration;

/// Crawl statistics for the current run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlStats {
    /// Catalog pages that produced a link list
    pub units_succeeded: u64,

    /// Catalog pages skipped after every attempt failed
    pub units_exhausted: u64,

    /// Worker attempts spent on catalog pages
    pub catalog_attempts: u64,

    /// Listing links found on catalog pages
    pub links_discovered: u64,

    /// Listing links skipped because they were already scheduled this run
    pub duplicates_skipped: u64,

    /// Listings that yielded a record
    pub listings_parsed: u64,

    /// Listings without a required field
    pub listings_discarded: u64,

    /// Listings whose fetch failed every attempt
    pub listing_failures: u64,

    /// Records accepted by the sink
    pub records_written: u64,

    /// Sink appends or replica syncs that failed
    pub sink_errors: u64,
}

impl CrawlStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Logs a one-line summary of the run
    pub fn log_summary(&self, elapsed: Duration) {
        tracing::info!(
            "Catalog pages: {} ok, {} exhausted ({} attempts) in {:?}",
            self.units_succeeded,
            self.units_exhausted,
            self.catalog_attempts,
            elapsed
        );
        tracing::info!(
            "Listings: {} discovered, {} duplicates, {} parsed, {} discarded, {} failed",
            self.links_discovered,
            self.duplicates_skipped,
            self.listings_parsed,
            self.listings_discarded,
            self.listing_failures
        );
        if self.sink_errors > 0 {
            tracing::warn!(
                "{} records written, {} sink errors: some data may be missing from the output",
                self.records_written,
                self.sink_errors
            );
        } else {
            tracing::info!("{} records written", self.records_written);
        }
    }
}
