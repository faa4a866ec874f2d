//! Crawl orchestrator - drives the region × filter × page iteration
//!
//! This module contains the main crawl loop, including:
//! - Resuming from the stored checkpoint
//! - Fetching every catalog page through an isolated worker with retries
//! - Scheduling each newly discovered listing for extraction
//! - Persisting the next position after every catalog page
//! - Handling interrupts and the terminal checkpoint reset

use crate::checkpoint::{Checkpoint, CheckpointStore};
use crate::config::{Config, CrawlerConfig};
use crate::crawler::dedup::VisitedSet;
use crate::crawler::delay::DelayPolicy;
use crate::crawler::position::{CrawlBounds, CrawlPosition};
use crate::crawler::stats::CrawlStats;
use crate::sink::RecordSink;
use crate::worker::{execute_with_retry, RetryPolicy, WorkerExecutor, WorkerPayload, WorkerTask};
use crate::HarvestError;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

/// How a crawl run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrawlOutcome {
    /// Every position was visited and the checkpoint was reset
    Completed,
    /// The run was interrupted; the position was saved for the next run
    Interrupted(CrawlPosition),
}

/// Reads the stored checkpoint and returns the position a crawl resumes at
pub fn resolve_start(
    store: &dyn CheckpointStore,
    bounds: &CrawlBounds,
    config_hash: Option<&str>,
) -> Result<CrawlPosition, HarvestError> {
    let Some(checkpoint) = store.load()? else {
        tracing::info!("No checkpoint found, starting new crawl");
        return Ok(CrawlPosition::initial());
    };

    if let (Some(stored), Some(current)) = (checkpoint.config_hash.as_deref(), config_hash) {
        if stored != current {
            tracing::warn!(
                "Checkpoint was written under a different configuration ({} vs {})",
                stored,
                current
            );
        }
    }

    if !checkpoint.position.is_within(bounds) {
        tracing::warn!(
            "Checkpoint position {} is outside the configured crawl space, starting over",
            checkpoint.position
        );
        return Ok(CrawlPosition::initial());
    }

    tracing::info!("Resuming from {}", checkpoint.position);
    Ok(checkpoint.position)
}

/// Main crawl orchestrator
pub struct Orchestrator {
    crawler: CrawlerConfig,
    bounds: CrawlBounds,
    executor: Arc<dyn WorkerExecutor>,
    store: Box<dyn CheckpointStore>,
    sink: Box<dyn RecordSink>,
    catalog_retry: RetryPolicy,
    listing_retry: RetryPolicy,
    page_delay: DelayPolicy,
    config_hash: Option<String>,
    fresh: bool,
    visited: VisitedSet,
    stats: CrawlStats,
}

impl Orchestrator {
    /// Creates an orchestrator for the configured crawl space
    pub fn new(
        config: &Config,
        executor: Arc<dyn WorkerExecutor>,
        store: Box<dyn CheckpointStore>,
        sink: Box<dyn RecordSink>,
    ) -> Self {
        let crawler = config.crawler.clone();
        let delay = DelayPolicy::from_millis(crawler.min_delay_ms, crawler.max_delay_ms);

        Self {
            bounds: CrawlBounds::from_config(&crawler),
            catalog_retry: RetryPolicy::new(crawler.max_attempts, delay),
            listing_retry: RetryPolicy::new(crawler.listing_attempts, delay),
            page_delay: delay,
            crawler,
            executor,
            store,
            sink,
            config_hash: None,
            fresh: false,
            visited: VisitedSet::new(),
            stats: CrawlStats::new(),
        }
    }

    /// Records the configuration hash in every checkpoint written
    pub fn with_config_hash(mut self, hash: impl Into<String>) -> Self {
        self.config_hash = Some(hash.into());
        self
    }

    /// Ignores any stored checkpoint and starts at the initial position
    pub fn fresh(mut self, fresh: bool) -> Self {
        self.fresh = fresh;
        self
    }

    /// Replaces the wait between catalog pages and between attempts
    pub fn with_delay(mut self, delay: DelayPolicy) -> Self {
        self.page_delay = delay;
        self.catalog_retry.delay = delay;
        self.listing_retry.delay = delay;
        self
    }

    pub fn bounds(&self) -> CrawlBounds {
        self.bounds
    }

    pub fn stats(&self) -> &CrawlStats {
        &self.stats
    }

    /// Determines where this run starts
    ///
    /// A missing, unreadable or out-of-bounds checkpoint starts the crawl at
    /// the initial position.
    pub fn resume_position(&self) -> Result<CrawlPosition, HarvestError> {
        if self.fresh {
            tracing::info!("Fresh crawl requested, ignoring stored checkpoint");
            return Ok(CrawlPosition::initial());
        }
        resolve_start(
            self.store.as_ref(),
            &self.bounds,
            self.config_hash.as_deref(),
        )
    }

    /// Runs the crawl to completion without an interrupt signal
    pub async fn run(&mut self) -> Result<CrawlOutcome, HarvestError> {
        self.run_until(std::future::pending::<()>()).await
    }

    /// Runs the crawl until it completes or `shutdown` resolves
    ///
    /// Only checkpoint persistence failures are returned as errors; failed
    /// pages, listings and sink writes are logged and skipped.
    pub async fn run_until<F>(&mut self, shutdown: F) -> Result<CrawlOutcome, HarvestError>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        let start_time = Instant::now();
        let mut position = self.resume_position()?;
        tracing::info!(
            "Starting crawl at {} of {} regions x {} filters x {} pages",
            position,
            self.bounds.regions,
            self.bounds.max_filter,
            self.bounds.max_page
        );

        loop {
            let processed = tokio::select! {
                biased;
                _ = &mut shutdown => false,
                _ = self.process_position(position) => true,
            };
            if !processed {
                return self.interrupt(position, start_time);
            }

            let Some(next) = position.next(&self.bounds) else {
                self.save(CrawlPosition::initial())?;
                tracing::info!("All regions and filters crawled, checkpoint reset");
                self.stats.log_summary(start_time.elapsed());
                return Ok(CrawlOutcome::Completed);
            };

            self.save(next)?;
            position = next;

            let waited = tokio::select! {
                biased;
                _ = &mut shutdown => false,
                _ = self.page_delay.wait() => true,
            };
            if !waited {
                return self.interrupt(position, start_time);
            }
        }
    }

    fn interrupt(
        &mut self,
        position: CrawlPosition,
        start_time: Instant,
    ) -> Result<CrawlOutcome, HarvestError> {
        tracing::warn!("Interrupted, saving position {}", position);
        self.save(position)?;
        self.stats.log_summary(start_time.elapsed());
        Ok(CrawlOutcome::Interrupted(position))
    }

    fn save(&self, position: CrawlPosition) -> Result<(), HarvestError> {
        self.store
            .save(&Checkpoint::new(position, self.config_hash.clone()))?;
        Ok(())
    }

    /// Fetches one catalog page and extracts every new listing on it
    async fn process_position(&mut self, position: CrawlPosition) {
        let Some(url) = self.crawler.catalog_url(
            position.region_index,
            position.filter_value,
            position.page,
        ) else {
            tracing::error!("No region configured for {}", position);
            self.stats.units_exhausted += 1;
            return;
        };

        tracing::info!(
            "Scraping {} page {} of filter {} {}",
            self.crawler.regions[position.region_index],
            position.page,
            position.filter_value,
            url
        );

        let outcome = execute_with_retry(
            self.executor.as_ref(),
            &WorkerTask::catalog(&url),
            &self.catalog_retry,
        )
        .await;
        self.stats.catalog_attempts += u64::from(outcome.attempts);

        let links = match outcome.payload {
            Some(WorkerPayload::Links(links)) => links,
            _ => {
                tracing::error!(
                    "Max retries reached for catalog page {}, moving on",
                    url
                );
                self.stats.units_exhausted += 1;
                return;
            }
        };

        self.stats.units_succeeded += 1;
        self.stats.links_discovered += links.len() as u64;
        if links.is_empty() {
            tracing::info!("No listings on {}", url);
        }

        for link in links {
            if !self.visited.insert(&link) {
                tracing::debug!("Already visited: {}", link);
                self.stats.duplicates_skipped += 1;
                continue;
            }
            self.extract_listing(&link).await;
        }

        if let Err(e) = self.sink.sync().await {
            tracing::error!("Failed to sync records: {}", e);
            self.stats.sink_errors += 1;
        }
    }

    async fn extract_listing(&mut self, link: &str) {
        tracing::debug!("Navigating to listing {}", link);
        let outcome = execute_with_retry(
            self.executor.as_ref(),
            &WorkerTask::listing(link),
            &self.listing_retry,
        )
        .await;

        match outcome.payload {
            Some(WorkerPayload::Listing(Some(record))) => {
                self.stats.listings_parsed += 1;
                match self.sink.append(std::slice::from_ref(&record)).await {
                    Ok(written) => self.stats.records_written += written as u64,
                    Err(e) => {
                        tracing::error!("Failed to store record from {}: {}", link, e);
                        self.stats.sink_errors += 1;
                    }
                }
            }
            Some(_) => {
                tracing::info!("No data scraped from {}", link);
                self.stats.listings_discarded += 1;
            }
            None => {
                tracing::error!("Giving up on listing {}", link);
                self.stats.listing_failures += 1;
            }
        }
    }
}
