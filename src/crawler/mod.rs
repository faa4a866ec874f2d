//! Crawler module for catalog traversal
//!
//! This module contains the core crawling logic, including:
//! - The crawl position and its total order over the crawl space
//! - Randomized politeness delays
//! - The run-scoped set of visited listings
//! - Overall crawl orchestration and resumption

mod dedup;
mod delay;
mod orchestrator;
mod position;
mod stats;

pub use dedup::VisitedSet;
pub use delay::DelayPolicy;
pub use orchestrator::{resolve_start, CrawlOutcome, Orchestrator};
pub use position::{CrawlBounds, CrawlPosition};
pub use stats::CrawlStats;
