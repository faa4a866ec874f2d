//! Integration tests for Catalog-Harvester
//!
//! These tests run the orchestrator against wiremock catalog servers with
//! the real renderer, parser, sink and checkpoint store.

mod crawl_tests;
mod resume_tests;
mod support;
mod worker_tests;
