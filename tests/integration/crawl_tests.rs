//! End-to-end crawls over a mock catalog

use crate::support::*;
use catalog_harvester::checkpoint::{CheckpointStore, FileCheckpointStore};
use catalog_harvester::crawler::{CrawlOutcome, CrawlPosition};
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_crawl_stores_records_and_resets_checkpoint() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_catalog(&server, 1, catalog_page(&["/item/1", "/item/2"])).await;
    mount_catalog(&server, 2, catalog_page(&[])).await;
    mount_listing(&server, "/item/1", listing_page("Corolla 2015", Some("+923001111111"))).await;
    mount_listing(&server, "/item/2", listing_page("Civic 2018", Some("+923002222222"))).await;

    let config = task_config(&server, dir.path());
    let store = RecordingStore::new(&config.output.checkpoint_path);
    let mut orchestrator = orchestrator(&config, &store);

    let outcome = orchestrator.run().await.unwrap();
    assert_eq!(outcome, CrawlOutcome::Completed);

    let rows = csv_rows(&dir.path().join("data/data.csv"));
    assert_eq!(rows.len(), 2);
    assert_eq!(&rows[0][0], format!("{}/item/1", server.uri()));
    assert_eq!(&rows[0][1], "Corolla 2015");
    assert_eq!(&rows[0][2], "+923001111111");
    assert_eq!(&rows[1][2], "+923002222222");

    assert_eq!(
        store.positions(),
        vec![CrawlPosition::new(0, 2, 1), CrawlPosition::initial()]
    );
    let on_disk = FileCheckpointStore::new(&config.output.checkpoint_path)
        .load()
        .unwrap()
        .unwrap();
    assert_eq!(on_disk.position, CrawlPosition::initial());
    assert_eq!(orchestrator.stats().records_written, 2);
}

#[tokio::test]
async fn test_blocked_catalog_page_is_skipped_after_max_attempts() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/punjab/cars"))
        .and(query_param("filter", "1"))
        .respond_with(ResponseTemplate::new(503))
        .expect(5)
        .mount(&server)
        .await;
    mount_catalog(&server, 2, catalog_page(&["/item/9"])).await;
    mount_listing(&server, "/item/9", listing_page("Alto", Some("+923009999999"))).await;

    let config = task_config(&server, dir.path());
    let store = RecordingStore::new(&config.output.checkpoint_path);
    let mut orchestrator = orchestrator(&config, &store);

    let outcome = orchestrator.run().await.unwrap();

    assert_eq!(outcome, CrawlOutcome::Completed);
    assert_eq!(store.positions()[0], CrawlPosition::new(0, 2, 1));
    assert_eq!(orchestrator.stats().units_exhausted, 1);
    assert_eq!(orchestrator.stats().catalog_attempts, 6);
    assert_eq!(csv_rows(&dir.path().join("data/data.csv")).len(), 1);
}

#[tokio::test]
async fn test_listing_without_phone_is_discarded() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_catalog(&server, 1, catalog_page(&["/item/1"])).await;
    mount_catalog(&server, 2, catalog_page(&[])).await;
    Mock::given(method("GET"))
        .and(path("/item/1"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(listing_page("Sold out", None)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let config = task_config(&server, dir.path());
    let store = RecordingStore::new(&config.output.checkpoint_path);
    let mut orchestrator = orchestrator(&config, &store);

    let outcome = orchestrator.run().await.unwrap();

    assert_eq!(outcome, CrawlOutcome::Completed);
    let content = std::fs::read_to_string(dir.path().join("data/data.csv")).unwrap();
    assert!(content.is_empty());
    assert_eq!(orchestrator.stats().listings_discarded, 1);
    assert_eq!(orchestrator.stats().listing_failures, 0);
}

#[tokio::test]
async fn test_same_listing_on_two_pages_is_extracted_once() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_catalog(&server, 1, catalog_page(&["/item/1"])).await;
    mount_catalog(&server, 2, catalog_page(&["/item/1?utm_source=feed", "/item/2"])).await;
    Mock::given(method("GET"))
        .and(path("/item/1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(listing_page("Corolla", Some("+923001111111"))),
        )
        .expect(1)
        .mount(&server)
        .await;
    mount_listing(&server, "/item/2", listing_page("Civic", Some("+923002222222"))).await;

    let config = task_config(&server, dir.path());
    let store = RecordingStore::new(&config.output.checkpoint_path);
    let mut orchestrator = orchestrator(&config, &store);

    orchestrator.run().await.unwrap();

    assert_eq!(csv_rows(&dir.path().join("data/data.csv")).len(), 2);
    assert_eq!(orchestrator.stats().duplicates_skipped, 1);
}
