//! Full ingestion runs driving `FeedClient` against wiremock into the
//! in-memory store.

use std::time::Duration;

use serde_json::{json, Value};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use affdb_core::parse_sources;
use affdb_ingest::{
    run_ingestion, MemoryProductStore, Pipeline, RetryPolicy, RunOptions, SkipReason, StopReason,
};
use affdb_sources::FeedClient;

fn awin_item(id: u32, name: &str, price: &str) -> Value {
    json!({
        "aw_product_id": id,
        "product_name": name,
        "description": "Relaxed fit in breathable cotton with a soft brushed finish that holds its shape wash after wash.",
        "brand_name": "Northwind",
        "search_price": price,
        "currency": "GBP",
        "merchant_image_url": format!("https://img.example.com/{id}.jpg"),
        "aw_deep_link": format!("https://shop.example.com/p/{id}"),
    })
}

fn fast_options() -> RunOptions {
    RunOptions {
        inter_request_delay: Duration::ZERO,
        retry: RetryPolicy::new(2, 0),
        ..RunOptions::default()
    }
}

async fn setup(server: &MockServer) -> (FeedClient, Pipeline) {
    let yaml = format!(
        "sources:\n  - name: awin-apparel\n    network: awin\n    base_url: {}/feed\n    page_size: 2\n    reasonable_price: {{ min: \"15\", max: \"500\" }}\n    price_window: {{ min: \"5\", max: \"5000\" }}\n    audience: women\n",
        server.uri()
    );
    let registry = parse_sources(&yaml).unwrap();
    let source = &registry.sources[0];
    let client = FeedClient::new(source, None, 5, "affdb-test/0.1").unwrap();
    let pipeline = Pipeline::for_source(source, registry.tuning_for(source), 0).unwrap();
    (client, pipeline)
}

#[tokio::test]
async fn two_page_catalog_is_ingested_and_filtered() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/feed"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [
                awin_item(1, "Linen Shirt", "45.00"),
                awin_item(2, "Mystery Box Bundle", "20.00"),
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/feed"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [awin_item(3, "Men's Wool Coat", "120.00")]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let (client, pipeline) = setup(&server).await;
    let store = MemoryProductStore::new();
    let summary = run_ingestion(&client, &store, &pipeline, &fast_options()).await;

    assert_eq!(summary.stop_reason, StopReason::Exhausted);
    assert_eq!(summary.pages_fetched, 2);
    assert_eq!(summary.requests_used, 2);
    assert_eq!(summary.inserted, 1);
    assert_eq!(summary.skipped_for(SkipReason::Bundles), 1);
    assert_eq!(summary.skipped_for(SkipReason::WrongGender), 1);
    assert_eq!(store.len().unwrap(), 1);

    let records = store.records().unwrap();
    assert_eq!(records[0].1.product.product_url, "https://shop.example.com/p/1");
}

#[tokio::test]
async fn server_errors_are_retried_by_the_run() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/feed"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/feed"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [awin_item(9, "Silk Blouse", "60.00")]
        })))
        .mount(&server)
        .await;

    let (client, pipeline) = setup(&server).await;
    let store = MemoryProductStore::new();
    let summary = run_ingestion(&client, &store, &pipeline, &fast_options()).await;

    assert_eq!(summary.stop_reason, StopReason::Exhausted);
    assert_eq!(summary.requests_used, 2, "the 503 attempt counts");
    assert_eq!(summary.inserted, 1);
}

#[tokio::test]
async fn unauthorized_first_page_fails_the_source() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/feed"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let (client, pipeline) = setup(&server).await;
    let store = MemoryProductStore::new();
    let summary = run_ingestion(&client, &store, &pipeline, &fast_options()).await;

    assert!(summary.failed_on_first_page());
    assert_eq!(summary.requests_used, 1, "4xx is not retried");
    assert!(summary.fetch_error.unwrap().contains("401"));
    assert!(store.is_empty().unwrap());
}
