//! Integration tests for `FeedClient::fetch_page` against a local wiremock
//! server. No real network traffic.

use serde_json::json;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use affdb_core::{parse_sources, SourceConfig};
use affdb_ingest::{SourceClient, SourceError, Transient};
use affdb_sources::FeedClient;

fn source(base_url: &str, extra: &str) -> SourceConfig {
    let yaml = format!(
        "sources:\n  - name: feed\n    network: awin\n    base_url: {base_url}/products\n    page_size: 2\n    reasonable_price: {{ min: \"15\", max: \"500\" }}\n    price_window: {{ min: \"5\", max: \"5000\" }}\n{extra}"
    );
    parse_sources(&yaml)
        .expect("test registry should parse")
        .sources
        .remove(0)
}

fn client(server: &MockServer, extra: &str, credential: Option<&str>) -> FeedClient {
    FeedClient::new(
        &source(&server.uri(), extra),
        credential.map(str::to_string),
        5,
        "affdb-test/0.1",
    )
    .expect("failed to build test FeedClient")
}

// ---------------------------------------------------------------------------
// Happy paths
// ---------------------------------------------------------------------------

#[tokio::test]
async fn first_page_requests_page_one_with_limit() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/products"))
        .and(query_param("page", "1"))
        .and(query_param("limit", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [
                {"aw_product_id": 1, "product_name": "Linen Shirt"},
                {"aw_product_id": 2, "product_name": "Silk Scarf"}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let c = client(&server, "", None);
    let page = c.fetch_page(None).await.expect("page should decode");

    assert_eq!(page.items.len(), 2);
    assert!(page.has_more, "a full page implies another one");
    assert_eq!(page.next_cursor.as_deref(), Some("2"));
    assert_eq!(c.name(), "feed");
    assert_eq!(c.network(), affdb_core::SourceNetwork::Awin);
}

#[tokio::test]
async fn short_page_ends_the_catalog() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/products"))
        .and(query_param("page", "4"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"items": [{"aw_product_id": 7}]})),
        )
        .mount(&server)
        .await;

    let page = client(&server, "", None)
        .fetch_page(Some("4"))
        .await
        .unwrap();

    assert_eq!(page.items.len(), 1);
    assert!(!page.has_more);
    assert!(page.next_cursor.is_none());
}

#[tokio::test]
async fn cursor_paging_passes_cursor_and_reads_next() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/products"))
        .and(query_param("cursor", "abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Items": [{"CatalogItemId": "x"}],
            "nextCursor": "def"
        })))
        .mount(&server)
        .await;

    let c = client(&server, "    paging: cursor\n    items_field: Items\n", None);
    let page = c.fetch_page(Some("abc")).await.unwrap();

    assert_eq!(page.items.len(), 1);
    assert!(page.has_more);
    assert_eq!(page.next_cursor.as_deref(), Some("def"));
}

// ---------------------------------------------------------------------------
// Authentication
// ---------------------------------------------------------------------------

#[tokio::test]
async fn bearer_credential_is_sent_as_authorization_header() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/products"))
        .and(header("authorization", "Bearer tok-123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": []})))
        .expect(1)
        .mount(&server)
        .await;

    let c = client(
        &server,
        "    credential_env: FEED_TOKEN\n    auth:\n      kind: bearer\n",
        Some("tok-123"),
    );
    let page = c.fetch_page(None).await.unwrap();
    assert!(page.items.is_empty());
    assert!(!page.has_more);
}

#[tokio::test]
async fn query_credential_is_sent_as_parameter() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/products"))
        .and(query_param("api_key", "k-9"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": []})))
        .expect(1)
        .mount(&server)
        .await;

    let c = client(
        &server,
        "    credential_env: FEED_KEY\n    auth:\n      kind: query\n      param: api_key\n",
        Some("k-9"),
    );
    c.fetch_page(None).await.unwrap();
}

// ---------------------------------------------------------------------------
// Error classification
// ---------------------------------------------------------------------------

#[tokio::test]
async fn rate_limit_reads_retry_after() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/products"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "17"))
        .mount(&server)
        .await;

    let err = client(&server, "", None).fetch_page(None).await.unwrap_err();
    assert!(
        matches!(
            err,
            SourceError::RateLimited {
                retry_after_secs: 17,
                ..
            }
        ),
        "expected RateLimited, got: {err:?}"
    );
    assert!(err.is_transient());
}

#[tokio::test]
async fn not_found_is_not_transient() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/products"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let err = client(&server, "", None).fetch_page(None).await.unwrap_err();
    assert!(matches!(err, SourceError::NotFound { .. }));
    assert!(!err.is_transient());
}

#[tokio::test]
async fn server_error_is_transient_client_error_is_not() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/products"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/products"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let c = client(&server, "", None);
    let bad_gateway = c.fetch_page(None).await.unwrap_err();
    assert!(matches!(
        bad_gateway,
        SourceError::UnexpectedStatus { status: 502, .. }
    ));
    assert!(bad_gateway.is_transient());

    let forbidden = c.fetch_page(Some("2")).await.unwrap_err();
    assert!(matches!(
        forbidden,
        SourceError::UnexpectedStatus { status: 403, .. }
    ));
    assert!(!forbidden.is_transient());
}

#[tokio::test]
async fn invalid_json_is_a_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/products"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&server)
        .await;

    let err = client(&server, "", None).fetch_page(None).await.unwrap_err();
    assert!(matches!(err, SourceError::Decode { .. }));
    assert!(!err.is_transient());
}
