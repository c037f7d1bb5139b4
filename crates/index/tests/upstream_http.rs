//! JSON-RPC catalog pulls against a stubbed store.

use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use shopmate_index::{CatalogSource, JsonRpcCatalogClient, UpstreamError};

fn client(server: &MockServer) -> JsonRpcCatalogClient {
    JsonRpcCatalogClient::new(Some(format!("{}/rpc", server.uri())), 5)
        .expect("failed to build test client")
}

#[tokio::test]
async fn products_come_from_the_result_member() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rpc"))
        .and(body_partial_json(json!({"jsonrpc": "2.0", "method": "get_products"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "result": [{"id": 1, "name": "Logo Hoodie", "price": "45.00"}]
        })))
        .mount(&server)
        .await;

    let products = client(&server).fetch_products().await.expect("fetch succeeds");
    assert_eq!(products.len(), 1);
    assert_eq!(products[0]["name"], "Logo Hoodie");
}

#[tokio::test]
async fn categories_accept_success_envelope() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rpc"))
        .and(body_partial_json(json!({"method": "get_product_categories"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": [{"id": 7, "name": "Clothing"}, {"id": 8, "name": "Drinks"}]
        })))
        .mount(&server)
        .await;

    let categories = client(&server).fetch_categories().await.expect("fetch succeeds");
    assert_eq!(categories.len(), 2);
}

#[tokio::test]
async fn non_success_status_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rpc"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;

    let result = client(&server).fetch_coupons().await;
    assert!(matches!(result, Err(UpstreamError::Status { status: 502 })), "got {result:?}");
}

#[tokio::test]
async fn missing_endpoint_is_reported_without_a_request() {
    let client = JsonRpcCatalogClient::new(Some("  ".to_string()), 5).expect("client builds");

    assert!(!client.is_configured());
    assert!(matches!(client.fetch_coupons().await, Err(UpstreamError::NotConfigured)));
}
