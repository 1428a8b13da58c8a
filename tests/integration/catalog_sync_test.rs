//! Catalog-source fetch behavior against a mock upstream.

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use storefront_api::services::CatalogSyncService;

#[tokio::test]
async fn fetch_parses_upstream_listing() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/products"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            {
                "id": 1,
                "title": "Fjallraven Backpack",
                "image": "https://img.example/1.jpg",
                "category": "men's clothing",
                "description": "Fits 15 inch laptops",
                "price": 109.95
            },
            {
                "id": 2,
                "title": "Mens Casual T-Shirt",
                "category": "men's clothing",
                "price": 22.3
            }
        ])))
        .mount(&server)
        .await;

    let service = CatalogSyncService::new(format!("{}/products", server.uri()));
    let products = service.fetch().await.unwrap();

    assert_eq!(products.len(), 2);
    assert_eq!(products[0].id.to_string(), "1");
    assert_eq!(products[0].title, "Fjallraven Backpack");
    assert_eq!(products[1].image, "");
    assert_eq!(products[1].description, "");
}

#[tokio::test]
async fn fetch_surfaces_upstream_errors() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/products"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let service = CatalogSyncService::new(format!("{}/products", server.uri()));
    assert!(service.fetch().await.is_err());
}

#[tokio::test]
async fn fetch_rejects_malformed_payloads() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/products"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let service = CatalogSyncService::new(format!("{}/products", server.uri()));
    assert!(service.fetch().await.is_err());
}
