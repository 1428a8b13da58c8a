//! Recommendation-proxy behavior against a mock ML service.

use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use storefront_api::services::RecommendationService;

#[tokio::test]
async fn product_recommendations_preserve_ml_ordering() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/recommend/product/7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            { "externalId": "12" },
            { "externalId": "3" },
            { "externalId": "9" }
        ])))
        .mount(&server)
        .await;

    let service = RecommendationService::new(Some(server.uri()), None);
    let ids = service.product_recommendations("7").await;

    assert_eq!(ids, vec!["12", "3", "9"]);
}

#[tokio::test]
async fn cart_recommendations_post_the_cart_contents() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/recommend/cart"))
        .and(body_json(serde_json::json!({ "cartItems": ["1", "4"] })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "recommendations": [{ "externalId": "8" }]
        })))
        .mount(&server)
        .await;

    let service = RecommendationService::new(Some(server.uri()), None);
    let ids = service
        .cart_recommendations(&["1".to_string(), "4".to_string()])
        .await;

    assert_eq!(ids, vec!["8"]);
}

#[tokio::test]
async fn ml_failures_degrade_to_empty_results() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/recommend/product/7"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let service = RecommendationService::new(Some(server.uri()), None);
    assert!(service.product_recommendations("7").await.is_empty());
}

#[tokio::test]
async fn unconfigured_service_returns_empty() {
    let service = RecommendationService::new(None, None);
    assert!(service.product_recommendations("7").await.is_empty());
    assert!(service.cart_recommendations(&["1".to_string()]).await.is_empty());
}

#[tokio::test]
async fn retrain_forwards_the_callers_bearer_token() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/retrain"))
        .and(header("authorization", "Bearer admin-token"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let service = RecommendationService::new(None, Some(format!("{}/retrain", server.uri())));
    service.trigger_retrain("admin-token").await.unwrap();
}

#[tokio::test]
async fn retrain_without_configuration_errors() {
    let service = RecommendationService::new(None, None);
    assert!(service.trigger_retrain("token").await.is_err());
}
