//! Recommendation-service proxy.
//!
//! The ML service is advisory: any failure or empty answer degrades to a
//! catalog-based fallback in the handlers, never to an error response.

use anyhow::{Context, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Deserialize)]
pub struct MlProduct {
    #[serde(rename = "externalId")]
    pub external_id: String,
}

#[derive(Debug, Deserialize)]
struct CartRecommendationResponse {
    recommendations: Vec<MlProduct>,
}

#[derive(Debug, Serialize)]
struct CartRecommendationRequest<'a> {
    #[serde(rename = "cartItems")]
    cart_items: &'a [String],
}

#[derive(Clone)]
pub struct RecommendationService {
    client: Client,
    service_url: Option<String>,
    retrain_url: Option<String>,
}

impl RecommendationService {
    pub fn new(service_url: Option<String>, retrain_url: Option<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();

        Self {
            client,
            service_url,
            retrain_url,
        }
    }

    /// External ids recommended for a product page, in ML order.
    /// Empty when the service is unconfigured or unreachable.
    pub async fn product_recommendations(&self, external_id: &str) -> Vec<String> {
        let Some(base) = &self.service_url else {
            return Vec::new();
        };

        let url = format!("{}/recommend/product/{}", base, external_id);
        match self.fetch_product_recs(&url).await {
            Ok(ids) => ids,
            Err(e) => {
                warn!("Product recommendation lookup failed: {}", e);
                Vec::new()
            }
        }
    }

    async fn fetch_product_recs(&self, url: &str) -> Result<Vec<String>> {
        let results: Vec<MlProduct> = self
            .client
            .get(url)
            .send()
            .await
            .context("Recommendation request failed")?
            .error_for_status()
            .context("Recommendation service returned an error status")?
            .json()
            .await
            .context("Recommendation service returned invalid JSON")?;

        Ok(results.into_iter().map(|p| p.external_id).collect())
    }

    /// External ids recommended for a cart, in ML order.
    pub async fn cart_recommendations(&self, cart_external_ids: &[String]) -> Vec<String> {
        let Some(base) = &self.service_url else {
            return Vec::new();
        };

        let url = format!("{}/recommend/cart", base);
        match self.fetch_cart_recs(&url, cart_external_ids).await {
            Ok(ids) => ids,
            Err(e) => {
                warn!("Cart recommendation lookup failed: {}", e);
                Vec::new()
            }
        }
    }

    async fn fetch_cart_recs(&self, url: &str, ids: &[String]) -> Result<Vec<String>> {
        let response: CartRecommendationResponse = self
            .client
            .post(url)
            .json(&CartRecommendationRequest { cart_items: ids })
            .send()
            .await
            .context("Recommendation request failed")?
            .error_for_status()
            .context("Recommendation service returned an error status")?
            .json()
            .await
            .context("Recommendation service returned invalid JSON")?;

        Ok(response
            .recommendations
            .into_iter()
            .map(|p| p.external_id)
            .collect())
    }

    /// Kick off model retraining, forwarding the caller's bearer token.
    pub async fn trigger_retrain(&self, bearer_token: &str) -> Result<()> {
        let url = self
            .retrain_url
            .as_ref()
            .context("ML_RETRAIN_URL is not configured")?;

        self.client
            .post(url)
            .bearer_auth(bearer_token)
            .send()
            .await
            .context("Retrain request failed")?
            .error_for_status()
            .context("Retrain endpoint returned an error status")?;

        Ok(())
    }
}
