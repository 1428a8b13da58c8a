//! Recommendation endpoints: ML-backed with a catalog fallback.
//!
//! Failures degrade to empty lists; a broken recommender must never break
//! the storefront page that embeds it.

use axum::{
    Json,
    extract::{Path, State},
};
use serde::Deserialize;
use utoipa::ToSchema;

use crate::AppState;
use crate::error::Result;
use crate::models::product::{PRODUCT_COLUMNS, Product};

#[derive(Debug, Deserialize, ToSchema)]
pub struct CartRecommendationsRequest {
    pub cart_items: Vec<String>,
}

/// Map ML-returned external ids back to catalog rows, preserving the
/// recommender's ordering and dropping unknown ids.
async fn resolve_external_ids(state: &AppState, ids: &[String]) -> Result<Vec<Product>> {
    if ids.is_empty() {
        return Ok(vec![]);
    }

    let products = sqlx::query_as::<_, Product>(&format!(
        "SELECT {} FROM products WHERE external_id = ANY($1)",
        PRODUCT_COLUMNS
    ))
    .bind(ids)
    .fetch_all(&state.db)
    .await?;

    let ordered = ids
        .iter()
        .filter_map(|id| products.iter().find(|p| &p.external_id == id).cloned())
        .collect();

    Ok(ordered)
}

async fn latest_in_category(
    state: &AppState,
    category: &str,
    exclude: &[String],
) -> Result<Vec<Product>> {
    let products = sqlx::query_as::<_, Product>(&format!(
        "SELECT {} FROM products
          WHERE category = $1 AND NOT (external_id = ANY($2))
          ORDER BY created_at DESC LIMIT 4",
        PRODUCT_COLUMNS
    ))
    .bind(category)
    .bind(exclude)
    .fetch_all(&state.db)
    .await?;

    Ok(products)
}

/// GET /api/recommendations/product/{externalId}
pub async fn product_recommendations(
    State(state): State<AppState>,
    Path(external_id): Path<String>,
) -> Result<Json<Vec<Product>>> {
    let seed = sqlx::query_as::<_, Product>(&format!(
        "SELECT {} FROM products WHERE external_id = $1",
        PRODUCT_COLUMNS
    ))
    .bind(&external_id)
    .fetch_optional(&state.db)
    .await?;

    // Unknown seed: nothing to recommend against.
    let Some(seed) = seed else {
        return Ok(Json(vec![]));
    };

    let ml_ids = state
        .recommendation_service
        .product_recommendations(&external_id)
        .await;

    let resolved = resolve_external_ids(&state, &ml_ids).await?;
    if !resolved.is_empty() {
        return Ok(Json(resolved));
    }

    let fallback =
        latest_in_category(&state, &seed.category, std::slice::from_ref(&external_id)).await?;
    Ok(Json(fallback))
}

/// POST /api/recommendations/cart
pub async fn cart_recommendations(
    State(state): State<AppState>,
    Json(request): Json<CartRecommendationsRequest>,
) -> Result<Json<Vec<Product>>> {
    if request.cart_items.is_empty() {
        return Ok(Json(vec![]));
    }

    let ml_ids = state
        .recommendation_service
        .cart_recommendations(&request.cart_items)
        .await;

    let resolved = resolve_external_ids(&state, &ml_ids).await?;
    if !resolved.is_empty() {
        return Ok(Json(resolved));
    }

    // Fallback keys off the dominant (first) cart category.
    let cart_products = resolve_external_ids(&state, &request.cart_items).await?;
    let Some(first) = cart_products.first() else {
        return Ok(Json(vec![]));
    };

    let fallback = latest_in_category(&state, &first.category, &request.cart_items).await?;
    Ok(Json(fallback))
}
