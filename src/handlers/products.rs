//! Public catalog handlers plus the admin-gated external sync.

use axum::{
    Json,
    extract::{Path, State},
};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::AppState;
use crate::auth::middleware::CurrentUser;
use crate::auth::roles::authorize;
use crate::error::{ApiError, Result};
use crate::models::product::{PRODUCT_COLUMNS, Product};

#[derive(Debug, Serialize, ToSchema)]
pub struct SyncResponse {
    pub message: String,
    pub new_count: u32,
    pub updated_count: u32,
}

/// GET /api/products
#[utoipa::path(
    get,
    path = "/api/products",
    tag = "products",
    responses((status = 200, description = "Full catalog", body = [Product]))
)]
pub async fn list_products(State(state): State<AppState>) -> Result<Json<Vec<Product>>> {
    let products = sqlx::query_as::<_, Product>(&format!(
        "SELECT {} FROM products ORDER BY created_at DESC",
        PRODUCT_COLUMNS
    ))
    .fetch_all(&state.db)
    .await?;

    Ok(Json(products))
}

/// GET /api/products/{id} - a malformed id is just an unknown product.
#[utoipa::path(
    get,
    path = "/api/products/{id}",
    tag = "products",
    params(("id" = String, Path, description = "Product id")),
    responses(
        (status = 200, description = "Product", body = Product),
        (status = 404, description = "Unknown product")
    )
)]
pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Product>> {
    let parsed = id
        .parse::<Uuid>()
        .map_err(|_| ApiError::not_found("Product"))?;

    let product = sqlx::query_as::<_, Product>(&format!(
        "SELECT {} FROM products WHERE id = $1",
        PRODUCT_COLUMNS
    ))
    .bind(parsed)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| ApiError::not_found("Product"))?;

    Ok(Json(product))
}

/// POST /api/products/sync - pull the external source into the catalog.
pub async fn sync_products(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<SyncResponse>> {
    authorize(user.role, "products", "sync")?;

    let outcome = state
        .catalog_sync
        .sync(&state.db)
        .await
        .map_err(|e| ApiError::ExternalService(format!("Catalog sync failed: {}", e)))?;

    Ok(Json(SyncResponse {
        message: "Products synced successfully".to_string(),
        new_count: outcome.new_count,
        updated_count: outcome.updated_count,
    }))
}
