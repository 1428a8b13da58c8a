//! Shopping cart handlers.
//!
//! The stored cart is always deduplicated (write-time merge); the total
//! is derived from current product prices at read time, never stored.

use axum::{
    Json,
    extract::{Path, State},
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::types::Json as SqlJson;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::AppState;
use crate::auth::middleware::CurrentUser;
use crate::error::{ApiError, Result};
use crate::models::cart::{Cart, CartItem, merge_items};
use crate::models::product::{PRODUCT_COLUMNS, Product};

#[derive(Debug, Deserialize, ToSchema)]
pub struct AddItemRequest {
    pub product_id: Uuid,
    #[serde(default = "default_qty")]
    pub qty: i32,
}

fn default_qty() -> i32 {
    1
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateQuantityRequest {
    pub qty: i32,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CartLine {
    pub product: Product,
    pub qty: i32,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CartResponse {
    pub items: Vec<CartLine>,
    pub total_price: Decimal,
}

async fn load_items(state: &AppState, user_id: Uuid) -> Result<Vec<CartItem>> {
    let cart = sqlx::query_as::<_, Cart>(
        "SELECT id, user_id, items, created_at, updated_at FROM carts WHERE user_id = $1",
    )
    .bind(user_id)
    .fetch_optional(&state.db)
    .await?;

    Ok(cart.map(|c| c.items.0).unwrap_or_default())
}

async fn save_items(state: &AppState, user_id: Uuid, items: Vec<CartItem>) -> Result<Vec<CartItem>> {
    let items = merge_items(items);

    sqlx::query(
        "INSERT INTO carts (id, user_id, items) VALUES ($1, $2, $3)
         ON CONFLICT (user_id) DO UPDATE SET items = EXCLUDED.items, updated_at = NOW()",
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(SqlJson(&items))
    .execute(&state.db)
    .await?;

    Ok(items)
}

/// Join stored lines with live catalog rows. Lines whose product has
/// vanished from the catalog are dropped from the view.
async fn build_response(state: &AppState, items: &[CartItem]) -> Result<CartResponse> {
    if items.is_empty() {
        return Ok(CartResponse {
            items: vec![],
            total_price: Decimal::ZERO,
        });
    }

    let ids: Vec<Uuid> = items.iter().map(|i| i.product_id).collect();
    let products = sqlx::query_as::<_, Product>(&format!(
        "SELECT {} FROM products WHERE id = ANY($1)",
        PRODUCT_COLUMNS
    ))
    .bind(&ids)
    .fetch_all(&state.db)
    .await?;

    let mut lines = Vec::with_capacity(items.len());
    let mut total = Decimal::ZERO;

    for item in items {
        if let Some(product) = products.iter().find(|p| p.id == item.product_id) {
            total += product.price * Decimal::from(item.qty);
            lines.push(CartLine {
                product: product.clone(),
                qty: item.qty,
            });
        }
    }

    Ok(CartResponse {
        items: lines,
        total_price: total,
    })
}

/// GET /api/cart
pub async fn get_cart(State(state): State<AppState>, user: CurrentUser) -> Result<Json<CartResponse>> {
    let items = load_items(&state, user.id).await?;
    Ok(Json(build_response(&state, &items).await?))
}

/// POST /api/cart/add
pub async fn add_item(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(request): Json<AddItemRequest>,
) -> Result<Json<CartResponse>> {
    if request.qty <= 0 {
        return Err(ApiError::BadRequest("Quantity must be positive".into()));
    }

    let exists: Option<Uuid> = sqlx::query_scalar("SELECT id FROM products WHERE id = $1")
        .bind(request.product_id)
        .fetch_optional(&state.db)
        .await?;
    if exists.is_none() {
        return Err(ApiError::not_found("Product"));
    }

    let mut items = load_items(&state, user.id).await?;
    items.push(CartItem {
        product_id: request.product_id,
        qty: request.qty,
    });

    let items = save_items(&state, user.id, items).await?;
    Ok(Json(build_response(&state, &items).await?))
}

/// PUT /api/cart/{productId} - a non-positive quantity removes the line.
pub async fn update_quantity(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(product_id): Path<Uuid>,
    Json(request): Json<UpdateQuantityRequest>,
) -> Result<Json<CartResponse>> {
    let mut items = load_items(&state, user.id).await?;

    let position = items
        .iter()
        .position(|i| i.product_id == product_id)
        .ok_or_else(|| ApiError::not_found("Product in cart"))?;

    if request.qty <= 0 {
        items.remove(position);
    } else {
        items[position].qty = request.qty;
    }

    let items = save_items(&state, user.id, items).await?;
    Ok(Json(build_response(&state, &items).await?))
}

/// DELETE /api/cart/{productId}
pub async fn remove_item(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(product_id): Path<Uuid>,
) -> Result<Json<CartResponse>> {
    let mut items = load_items(&state, user.id).await?;
    items.retain(|i| i.product_id != product_id);

    let items = save_items(&state, user.id, items).await?;
    Ok(Json(build_response(&state, &items).await?))
}

/// DELETE /api/cart
pub async fn clear_cart(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<CartResponse>> {
    save_items(&state, user.id, vec![]).await?;
    Ok(Json(CartResponse {
        items: vec![],
        total_price: Decimal::ZERO,
    }))
}
