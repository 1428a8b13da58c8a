//! Admin back office: order oversight, delivery-partner assignment,
//! inventory CRUD, superadmin analytics and the ML retrain trigger.

use axum::{
    Json,
    extract::{Path, State},
    http::{HeaderMap, StatusCode, header::AUTHORIZATION},
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::AppState;
use crate::auth::middleware::CurrentUser;
use crate::auth::roles::authorize;
use crate::error::{ApiError, Result};
use crate::handlers::response::ApiResponse;
use crate::models::order::{ORDER_COLUMNS, Order, OrderStatus};
use crate::models::product::{PRODUCT_COLUMNS, Product, StockStatus};
use crate::models::user::USER_COLUMNS;
use crate::models::User;

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PartySummary {
    pub id: Uuid,
    pub name: String,
    pub email: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AdminOrder {
    #[serde(flatten)]
    pub order: Order,
    pub customer: Option<PartySummary>,
    pub assigned: Option<PartySummary>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateStatusRequest {
    pub status: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AssignPartnerRequest {
    pub delivery_partner_id: Uuid,
}

#[derive(Debug, Serialize, sqlx::FromRow, ToSchema)]
pub struct DeliveryPartner {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub status: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateProductRequest {
    #[validate(length(min = 1, max = 100))]
    pub external_id: String,

    #[validate(length(min = 1, max = 200))]
    pub name: String,

    pub image: Option<String>,
    pub brand: Option<String>,

    #[validate(length(min = 1, max = 100))]
    pub category: String,

    pub description: Option<String>,
    pub price: Decimal,
    pub count_in_stock: Option<i32>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateProductRequest {
    pub name: Option<String>,
    pub image: Option<String>,
    pub brand: Option<String>,
    pub category: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub count_in_stock: Option<i32>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AnalyticsResponse {
    pub total_orders: i64,
    pub delivered_orders: i64,
    pub cancelled_orders: i64,
    pub total_users: i64,
    pub total_admins: i64,
    pub total_delivery_partners: i64,
    pub total_revenue: Decimal,
    pub recent_orders: Vec<AdminOrder>,
}

/// Attach customer/assignee summaries to a batch of orders.
async fn with_parties(state: &AppState, orders: Vec<Order>) -> Result<Vec<AdminOrder>> {
    let mut ids: Vec<Uuid> = orders.iter().map(|o| o.user_id).collect();
    ids.extend(orders.iter().filter_map(|o| o.assigned_to));
    ids.sort();
    ids.dedup();

    let users = if ids.is_empty() {
        vec![]
    } else {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE id = ANY($1)",
            USER_COLUMNS
        ))
        .bind(&ids)
        .fetch_all(&state.db)
        .await?
    };

    let by_id: HashMap<Uuid, PartySummary> = users
        .into_iter()
        .map(|u| {
            (
                u.id,
                PartySummary {
                    id: u.id,
                    name: u.name,
                    email: u.email,
                },
            )
        })
        .collect();

    Ok(orders
        .into_iter()
        .map(|order| AdminOrder {
            customer: by_id.get(&order.user_id).cloned(),
            assigned: order.assigned_to.and_then(|id| by_id.get(&id).cloned()),
            order,
        })
        .collect())
}

/// GET /api/admin/orders
pub async fn list_orders(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<Vec<AdminOrder>>> {
    authorize(user.role, "orders", "manage")?;

    let orders = sqlx::query_as::<_, Order>(&format!(
        "SELECT {} FROM orders ORDER BY created_at DESC",
        ORDER_COLUMNS
    ))
    .fetch_all(&state.db)
    .await?;

    Ok(Json(with_parties(&state, orders).await?))
}

/// PUT /api/admin/orders/{id}/status
pub async fn update_order_status(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateStatusRequest>,
) -> Result<Json<serde_json::Value>> {
    authorize(user.role, "orders", "manage")?;

    let status: OrderStatus = request
        .status
        .parse()
        .map_err(|e: String| ApiError::BadRequest(e))?;

    let order = sqlx::query_as::<_, Order>(&format!(
        "UPDATE orders SET status = ($2)::order_status, updated_at = NOW()
          WHERE id = $1 RETURNING {}",
        ORDER_COLUMNS
    ))
    .bind(id)
    .bind(status.as_str())
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| ApiError::not_found("Order"))?;

    Ok(Json(serde_json::json!({
        "success": true,
        "message": format!("Order status updated to {}", status.as_str()),
        "order": order,
    })))
}

/// PUT /api/admin/orders/{id}/assign
pub async fn assign_delivery_partner(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
    Json(request): Json<AssignPartnerRequest>,
) -> Result<Json<serde_json::Value>> {
    authorize(user.role, "orders", "assign")?;

    let partner = sqlx::query_as::<_, User>(&format!(
        "SELECT {} FROM users WHERE id = $1",
        USER_COLUMNS
    ))
    .bind(request.delivery_partner_id)
    .fetch_optional(&state.db)
    .await?
    .filter(|u| u.role == "delivery")
    .ok_or_else(|| ApiError::BadRequest("Invalid delivery partner".into()))?;

    let order = sqlx::query_as::<_, Order>(&format!(
        "UPDATE orders SET assigned_to = $2, status = 'Processing', updated_at = NOW()
          WHERE id = $1 RETURNING {}",
        ORDER_COLUMNS
    ))
    .bind(id)
    .bind(partner.id)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| ApiError::not_found("Order"))?;

    Ok(Json(serde_json::json!({
        "success": true,
        "message": format!("Order assigned to {}", partner.name),
        "order": order,
    })))
}

/// GET /api/admin/delivery
pub async fn list_delivery_partners(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<Vec<DeliveryPartner>>> {
    authorize(user.role, "partners", "read")?;

    let partners = sqlx::query_as::<_, DeliveryPartner>(
        "SELECT id, name, email, phone, status::text AS status
           FROM users WHERE role = 'delivery' ORDER BY name",
    )
    .fetch_all(&state.db)
    .await?;

    Ok(Json(partners))
}

/// GET /api/admin/superadmin/analytics
pub async fn superadmin_analytics(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<AnalyticsResponse>> {
    authorize(user.role, "analytics", "read")?;

    let total_orders: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders")
        .fetch_one(&state.db)
        .await?;
    let delivered_orders: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM orders WHERE is_delivered = TRUE")
            .fetch_one(&state.db)
            .await?;
    let cancelled_orders: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM orders WHERE is_canceled = TRUE")
            .fetch_one(&state.db)
            .await?;
    let total_users: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE role = 'user'")
        .fetch_one(&state.db)
        .await?;
    let total_admins: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE role = 'admin'")
        .fetch_one(&state.db)
        .await?;
    let total_delivery_partners: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE role = 'delivery'")
            .fetch_one(&state.db)
            .await?;
    let total_revenue: Decimal = sqlx::query_scalar(
        "SELECT COALESCE(SUM(total_price), 0) FROM orders WHERE is_paid = TRUE",
    )
    .fetch_one(&state.db)
    .await?;

    let recent = sqlx::query_as::<_, Order>(&format!(
        "SELECT {} FROM orders ORDER BY created_at DESC LIMIT 5",
        ORDER_COLUMNS
    ))
    .fetch_all(&state.db)
    .await?;

    Ok(Json(AnalyticsResponse {
        total_orders,
        delivered_orders,
        cancelled_orders,
        total_users,
        total_admins,
        total_delivery_partners,
        total_revenue,
        recent_orders: with_parties(&state, recent).await?,
    }))
}

/// GET /api/admin/products
pub async fn list_all_products(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<Vec<Product>>> {
    authorize(user.role, "products", "manage")?;

    let products = sqlx::query_as::<_, Product>(&format!(
        "SELECT {} FROM products ORDER BY created_at DESC",
        PRODUCT_COLUMNS
    ))
    .fetch_all(&state.db)
    .await?;

    Ok(Json(products))
}

/// POST /api/admin/products
pub async fn create_product(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(request): Json<CreateProductRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>)> {
    authorize(user.role, "products", "manage")?;

    request
        .validate()
        .map_err(|e| ApiError::BadRequest(format!("Validation error: {}", e)))?;

    if request.price < Decimal::ZERO {
        return Err(ApiError::BadRequest("Price must not be negative".into()));
    }

    let count_in_stock = request.count_in_stock.unwrap_or(0).max(0);
    let status = StockStatus::for_count(count_in_stock, 5);

    let product = sqlx::query_as::<_, Product>(&format!(
        "INSERT INTO products
            (id, external_id, name, image, brand, category, description, price,
             count_in_stock, stock_status)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, ($10)::stock_status)
         RETURNING {}",
        PRODUCT_COLUMNS
    ))
    .bind(Uuid::new_v4())
    .bind(&request.external_id)
    .bind(&request.name)
    .bind(request.image.as_deref().unwrap_or(""))
    .bind(&request.brand)
    .bind(&request.category)
    .bind(&request.description)
    .bind(request.price)
    .bind(count_in_stock)
    .bind(status.as_str())
    .fetch_one(&state.db)
    .await
    .map_err(|e| match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            ApiError::already_exists("Product")
        }
        _ => ApiError::Database(e),
    })?;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "success": true,
            "message": "Product added successfully",
            "product": product,
        })),
    ))
}

/// PUT /api/admin/products/{id}
pub async fn update_product(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateProductRequest>,
) -> Result<Json<serde_json::Value>> {
    authorize(user.role, "products", "manage")?;

    if matches!(request.price, Some(p) if p < Decimal::ZERO) {
        return Err(ApiError::BadRequest("Price must not be negative".into()));
    }
    if matches!(request.count_in_stock, Some(c) if c < 0) {
        return Err(ApiError::BadRequest("Stock must not be negative".into()));
    }

    let product = sqlx::query_as::<_, Product>(&format!(
        "UPDATE products
            SET name = COALESCE($2, name),
                image = COALESCE($3, image),
                brand = COALESCE($4, brand),
                category = COALESCE($5, category),
                description = COALESCE($6, description),
                price = COALESCE($7, price),
                count_in_stock = COALESCE($8, count_in_stock),
                stock_status = (CASE
                    WHEN COALESCE($8, count_in_stock) <= 0 THEN 'out_of_stock'
                    WHEN COALESCE($8, count_in_stock) <= low_stock_threshold THEN 'low_stock'
                    ELSE 'in_stock'
                END)::stock_status,
                updated_at = NOW()
          WHERE id = $1
          RETURNING {}",
        PRODUCT_COLUMNS
    ))
    .bind(id)
    .bind(&request.name)
    .bind(&request.image)
    .bind(&request.brand)
    .bind(&request.category)
    .bind(&request.description)
    .bind(request.price)
    .bind(request.count_in_stock)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| ApiError::not_found("Product"))?;

    Ok(Json(serde_json::json!({
        "message": "Inventory updated successfully",
        "product": product,
    })))
}

/// DELETE /api/admin/products/{id}
pub async fn delete_product(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<()>>> {
    authorize(user.role, "products", "manage")?;

    let result = sqlx::query("DELETE FROM products WHERE id = $1")
        .bind(id)
        .execute(&state.db)
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Product"));
    }

    Ok(Json(ApiResponse::message("Product deleted successfully")))
}

/// POST /api/admin/ml/retrain - forwards the caller's bearer token.
pub async fn trigger_ml_retrain(
    State(state): State<AppState>,
    user: CurrentUser,
    headers: HeaderMap,
) -> Result<Json<ApiResponse<()>>> {
    authorize(user.role, "ml", "retrain")?;

    let token = headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .ok_or_else(|| ApiError::Unauthorized("Missing bearer token".into()))?;

    state
        .recommendation_service
        .trigger_retrain(token)
        .await
        .map_err(|e| ApiError::ExternalService(format!("Failed to start retraining: {}", e)))?;

    Ok(Json(ApiResponse::message("ML retraining started successfully")))
}
