//! Order lifecycle handlers: creation with stock reservation, reads with
//! opportunistic stage sync, cancellation with stock restore, payment
//! marking.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::{Duration, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::types::Json as SqlJson;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::AppState;
use crate::auth::middleware::CurrentUser;
use crate::error::{ApiError, ErrorCode, Result};
use crate::models::order::{ORDER_COLUMNS, Order, OrderItem, PaymentMethod, PaymentResult};
use crate::models::user::USER_COLUMNS;
use crate::models::User;
use crate::services::email::templates;
use crate::services::outbox::{self, NotificationKind};
use crate::services::{stock, tracking};

/// Orders below this subtotal pay a flat shipping fee; above it ships free.
pub const FREE_SHIPPING_THRESHOLD: i64 = 500;
pub const SHIPPING_FEE: i64 = 29;
const EXPECTED_DELIVERY_DAYS: i64 = 5;

static MOBILE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[6-9]\d{9}$").expect("mobile pattern is valid"));

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateOrderItem {
    pub product_id: Uuid,
    pub qty: i32,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateOrderRequest {
    pub items: Vec<CreateOrderItem>,
    pub shipping_address: String,
    pub mobile: String,
    pub payment_method: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CancelOrderRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct PayOrderRequest {
    pub transaction_id: Option<String>,
    pub status: Option<String>,
    pub method: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderActionResponse {
    pub success: bool,
    pub message: String,
    pub order: Order,
}

/// Compute the price breakdown from reserved snapshots.
pub fn price_breakdown(items: &[OrderItem]) -> (Decimal, Decimal, Decimal) {
    let items_price: Decimal = items
        .iter()
        .map(|i| i.price * Decimal::from(i.qty))
        .sum();

    let shipping_price = if items_price < Decimal::from(FREE_SHIPPING_THRESHOLD) {
        Decimal::from(SHIPPING_FEE)
    } else {
        Decimal::ZERO
    };

    (items_price, shipping_price, items_price + shipping_price)
}

pub async fn fetch_order(state: &AppState, id: Uuid) -> Result<Order> {
    sqlx::query_as::<_, Order>(&format!("SELECT {} FROM orders WHERE id = $1", ORDER_COLUMNS))
        .bind(id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| ApiError::not_found("Order"))
}

/// Create an order.
///
/// Stock for every line item is reserved with conditional decrements in
/// one transaction; any shortfall aborts the whole reservation and names
/// the offending product. The confirmation email is enqueued after commit
/// and never unwinds the order.
#[utoipa::path(
    post,
    path = "/api/orders",
    tag = "orders",
    request_body = CreateOrderRequest,
    responses(
        (status = 201, description = "Order created", body = Order),
        (status = 400, description = "Validation failure or stock shortfall")
    )
)]
pub async fn create_order(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(request): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<Order>)> {
    if request.items.is_empty() {
        return Err(ApiError::BadRequest("No order items".into()));
    }
    if request.shipping_address.trim().is_empty() {
        return Err(ApiError::BadRequest("Shipping address is required".into()));
    }
    if request.mobile.trim().is_empty() {
        return Err(ApiError::BadRequest("Mobile number is required".into()));
    }
    if !MOBILE_RE.is_match(request.mobile.trim()) {
        return Err(ApiError::with_code(
            ErrorCode::InvalidMobileNumber,
            "Invalid mobile number format",
        ));
    }
    if request.items.iter().any(|i| i.qty <= 0) {
        return Err(ApiError::BadRequest("Quantity must be positive".into()));
    }

    let payment_method: PaymentMethod = request
        .payment_method
        .parse()
        .map_err(|e: String| ApiError::BadRequest(e))?;

    let requested: Vec<stock::RequestedItem> = request
        .items
        .iter()
        .map(|i| stock::RequestedItem {
            product_id: i.product_id,
            qty: i.qty,
        })
        .collect();

    let mut tx = state.db.begin().await?;

    let snapshots = stock::reserve_stock(&mut tx, &requested).await?;
    let (items_price, shipping_price, total_price) = price_breakdown(&snapshots);
    let expected_delivery = Utc::now() + Duration::days(EXPECTED_DELIVERY_DAYS);

    let order = sqlx::query_as::<_, Order>(&format!(
        "INSERT INTO orders
            (id, user_id, items, shipping_address, mobile, payment_method,
             items_price, shipping_price, total_price, expected_delivery_date)
         VALUES ($1, $2, $3, $4, $5, ($6)::payment_method, $7, $8, $9, $10)
         RETURNING {}",
        ORDER_COLUMNS
    ))
    .bind(Uuid::new_v4())
    .bind(user.id)
    .bind(SqlJson(&snapshots))
    .bind(request.shipping_address.trim())
    .bind(request.mobile.trim())
    .bind(payment_method.as_str())
    .bind(items_price)
    .bind(shipping_price)
    .bind(total_price)
    .bind(expected_delivery)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    let content = templates::order_confirmation_email(&state.config.theme, &user.name, &order);
    outbox::enqueue_best_effort(
        &state.db,
        &user.email,
        NotificationKind::OrderConfirmation,
        &content,
        Some(order.id),
    )
    .await;

    Ok((StatusCode::CREATED, Json(order)))
}

/// GET /api/orders/my - the caller's non-cancelled orders, newest first,
/// each passed through the stage-sync derivation.
pub async fn my_orders(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<Vec<Order>>> {
    let orders = sqlx::query_as::<_, Order>(&format!(
        "SELECT {} FROM orders WHERE user_id = $1 AND is_canceled = FALSE
          ORDER BY created_at DESC",
        ORDER_COLUMNS
    ))
    .bind(user.id)
    .fetch_all(&state.db)
    .await?;

    let mut synced = Vec::with_capacity(orders.len());
    for order in orders {
        synced.push(tracking::sync_order_tracking(&state.db, order).await?);
    }

    Ok(Json(synced))
}

/// GET /api/orders/{id}
#[utoipa::path(
    get,
    path = "/api/orders/{id}",
    tag = "orders",
    params(("id" = Uuid, Path, description = "Order id")),
    responses(
        (status = 200, description = "Order", body = Order),
        (status = 403, description = "Not the order's owner"),
        (status = 404, description = "Unknown order")
    )
)]
pub async fn get_order(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Order>> {
    let order = fetch_order(&state, id).await?;

    if order.user_id != user.id {
        return Err(ApiError::Forbidden("Not authorized".into()));
    }

    let order = tracking::sync_order_tracking(&state.db, order).await?;
    Ok(Json(order))
}

/// PUT /api/orders/{id}/cancel
///
/// Whole-order cancellation: restores every line item's stock, pins the
/// terminal state and notifies the customer (and assigned partner).
pub async fn cancel_order(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
    Json(request): Json<CancelOrderRequest>,
) -> Result<Json<OrderActionResponse>> {
    let mut tx = state.db.begin().await?;

    let order = sqlx::query_as::<_, Order>(&format!(
        "SELECT {} FROM orders WHERE id = $1 FOR UPDATE",
        ORDER_COLUMNS
    ))
    .bind(id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| ApiError::not_found("Order"))?;

    if order.user_id != user.id {
        return Err(ApiError::Forbidden("Not authorized".into()));
    }
    if order.is_delivered {
        return Err(ApiError::with_code(
            ErrorCode::OrderAlreadyDelivered,
            "Delivered orders cannot be cancelled",
        ));
    }
    if order.is_canceled {
        return Err(ApiError::with_code(
            ErrorCode::OrderAlreadyCancelled,
            "Order already cancelled",
        ));
    }

    stock::restore_stock(&mut tx, &order.items.0).await?;

    let reason = request
        .reason
        .filter(|r| !r.trim().is_empty())
        .unwrap_or_else(|| "User requested cancellation".to_string());

    let updated = sqlx::query_as::<_, Order>(&format!(
        "UPDATE orders
            SET is_canceled = TRUE, cancel_reason = $2, canceled_at = NOW(),
                status = 'Cancelled', delivery_stage = 0, delay_message = FALSE,
                updated_at = NOW()
          WHERE id = $1
          RETURNING {}",
        ORDER_COLUMNS
    ))
    .bind(id)
    .bind(&reason)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    let content = templates::order_cancelled_email(&state.config.theme, &user.name, &updated);
    outbox::enqueue_best_effort(
        &state.db,
        &user.email,
        NotificationKind::OrderCancelled,
        &content,
        Some(updated.id),
    )
    .await;

    if let Some(partner_id) = updated.assigned_to {
        if let Some(partner) = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE id = $1",
            USER_COLUMNS
        ))
        .bind(partner_id)
        .fetch_optional(&state.db)
        .await?
        {
            let notice =
                templates::partner_cancellation_email(&state.config.theme, &partner.name, &updated);
            outbox::enqueue_best_effort(
                &state.db,
                &partner.email,
                NotificationKind::PartnerCancellation,
                &notice,
                Some(updated.id),
            )
            .await;
        }
    }

    Ok(Json(OrderActionResponse {
        success: true,
        message: "Order cancelled successfully and notifications sent.".to_string(),
        order: updated,
    }))
}

/// PUT /api/orders/{id}/pay - mark an online-payment order as paid.
/// Cash-on-delivery is settled by the delivery flow, never here.
pub async fn pay_order(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
    Json(request): Json<PayOrderRequest>,
) -> Result<Json<OrderActionResponse>> {
    let order = fetch_order(&state, id).await?;

    if order.user_id != user.id {
        return Err(ApiError::Forbidden("Not authorized".into()));
    }
    if order.is_paid {
        return Err(ApiError::BadRequest("Order already marked as paid".into()));
    }
    if order.payment_method == PaymentMethod::Cod.as_str() {
        return Err(ApiError::BadRequest(
            "COD orders are settled on delivery".into(),
        ));
    }

    let result = PaymentResult {
        transaction_id: Some(
            request
                .transaction_id
                .unwrap_or_else(super::payments::generate_transaction_id),
        ),
        status: Some(request.status.unwrap_or_else(|| "paid".to_string())),
        update_time: Some(Utc::now().to_rfc3339()),
        method: Some(request.method.unwrap_or_else(|| order.payment_method.clone())),
        email: Some(user.email.clone()),
        confirmed_by: None,
    };

    let updated = sqlx::query_as::<_, Order>(&format!(
        "UPDATE orders
            SET is_paid = TRUE, paid_at = NOW(), payment_result = $2, updated_at = NOW()
          WHERE id = $1
          RETURNING {}",
        ORDER_COLUMNS
    ))
    .bind(id)
    .bind(SqlJson(&result))
    .fetch_one(&state.db)
    .await?;

    Ok(Json(OrderActionResponse {
        success: true,
        message: "Order marked as paid".to_string(),
        order: updated,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(price: i64, qty: i32) -> OrderItem {
        OrderItem {
            name: "item".to_string(),
            image: String::new(),
            price: Decimal::from(price),
            qty,
            product_id: Uuid::new_v4(),
        }
    }

    #[test]
    fn test_total_above_threshold_ships_free() {
        let (items, shipping, total) = price_breakdown(&[item(600, 1)]);
        assert_eq!(items, Decimal::from(600));
        assert_eq!(shipping, Decimal::ZERO);
        assert_eq!(total, Decimal::from(600));
    }

    #[test]
    fn test_total_below_threshold_pays_flat_fee() {
        let (items, shipping, total) = price_breakdown(&[item(200, 1)]);
        assert_eq!(items, Decimal::from(200));
        assert_eq!(shipping, Decimal::from(29));
        assert_eq!(total, Decimal::from(229));
    }

    #[test]
    fn test_threshold_boundary_ships_free() {
        let (_, shipping, total) = price_breakdown(&[item(500, 1)]);
        assert_eq!(shipping, Decimal::ZERO);
        assert_eq!(total, Decimal::from(500));
    }

    #[test]
    fn test_total_is_items_plus_shipping() {
        let items = vec![item(120, 2), item(80, 1)];
        let (items_price, shipping, total) = price_breakdown(&items);
        assert_eq!(items_price, Decimal::from(320));
        assert_eq!(total, items_price + shipping);
    }

    #[test]
    fn test_mobile_pattern() {
        assert!(MOBILE_RE.is_match("9876543210"));
        assert!(MOBILE_RE.is_match("6123456789"));
        assert!(!MOBILE_RE.is_match("5876543210"));
        assert!(!MOBILE_RE.is_match("987654321"));
        assert!(!MOBILE_RE.is_match("98765432101"));
        assert!(!MOBILE_RE.is_match("abcdefghij"));
    }
}
