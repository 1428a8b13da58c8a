//! Delivery-partner console: assigned orders, delivery marking (with COD
//! auto-settlement and the archival projection), and manual COD collection.

use axum::{
    Json,
    extract::{Path, State},
};
use serde::Serialize;
use sqlx::types::Json as SqlJson;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::AppState;
use crate::auth::middleware::CurrentUser;
use crate::auth::roles::authorize;
use crate::error::{ApiError, ErrorCode, Result};
use crate::models::delivered_order::{CustomerSnapshot, PartnerSnapshot};
use crate::models::order::{ORDER_COLUMNS, Order, PaymentMethod, PaymentResult};
use crate::models::user::USER_COLUMNS;
use crate::models::User;
use crate::services::email::templates;
use crate::services::outbox::{self, NotificationKind};

use super::orders::OrderActionResponse;

#[derive(Debug, Serialize, ToSchema)]
pub struct AssignedOrder {
    #[serde(flatten)]
    pub order: Order,
    pub customer: CustomerSnapshot,
}

async fn fetch_customer(state: &AppState, user_id: Uuid) -> Result<User> {
    sqlx::query_as::<_, User>(&format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS))
        .bind(user_id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| ApiError::not_found("User"))
}

/// GET /api/delivery/my-orders
pub async fn my_assigned_orders(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<Vec<AssignedOrder>>> {
    authorize(user.role, "delivery", "read-assigned")?;

    let orders = sqlx::query_as::<_, Order>(&format!(
        "SELECT {} FROM orders WHERE assigned_to = $1 ORDER BY created_at DESC",
        ORDER_COLUMNS
    ))
    .bind(user.id)
    .fetch_all(&state.db)
    .await?;

    let mut assigned = Vec::with_capacity(orders.len());
    for order in orders {
        let customer = fetch_customer(&state, order.user_id).await?;
        assigned.push(AssignedOrder {
            customer: CustomerSnapshot {
                id: customer.id,
                name: customer.name,
                email: customer.email,
                phone: customer.phone,
            },
            order,
        });
    }

    Ok(Json(assigned))
}

fn cod_payment_result(partner_name: &str) -> PaymentResult {
    PaymentResult {
        transaction_id: None,
        status: Some("paid".to_string()),
        update_time: Some(chrono::Utc::now().to_rfc3339()),
        method: Some("COD".to_string()),
        email: None,
        confirmed_by: Some(partner_name.to_string()),
    }
}

/// PUT /api/delivery/{id}/deliver (also mounted under /api/orders).
///
/// Only the assigned partner may deliver. COD orders are settled in the
/// same statement, and a denormalized archive row is written for
/// reporting before the customer is notified.
pub async fn deliver_order(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<OrderActionResponse>> {
    authorize(user.role, "delivery", "deliver")?;

    let mut tx = state.db.begin().await?;

    let order = sqlx::query_as::<_, Order>(&format!(
        "SELECT {} FROM orders WHERE id = $1 FOR UPDATE",
        ORDER_COLUMNS
    ))
    .bind(id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| ApiError::not_found("Order"))?;

    if order.assigned_to != Some(user.id) {
        return Err(ApiError::Forbidden(
            "You are not assigned to this order".into(),
        ));
    }
    if order.is_delivered {
        return Err(ApiError::with_code(
            ErrorCode::OrderAlreadyDelivered,
            "Order already delivered",
        ));
    }

    let settle_cod = order.payment_method == PaymentMethod::Cod.as_str() && !order.is_paid;

    let updated = if settle_cod {
        sqlx::query_as::<_, Order>(&format!(
            "UPDATE orders
                SET is_delivered = TRUE, delivered_at = NOW(), status = 'Delivered',
                    delivery_stage = 4, delay_message = FALSE,
                    is_paid = TRUE, paid_at = NOW(), payment_result = $2,
                    updated_at = NOW()
              WHERE id = $1
              RETURNING {}",
            ORDER_COLUMNS
        ))
        .bind(id)
        .bind(SqlJson(&cod_payment_result(&user.name)))
        .fetch_one(&mut *tx)
        .await?
    } else {
        sqlx::query_as::<_, Order>(&format!(
            "UPDATE orders
                SET is_delivered = TRUE, delivered_at = NOW(), status = 'Delivered',
                    delivery_stage = 4, delay_message = FALSE, updated_at = NOW()
              WHERE id = $1
              RETURNING {}",
            ORDER_COLUMNS
        ))
        .bind(id)
        .fetch_one(&mut *tx)
        .await?
    };

    let customer = sqlx::query_as::<_, User>(&format!(
        "SELECT {} FROM users WHERE id = $1",
        USER_COLUMNS
    ))
    .bind(updated.user_id)
    .fetch_one(&mut *tx)
    .await?;

    sqlx::query(
        "INSERT INTO delivered_orders
            (id, original_order_id, customer, items, shipping_address, mobile,
             payment_method, items_price, shipping_price, total_price, delivered_at,
             assigned_partner, payment_result, delivery_stage)
         VALUES ($1, $2, $3, $4, $5, $6, ($7)::payment_method, $8, $9, $10, NOW(), $11, $12, 4)",
    )
    .bind(Uuid::new_v4())
    .bind(updated.id)
    .bind(SqlJson(&CustomerSnapshot {
        id: customer.id,
        name: customer.name.clone(),
        email: customer.email.clone(),
        phone: customer.phone.clone(),
    }))
    .bind(&updated.items)
    .bind(&updated.shipping_address)
    .bind(&updated.mobile)
    .bind(&updated.payment_method)
    .bind(updated.items_price)
    .bind(updated.shipping_price)
    .bind(updated.total_price)
    .bind(SqlJson(&PartnerSnapshot {
        id: user.id,
        name: user.name.clone(),
        email: user.email.clone(),
    }))
    .bind(&updated.payment_result)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    let content = templates::order_delivered_email(&state.config.theme, &customer.name, &updated);
    outbox::enqueue_best_effort(
        &state.db,
        &customer.email,
        NotificationKind::OrderDelivered,
        &content,
        Some(updated.id),
    )
    .await;

    let message = if settle_cod {
        "Order delivered and COD payment collected."
    } else {
        "Order delivered successfully."
    };

    Ok(Json(OrderActionResponse {
        success: true,
        message: message.to_string(),
        order: updated,
    }))
}

/// PUT /api/delivery/{id}/mark-paid
///
/// Lets the assigned partner settle a COD order collected before the
/// delivery itself is marked.
pub async fn mark_cod_paid(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<OrderActionResponse>> {
    authorize(user.role, "delivery", "collect-cod")?;

    let order = super::orders::fetch_order(&state, id).await?;

    if order.assigned_to != Some(user.id) {
        return Err(ApiError::Forbidden(
            "This order is not assigned to you".into(),
        ));
    }
    if order.payment_method != PaymentMethod::Cod.as_str() {
        return Err(ApiError::BadRequest(
            "Only COD payments can be confirmed manually".into(),
        ));
    }
    if order.is_paid {
        return Err(ApiError::BadRequest("Order already marked as paid".into()));
    }

    let updated = sqlx::query_as::<_, Order>(&format!(
        "UPDATE orders
            SET is_paid = TRUE, paid_at = NOW(), payment_result = $2, updated_at = NOW()
          WHERE id = $1
          RETURNING {}",
        ORDER_COLUMNS
    ))
    .bind(id)
    .bind(SqlJson(&cod_payment_result(&user.name)))
    .fetch_one(&state.db)
    .await?;

    Ok(Json(OrderActionResponse {
        success: true,
        message: "COD payment confirmed successfully.".to_string(),
        order: updated,
    }))
}
