//! Payment lifecycle handlers.
//!
//! Each initiation supersedes prior attempts for the order (at most one
//! active payment). Cash-on-delivery settles via the delivery flow only.

use axum::{
    Json,
    extract::{Path, State},
};
use chrono::Utc;
use rand::RngCore;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::types::Json as SqlJson;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::AppState;
use crate::auth::middleware::CurrentUser;
use crate::error::{ApiError, ErrorCode, Result};
use crate::models::order::{ORDER_COLUMNS, Order, PaymentMethod, PaymentResult};
use crate::models::payment::{PAYMENT_COLUMNS, Payment, PaymentStatus};
use crate::services::email::templates;
use crate::services::outbox::{self, NotificationKind};

#[derive(Debug, Deserialize, ToSchema)]
pub struct CardDetails {
    pub number: String,
    pub expiry: String,
    pub cvv: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct InitiatePaymentRequest {
    pub order_id: Uuid,
    pub amount: Decimal,
    pub method: String,
    pub card_details: Option<CardDetails>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct InitiatePaymentResponse {
    pub success: bool,
    pub payment_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qr_payload: Option<String>,
    pub status: String,
    pub amount: Decimal,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PaymentStatusResponse {
    pub success: bool,
    pub status: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ConfirmPaymentResponse {
    pub success: bool,
    pub payment_status: String,
}

pub fn generate_transaction_id() -> String {
    let mut bytes = [0u8; 8];
    rand::thread_rng().fill_bytes(&mut bytes);
    format!("TXN-{}", hex::encode_upper(bytes))
}

/// UPI payment URI carried in the QR payload; rasterization is client-side.
fn upi_payment_uri(upi_id: &str, payee_name: &str, amount: Decimal, order_id: Uuid) -> String {
    format!(
        "upi://pay?pa={}&pn={}&am={}&cu=INR&tn=Order{}",
        upi_id,
        payee_name.replace(' ', "%20"),
        amount,
        order_id.simple()
    )
}

async fn fetch_active_payment(state: &AppState, order_id: Uuid) -> Result<Option<Payment>> {
    let payment = sqlx::query_as::<_, Payment>(&format!(
        "SELECT {} FROM payments WHERE order_id = $1 AND active = TRUE",
        PAYMENT_COLUMNS
    ))
    .bind(order_id)
    .fetch_optional(&state.db)
    .await?;

    Ok(payment)
}

/// POST /api/payments/initiate
#[utoipa::path(
    post,
    path = "/api/payments/initiate",
    tag = "payments",
    request_body = InitiatePaymentRequest,
    responses(
        (status = 200, description = "Payment attempt created", body = InitiatePaymentResponse),
        (status = 400, description = "Amount mismatch, bad method or card details"),
        (status = 404, description = "Unknown order")
    )
)]
pub async fn initiate_payment(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(request): Json<InitiatePaymentRequest>,
) -> Result<Json<InitiatePaymentResponse>> {
    let order = sqlx::query_as::<_, Order>(&format!(
        "SELECT {} FROM orders WHERE id = $1",
        ORDER_COLUMNS
    ))
    .bind(request.order_id)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| ApiError::not_found("Order"))?;

    if order.total_price != request.amount {
        return Err(ApiError::with_code(
            ErrorCode::AmountMismatch,
            "Amount mismatch with order total",
        ));
    }

    let method: PaymentMethod = request
        .method
        .parse()
        .map_err(|_| ApiError::BadRequest("Invalid payment method".into()))?;

    let mut qr_payload = None;
    let mut card_last4 = None;
    let mut status = PaymentStatus::Pending;

    match method {
        PaymentMethod::Qr => {
            qr_payload = Some(upi_payment_uri(
                &state.config.payment.upi_id,
                &state.config.payment.payee_name,
                request.amount,
                order.id,
            ));
        }
        PaymentMethod::Card => {
            let details = request
                .card_details
                .as_ref()
                .filter(|d| !d.number.is_empty() && !d.expiry.is_empty() && !d.cvv.is_empty())
                .ok_or_else(|| {
                    ApiError::BadRequest("Invalid or incomplete card details".into())
                })?;

            let digits: String = details.number.chars().filter(|c| c.is_ascii_digit()).collect();
            if digits.len() < 4 {
                return Err(ApiError::BadRequest("Invalid or incomplete card details".into()));
            }
            // Only the last four digits are ever stored.
            card_last4 = Some(digits[digits.len() - 4..].to_string());
        }
        PaymentMethod::Cod => {
            status = PaymentStatus::CodPending;
        }
    }

    let mut tx = state.db.begin().await?;

    // At-most-one-active-payment-per-order: older attempts stay for audit.
    sqlx::query("UPDATE payments SET active = FALSE, updated_at = NOW() WHERE order_id = $1")
        .bind(order.id)
        .execute(&mut *tx)
        .await?;

    let payment = sqlx::query_as::<_, Payment>(&format!(
        "INSERT INTO payments
            (id, order_id, user_id, amount, method, status, qr_payload, card_last4)
         VALUES ($1, $2, $3, $4, ($5)::payment_method, ($6)::payment_status, $7, $8)
         RETURNING {}",
        PAYMENT_COLUMNS
    ))
    .bind(Uuid::new_v4())
    .bind(order.id)
    .bind(order.user_id)
    .bind(request.amount)
    .bind(method.as_str())
    .bind(status.as_str())
    .bind(&qr_payload)
    .bind(&card_last4)
    .fetch_one(&mut *tx)
    .await?;

    // COD needs no upfront settlement: the order is confirmed immediately.
    if method == PaymentMethod::Cod {
        sqlx::query(
            "UPDATE orders
                SET payment_method = 'cod',
                    status = (CASE WHEN status = 'Pending' THEN 'Processing'::order_status
                                   ELSE status END),
                    updated_at = NOW()
              WHERE id = $1",
        )
        .bind(order.id)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    if method == PaymentMethod::Cod {
        let content =
            templates::order_confirmation_email(&state.config.theme, &user.name, &order);
        outbox::enqueue_best_effort(
            &state.db,
            &user.email,
            NotificationKind::OrderConfirmation,
            &content,
            Some(order.id),
        )
        .await;
    }

    Ok(Json(InitiatePaymentResponse {
        success: true,
        payment_id: payment.id,
        qr_payload: payment.qr_payload,
        status: payment.status,
        amount: payment.amount,
    }))
}

/// GET /api/payments/verify/{orderId} - status of the active attempt.
pub async fn verify_payment(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(order_id): Path<Uuid>,
) -> Result<Json<PaymentStatusResponse>> {
    let payment = fetch_active_payment(&state, order_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("No active payment found".into()))?;

    Ok(Json(PaymentStatusResponse {
        success: true,
        status: payment.status,
    }))
}

/// POST /api/payments/confirm/{orderId}
///
/// Idempotent-guarded: paid and failed attempts are rejected, and COD can
/// only be resolved by the delivery flow.
#[utoipa::path(
    post,
    path = "/api/payments/confirm/{orderId}",
    tag = "payments",
    params(("orderId" = Uuid, Path, description = "Order id")),
    responses(
        (status = 200, description = "Payment confirmed", body = ConfirmPaymentResponse),
        (status = 400, description = "Attempt already resolved or COD"),
        (status = 404, description = "No active payment")
    )
)]
pub async fn confirm_payment(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(order_id): Path<Uuid>,
) -> Result<Json<ConfirmPaymentResponse>> {
    let payment = fetch_active_payment(&state, order_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Payment"))?;

    match payment.status.parse::<PaymentStatus>() {
        Ok(PaymentStatus::Paid) => {
            return Err(ApiError::with_code(
                ErrorCode::PaymentAlreadyConfirmed,
                "Payment already confirmed",
            ));
        }
        Ok(PaymentStatus::Failed) => {
            return Err(ApiError::BadRequest(
                "Payment failed, please initiate a new payment".into(),
            ));
        }
        Ok(PaymentStatus::CodPending) => {
            return Err(ApiError::BadRequest(
                "COD payment confirmed after delivery only".into(),
            ));
        }
        Ok(PaymentStatus::Pending) => {}
        Err(e) => return Err(ApiError::Internal(e)),
    }

    let transaction_id = generate_transaction_id();

    let mut tx = state.db.begin().await?;

    sqlx::query(
        "UPDATE payments SET status = 'paid', transaction_id = $2, updated_at = NOW()
          WHERE id = $1",
    )
    .bind(payment.id)
    .bind(&transaction_id)
    .execute(&mut *tx)
    .await?;

    let result = PaymentResult {
        transaction_id: Some(transaction_id.clone()),
        status: Some("paid".to_string()),
        update_time: Some(Utc::now().to_rfc3339()),
        method: Some(payment.method.clone()),
        email: Some(user.email.clone()),
        confirmed_by: None,
    };

    let order = sqlx::query_as::<_, Order>(&format!(
        "UPDATE orders
            SET is_paid = TRUE, paid_at = NOW(), payment_result = $2,
                payment_method = ($3)::payment_method,
                status = (CASE WHEN status = 'Pending' THEN 'Processing'::order_status
                               ELSE status END),
                updated_at = NOW()
          WHERE id = $1
          RETURNING {}",
        ORDER_COLUMNS
    ))
    .bind(order_id)
    .bind(SqlJson(&result))
    .bind(&payment.method)
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

    Ok(Json(ConfirmPaymentResponse {
        success: true,
        payment_status: "paid".to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transaction_id_shape() {
        let id = generate_transaction_id();
        assert!(id.starts_with("TXN-"));
        assert_eq!(id.len(), 4 + 16);
        assert!(id[4..].chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_upi_uri_encodes_amount_and_reference() {
        let order_id = Uuid::new_v4();
        let uri = upi_payment_uri("pay@bank", "My Store", Decimal::new(22900, 2), order_id);

        assert!(uri.starts_with("upi://pay?pa=pay@bank"));
        assert!(uri.contains("pn=My%20Store"));
        assert!(uri.contains("am=229.00"));
        assert!(uri.contains(&format!("tn=Order{}", order_id.simple())));
    }
}
