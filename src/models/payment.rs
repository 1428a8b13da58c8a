use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

pub const PAYMENT_COLUMNS: &str = "id, order_id, user_id, amount, method::text AS method, \
     status::text AS status, transaction_id, qr_payload, card_last4, active, created_at, \
     updated_at";

/// A payment attempt. Only the most recent attempt per order is active;
/// older ones are retained for audit with active = false.
#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
pub struct Payment {
    pub id: Uuid,
    pub order_id: Uuid,
    pub user_id: Uuid,
    pub amount: Decimal,
    pub method: String,
    pub status: String,
    pub transaction_id: Option<String>,
    pub qr_payload: Option<String>,
    pub card_last4: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
    CodPending,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Failed => "failed",
            PaymentStatus::CodPending => "cod_pending",
        }
    }
}

impl std::str::FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PaymentStatus::Pending),
            "paid" => Ok(PaymentStatus::Paid),
            "failed" => Ok(PaymentStatus::Failed),
            "cod_pending" => Ok(PaymentStatus::CodPending),
            other => Err(format!("Invalid payment status: {}", other)),
        }
    }
}
