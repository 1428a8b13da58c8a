use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use utoipa::ToSchema;
use uuid::Uuid;

pub const ORDER_COLUMNS: &str = "id, user_id, items, shipping_address, mobile, \
     payment_method::text AS payment_method, items_price, shipping_price, total_price, \
     is_paid, paid_at, payment_result, is_delivered, delivered_at, status::text AS status, \
     assigned_to, expected_delivery_date, delivery_stage, delay_message, is_canceled, \
     cancel_reason, canceled_at, created_at, updated_at";

/// Snapshot of an ordered line item, fixed at order creation time.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderItem {
    pub name: String,
    pub image: String,
    pub price: Decimal,
    pub qty: i32,
    pub product_id: Uuid,
}

/// Payment confirmation details attached to a paid order.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct PaymentResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confirmed_by: Option<String>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
pub struct Order {
    pub id: Uuid,
    pub user_id: Uuid,
    #[schema(value_type = Vec<OrderItem>)]
    pub items: Json<Vec<OrderItem>>,
    pub shipping_address: String,
    pub mobile: String,
    pub payment_method: String,
    pub items_price: Decimal,
    pub shipping_price: Decimal,
    pub total_price: Decimal,
    pub is_paid: bool,
    pub paid_at: Option<DateTime<Utc>>,
    #[schema(value_type = Option<PaymentResult>)]
    pub payment_result: Option<Json<PaymentResult>>,
    pub is_delivered: bool,
    pub delivered_at: Option<DateTime<Utc>>,
    pub status: String,
    pub assigned_to: Option<Uuid>,
    pub expected_delivery_date: Option<DateTime<Utc>>,
    pub delivery_stage: i32,
    pub delay_message: bool,
    pub is_canceled: bool,
    pub cancel_reason: String,
    pub canceled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Coarse delivery status, authoritative unlike the derived stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum OrderStatus {
    Pending,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "Pending",
            OrderStatus::Processing => "Processing",
            OrderStatus::Shipped => "Shipped",
            OrderStatus::Delivered => "Delivered",
            OrderStatus::Cancelled => "Cancelled",
        }
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(OrderStatus::Pending),
            "Processing" => Ok(OrderStatus::Processing),
            "Shipped" => Ok(OrderStatus::Shipped),
            "Delivered" => Ok(OrderStatus::Delivered),
            "Cancelled" => Ok(OrderStatus::Cancelled),
            other => Err(format!("Invalid order status: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Cod,
    Qr,
    Card,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cod => "cod",
            PaymentMethod::Qr => "qr",
            PaymentMethod::Card => "card",
        }
    }
}

impl std::str::FromStr for PaymentMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cod" => Ok(PaymentMethod::Cod),
            "qr" => Ok(PaymentMethod::Qr),
            "card" => Ok(PaymentMethod::Card),
            other => Err(format!("Invalid payment method: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_order_status_round_trip() {
        for status in [
            OrderStatus::Pending,
            OrderStatus::Processing,
            OrderStatus::Shipped,
            OrderStatus::Delivered,
            OrderStatus::Cancelled,
        ] {
            assert_eq!(OrderStatus::from_str(status.as_str()).unwrap(), status);
        }
        assert!(OrderStatus::from_str("pending").is_err());
    }

    #[test]
    fn test_payment_method_parse_is_case_insensitive() {
        assert_eq!(PaymentMethod::from_str("COD").unwrap(), PaymentMethod::Cod);
        assert_eq!(PaymentMethod::from_str("qr").unwrap(), PaymentMethod::Qr);
        assert!(PaymentMethod::from_str("wire").is_err());
    }
}
