use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

pub const PRODUCT_COLUMNS: &str = "id, external_id, name, image, brand, category, description, \
     price, count_in_stock, low_stock_threshold, stock_status::text AS stock_status, is_active, \
     created_at, updated_at";

#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
pub struct Product {
    pub id: Uuid,
    pub external_id: String,
    pub name: String,
    pub image: String,
    pub brand: Option<String>,
    pub category: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub count_in_stock: i32,
    pub low_stock_threshold: i32,
    pub stock_status: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Derived availability band, recomputed on every stock write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum StockStatus {
    InStock,
    LowStock,
    OutOfStock,
}

impl StockStatus {
    pub fn for_count(count_in_stock: i32, low_stock_threshold: i32) -> Self {
        if count_in_stock <= 0 {
            StockStatus::OutOfStock
        } else if count_in_stock <= low_stock_threshold {
            StockStatus::LowStock
        } else {
            StockStatus::InStock
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StockStatus::InStock => "in_stock",
            StockStatus::LowStock => "low_stock",
            StockStatus::OutOfStock => "out_of_stock",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stock_status_bands() {
        assert_eq!(StockStatus::for_count(0, 5), StockStatus::OutOfStock);
        assert_eq!(StockStatus::for_count(3, 5), StockStatus::LowStock);
        assert_eq!(StockStatus::for_count(5, 5), StockStatus::LowStock);
        assert_eq!(StockStatus::for_count(6, 5), StockStatus::InStock);
    }
}
