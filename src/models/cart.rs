use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CartItem {
    pub product_id: Uuid,
    pub qty: i32,
}

/// Per-user singleton cart. Stored items are always deduplicated; the
/// total is derived at read time from current product prices.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Cart {
    pub id: Uuid,
    pub user_id: Uuid,
    pub items: Json<Vec<CartItem>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Coalesce line items referencing the same product, summing quantities.
/// Enforced on every save so stored state never carries duplicates.
pub fn merge_items(items: Vec<CartItem>) -> Vec<CartItem> {
    let mut merged: Vec<CartItem> = Vec::with_capacity(items.len());

    for item in items {
        match merged.iter_mut().find(|m| m.product_id == item.product_id) {
            Some(existing) => existing.qty += item.qty,
            None => merged.push(item),
        }
    }

    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: Uuid, qty: i32) -> CartItem {
        CartItem {
            product_id: id,
            qty,
        }
    }

    #[test]
    fn test_merge_sums_duplicate_products() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        let merged = merge_items(vec![item(a, 2), item(b, 1), item(a, 3)]);

        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].product_id, a);
        assert_eq!(merged[0].qty, 5);
        assert_eq!(merged[1].qty, 1);
    }

    #[test]
    fn test_merge_is_idempotent() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let once = merge_items(vec![item(a, 2), item(b, 4), item(a, 1)]);
        let twice = merge_items(once.clone());

        assert_eq!(once.len(), twice.len());
        for (x, y) in once.iter().zip(twice.iter()) {
            assert_eq!(x.product_id, y.product_id);
            assert_eq!(x.qty, y.qty);
        }
    }

    #[test]
    fn test_merge_empty() {
        assert!(merge_items(vec![]).is_empty());
    }
}
