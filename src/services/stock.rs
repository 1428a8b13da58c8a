//! Stock reservation against the catalog.
//!
//! Order creation decrements each line item's stock with a conditional
//! single-statement update; running every decrement inside one database
//! transaction makes the multi-item reservation all-or-nothing, so a
//! failed item (or a crash mid-way) leaves no partial reservation behind.

use rust_decimal::Decimal;
use sqlx::{Postgres, Transaction};
use uuid::Uuid;

use crate::error::{ApiError, ErrorCode, Result};
use crate::models::order::OrderItem;

/// A line item requested at checkout, before snapshotting.
#[derive(Debug, Clone)]
pub struct RequestedItem {
    pub product_id: Uuid,
    pub qty: i32,
}

#[derive(Debug, sqlx::FromRow)]
struct ReservedRow {
    name: String,
    image: String,
    price: Decimal,
}

#[derive(Debug, sqlx::FromRow)]
struct ShortfallRow {
    name: String,
    count_in_stock: i32,
}

/// Atomically decrement stock for every requested item, returning the
/// price/name/image snapshots captured by the same statements. Any
/// failure propagates an error; the caller's transaction rollback undoes
/// all prior decrements.
pub async fn reserve_stock(
    tx: &mut Transaction<'_, Postgres>,
    items: &[RequestedItem],
) -> Result<Vec<OrderItem>> {
    let mut snapshots = Vec::with_capacity(items.len());

    for item in items {
        let reserved = sqlx::query_as::<_, ReservedRow>(
            "UPDATE products
                SET count_in_stock = count_in_stock - $2,
                    stock_status = (CASE
                        WHEN count_in_stock - $2 <= 0 THEN 'out_of_stock'
                        WHEN count_in_stock - $2 <= low_stock_threshold THEN 'low_stock'
                        ELSE 'in_stock'
                    END)::stock_status,
                    updated_at = NOW()
              WHERE id = $1 AND is_active = TRUE AND count_in_stock >= $2
              RETURNING name, image, price",
        )
        .bind(item.product_id)
        .bind(item.qty)
        .fetch_optional(&mut **tx)
        .await?;

        match reserved {
            Some(row) => snapshots.push(OrderItem {
                name: row.name,
                image: row.image,
                price: row.price,
                qty: item.qty,
                product_id: item.product_id,
            }),
            None => {
                let shortfall = sqlx::query_as::<_, ShortfallRow>(
                    "SELECT name, count_in_stock FROM products WHERE id = $1 AND is_active = TRUE",
                )
                .bind(item.product_id)
                .fetch_optional(&mut **tx)
                .await?;

                return Err(match shortfall {
                    Some(product) => ApiError::with_code(
                        ErrorCode::InsufficientStock,
                        format!(
                            "Insufficient stock for {}: only {} left",
                            product.name, product.count_in_stock
                        ),
                    ),
                    None => {
                        ApiError::BadRequest(format!("Product not found: {}", item.product_id))
                    }
                });
            }
        }
    }

    Ok(snapshots)
}

/// Restore each line item's quantity to catalog stock (cancellation path).
pub async fn restore_stock(
    tx: &mut Transaction<'_, Postgres>,
    items: &[OrderItem],
) -> Result<()> {
    for item in items {
        sqlx::query(
            "UPDATE products
                SET count_in_stock = count_in_stock + $2,
                    stock_status = (CASE
                        WHEN count_in_stock + $2 <= 0 THEN 'out_of_stock'
                        WHEN count_in_stock + $2 <= low_stock_threshold THEN 'low_stock'
                        ELSE 'in_stock'
                    END)::stock_status,
                    updated_at = NOW()
              WHERE id = $1",
        )
        .bind(item.product_id)
        .bind(item.qty)
        .execute(&mut **tx)
        .await?;
    }

    Ok(())
}
