//! Product catalog synchronization from the external source.

use anyhow::{Context, Result};
use rand::Rng;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

use crate::models::StockStatus;

/// External catalog record as served by the upstream product source.
#[derive(Debug, Deserialize)]
pub struct ExternalProduct {
    pub id: ExternalId,
    pub title: String,
    #[serde(default)]
    pub image: String,
    pub category: String,
    #[serde(default)]
    pub description: String,
    pub price: f64,
}

/// The upstream serves numeric ids; admins key manual entries by string.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ExternalId {
    Num(u64),
    Str(String),
}

impl std::fmt::Display for ExternalId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExternalId::Num(n) => write!(f, "{}", n),
            ExternalId::Str(s) => write!(f, "{}", s),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct SyncOutcome {
    pub new_count: u32,
    pub updated_count: u32,
}

/// Pulls the upstream catalog and upserts it by external id.
#[derive(Clone)]
pub struct CatalogSyncService {
    client: Client,
    source_url: String,
}

impl CatalogSyncService {
    pub fn new(source_url: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(20))
            .build()
            .unwrap_or_default();

        Self { client, source_url }
    }

    /// Fetch the upstream catalog listing.
    pub async fn fetch(&self) -> Result<Vec<ExternalProduct>> {
        self.client
            .get(&self.source_url)
            .send()
            .await
            .context("Catalog source request failed")?
            .error_for_status()
            .context("Catalog source returned an error status")?
            .json()
            .await
            .context("Catalog source returned invalid JSON")
    }

    pub async fn sync(&self, db: &PgPool) -> Result<SyncOutcome> {
        let products = self.fetch().await?;

        let mut outcome = SyncOutcome::default();

        for item in products {
            let external_id = item.id.to_string();
            let price = Decimal::from_f64_retain(item.price)
                .unwrap_or_default()
                .round_dp(2);

            let existing: Option<Uuid> =
                sqlx::query_scalar("SELECT id FROM products WHERE external_id = $1")
                    .bind(&external_id)
                    .fetch_optional(db)
                    .await?;

            match existing {
                Some(id) => {
                    // Stock is owned locally; the source only refreshes the listing.
                    sqlx::query(
                        "UPDATE products
                            SET name = $2, image = $3, brand = $4, category = $5,
                                description = $6, price = $7, updated_at = NOW()
                          WHERE id = $1",
                    )
                    .bind(id)
                    .bind(&item.title)
                    .bind(&item.image)
                    .bind("Generic")
                    .bind(&item.category)
                    .bind(&item.description)
                    .bind(price)
                    .execute(db)
                    .await?;
                    outcome.updated_count += 1;
                }
                None => {
                    // The source carries no stock levels; seed new rows with
                    // a randomized 1-20 count.
                    let count_in_stock: i32 = rand::thread_rng().gen_range(1..=20);
                    let status = StockStatus::for_count(count_in_stock, 5);

                    sqlx::query(
                        "INSERT INTO products
                            (id, external_id, name, image, brand, category, description,
                             price, count_in_stock, stock_status)
                         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, ($10)::stock_status)",
                    )
                    .bind(Uuid::new_v4())
                    .bind(&external_id)
                    .bind(&item.title)
                    .bind(&item.image)
                    .bind("Generic")
                    .bind(&item.category)
                    .bind(&item.description)
                    .bind(price)
                    .bind(count_in_stock)
                    .bind(status.as_str())
                    .execute(db)
                    .await?;
                    outcome.new_count += 1;
                }
            }
        }

        info!(
            "Catalog sync completed: {} new, {} updated",
            outcome.new_count, outcome.updated_count
        );

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_external_id_accepts_numbers_and_strings() {
        let numeric: ExternalProduct =
            serde_json::from_str(r#"{"id": 7, "title": "Lamp", "category": "home", "price": 9.5}"#)
                .unwrap();
        assert_eq!(numeric.id.to_string(), "7");

        let string: ExternalProduct = serde_json::from_str(
            r#"{"id": "SKU-9", "title": "Lamp", "category": "home", "price": 9.5}"#,
        )
        .unwrap();
        assert_eq!(string.id.to_string(), "SKU-9");
    }
}
