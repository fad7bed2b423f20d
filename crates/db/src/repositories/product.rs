use async_trait::async_trait;
use sqlx::Row;

use cartly_core::domain::product::{ProductId, ProductSummary, ProductVariant};
use cartly_core::ports::{ProductLookup, StorageFailure};

use super::{cents_to_decimal, storage_failure};
use crate::DbPool;

pub struct SqlProductLookup {
    pool: DbPool,
}

impl SqlProductLookup {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn summary_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<ProductSummary, StorageFailure> {
    let variants_raw: String = row.get("variants");
    let variants: Vec<StoredVariant> = serde_json::from_str(&variants_raw)
        .map_err(|error| StorageFailure(format!("variant decode failed: {error}")))?;

    Ok(ProductSummary {
        id: ProductId(row.get("id")),
        name: row.get("name"),
        unit_price: cents_to_decimal(row.get::<i64, _>("unit_price_cents")),
        stock: row.get::<i64, _>("stock").max(0) as u32,
        variants: variants
            .into_iter()
            .map(|variant| ProductVariant {
                name: variant.name,
                stock: variant.stock,
                unit_price: cents_to_decimal(variant.unit_price_cents),
            })
            .collect(),
        active: row.get::<i64, _>("active") != 0,
    })
}

#[derive(serde::Serialize, serde::Deserialize)]
pub(crate) struct StoredVariant {
    pub name: String,
    pub stock: u32,
    pub unit_price_cents: i64,
}

#[async_trait]
impl ProductLookup for SqlProductLookup {
    async fn search(&self, query: &str) -> Result<Vec<ProductSummary>, StorageFailure> {
        let trimmed = query.trim();
        let rows = if trimmed.is_empty() {
            sqlx::query(
                "SELECT id, name, unit_price_cents, stock, variants, active
                 FROM product WHERE active = 1 ORDER BY name",
            )
            .fetch_all(&self.pool)
            .await
        } else {
            sqlx::query(
                "SELECT id, name, unit_price_cents, stock, variants, active
                 FROM product WHERE active = 1 AND name LIKE ?1 ORDER BY name",
            )
            .bind(format!("%{trimmed}%"))
            .fetch_all(&self.pool)
            .await
        }
        .map_err(storage_failure)?;

        rows.iter().map(summary_from_row).collect()
    }

    async fn find(&self, id: &ProductId) -> Result<Option<ProductSummary>, StorageFailure> {
        let row = sqlx::query(
            "SELECT id, name, unit_price_cents, stock, variants, active
             FROM product WHERE id = ?1",
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_failure)?;

        row.as_ref().map(summary_from_row).transpose()
    }
}
