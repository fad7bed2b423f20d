//! Seed data for local development and integration tests. The dataset is a
//! small catalog with enough variety to exercise stock checks, variants,
//! and delivery-fee math end to end.

use serde_json::json;

use crate::repositories::storage_failure;
use crate::DbPool;

use cartly_core::ports::StorageFailure;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SeedSummary {
    pub products_inserted: u32,
}

pub async fn seed_products(pool: &DbPool) -> Result<SeedSummary, StorageFailure> {
    let catalog = [
        (
            "shirt-classic",
            "Classic Shirt",
            79_900_i64,
            12_i64,
            json!([
                { "name": "red / L", "stock": 3, "unit_price_cents": 84_900 },
                { "name": "blue / M", "stock": 5, "unit_price_cents": 79_900 }
            ]),
        ),
        (
            "saree-jamdani",
            "Jamdani Saree",
            450_000_i64,
            4_i64,
            json!([]),
        ),
        (
            "cap-plain",
            "Plain Cap",
            24_900_i64,
            30_i64,
            json!([
                { "name": "black", "stock": 18, "unit_price_cents": 24_900 },
                { "name": "white", "stock": 12, "unit_price_cents": 24_900 }
            ]),
        ),
    ];

    let mut inserted = 0u32;
    for (id, name, unit_price_cents, stock, variants) in catalog {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO product (id, name, unit_price_cents, stock, variants, active)
             VALUES (?1, ?2, ?3, ?4, ?5, 1)",
        )
        .bind(id)
        .bind(name)
        .bind(unit_price_cents)
        .bind(stock)
        .bind(variants.to_string())
        .execute(pool)
        .await
        .map_err(storage_failure)?;

        inserted += result.rows_affected() as u32;
    }

    Ok(SeedSummary { products_inserted: inserted })
}
