use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;
use uuid::Uuid;

use cartly_core::domain::order::{OrderDraft, OrderId, OrderStatus, OrderSummary};
use cartly_core::ports::{OrderStore, StorageFailure};

use super::{cents_to_decimal, decimal_to_cents, storage_failure};
use crate::DbPool;

pub struct SqlOrderStore {
    pool: DbPool,
}

impl SqlOrderStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn status_tag(status: &OrderStatus) -> &'static str {
    match status {
        OrderStatus::Pending => "pending",
        OrderStatus::Confirmed => "confirmed",
        OrderStatus::Shipped => "shipped",
        OrderStatus::Delivered => "delivered",
        OrderStatus::Cancelled => "cancelled",
    }
}

fn parse_status(raw: &str) -> Result<OrderStatus, StorageFailure> {
    match raw {
        "pending" => Ok(OrderStatus::Pending),
        "confirmed" => Ok(OrderStatus::Confirmed),
        "shipped" => Ok(OrderStatus::Shipped),
        "delivered" => Ok(OrderStatus::Delivered),
        "cancelled" => Ok(OrderStatus::Cancelled),
        other => Err(StorageFailure(format!("unknown order status `{other}`"))),
    }
}

#[async_trait]
impl OrderStore for SqlOrderStore {
    async fn create(&self, draft: OrderDraft) -> Result<OrderId, StorageFailure> {
        let order_id = OrderId(format!("ORD-{}", Uuid::new_v4()));
        let placed_at = Utc::now();

        // Order row and lines land in one transaction so a concurrent
        // reader never observes a headless order.
        let mut tx = self.pool.begin().await.map_err(storage_failure)?;

        sqlx::query(
            "INSERT INTO customer_order
                 (id, conversation_id, customer_name, phone, address,
                  delivery_fee_cents, total_cents, status, placed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        )
        .bind(&order_id.0)
        .bind(&draft.conversation_id)
        .bind(&draft.customer_name)
        .bind(&draft.phone)
        .bind(&draft.address)
        .bind(decimal_to_cents(draft.delivery_fee))
        .bind(decimal_to_cents(draft.total()))
        .bind(status_tag(&OrderStatus::Pending))
        .bind(placed_at.to_rfc3339())
        .execute(&mut *tx)
        .await
        .map_err(storage_failure)?;

        for line in &draft.lines {
            sqlx::query(
                "INSERT INTO order_line (order_id, product_id, variant, quantity, unit_price_cents)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )
            .bind(&order_id.0)
            .bind(&line.product_id.0)
            .bind(&line.variant)
            .bind(i64::from(line.quantity))
            .bind(decimal_to_cents(line.unit_price))
            .execute(&mut *tx)
            .await
            .map_err(storage_failure)?;
        }

        tx.commit().await.map_err(storage_failure)?;

        Ok(order_id)
    }

    async fn find_latest_by_phone(
        &self,
        phone: &str,
    ) -> Result<Option<OrderSummary>, StorageFailure> {
        let row = sqlx::query(
            "SELECT id, status, total_cents, placed_at
             FROM customer_order
             WHERE phone = ?1
             ORDER BY placed_at DESC
             LIMIT 1",
        )
        .bind(phone)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_failure)?;

        row.map(|row| {
            let status = parse_status(&row.get::<String, _>("status"))?;
            let placed_at = row
                .get::<String, _>("placed_at")
                .parse::<DateTime<Utc>>()
                .map_err(|error| StorageFailure(format!("bad order timestamp: {error}")))?;
            Ok(OrderSummary {
                id: OrderId(row.get("id")),
                status,
                total: cents_to_decimal(row.get::<i64, _>("total_cents")),
                placed_at,
            })
        })
        .transpose()
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use cartly_core::domain::order::{OrderDraft, OrderLine, OrderStatus};
    use cartly_core::domain::product::ProductId;
    use cartly_core::ports::OrderStore;

    use crate::{connect_with_settings, migrations};

    use super::SqlOrderStore;

    fn draft(phone: &str) -> OrderDraft {
        OrderDraft {
            conversation_id: "wa-1".to_string(),
            customer_name: "Rahim Uddin".to_string(),
            phone: phone.to_string(),
            address: "House 12, Road 5, Dhanmondi, Dhaka".to_string(),
            lines: vec![OrderLine {
                product_id: ProductId("shirt-classic".to_string()),
                variant: None,
                quantity: 2,
                unit_price: Decimal::new(79_900, 2),
            }],
            delivery_fee: Decimal::new(6_000, 2),
        }
    }

    async fn store() -> SqlOrderStore {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrate");
        SqlOrderStore::new(pool)
    }

    #[tokio::test]
    async fn create_then_find_latest_by_phone() {
        let store = store().await;
        let order_id = store.create(draft("01712345678")).await.expect("create");

        let summary = store
            .find_latest_by_phone("01712345678")
            .await
            .expect("lookup")
            .expect("order present");

        assert_eq!(summary.id, order_id);
        assert_eq!(summary.status, OrderStatus::Pending);
        assert_eq!(summary.total, Decimal::new(165_800, 2));
    }

    #[tokio::test]
    async fn unknown_phone_has_no_orders() {
        let store = store().await;
        store.create(draft("01712345678")).await.expect("create");

        let summary = store.find_latest_by_phone("01898765432").await.expect("lookup");
        assert!(summary.is_none());
    }
}
