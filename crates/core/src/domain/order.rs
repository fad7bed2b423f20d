use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::product::ProductId;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Shipped,
    Delivered,
    Cancelled,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrderLine {
    pub product_id: ProductId,
    pub variant: Option<String>,
    pub quantity: u32,
    pub unit_price: Decimal,
}

impl OrderLine {
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// Everything needed to create an order row. Built by the Orchestrator from
/// a validated `CreateOrder` decision; customer fields are guaranteed present
/// by the Action Validator before a draft is ever constructed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrderDraft {
    pub conversation_id: String,
    pub customer_name: String,
    pub phone: String,
    pub address: String,
    pub lines: Vec<OrderLine>,
    pub delivery_fee: Decimal,
}

impl OrderDraft {
    pub fn subtotal(&self) -> Decimal {
        self.lines.iter().map(OrderLine::line_total).sum()
    }

    pub fn total(&self) -> Decimal {
        self.subtotal() + self.delivery_fee
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrderSummary {
    pub id: OrderId,
    pub status: OrderStatus,
    pub total: Decimal,
    pub placed_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use crate::domain::product::ProductId;

    use super::{OrderDraft, OrderLine};

    #[test]
    fn draft_total_includes_delivery_fee() {
        let draft = OrderDraft {
            conversation_id: "c-1".to_string(),
            customer_name: "Rahim Uddin".to_string(),
            phone: "01712345678".to_string(),
            address: "House 12, Road 5, Dhanmondi, Dhaka".to_string(),
            lines: vec![
                OrderLine {
                    product_id: ProductId("shirt-classic".to_string()),
                    variant: None,
                    quantity: 2,
                    unit_price: Decimal::new(79_900, 2),
                },
                OrderLine {
                    product_id: ProductId("cap-plain".to_string()),
                    variant: Some("black".to_string()),
                    quantity: 1,
                    unit_price: Decimal::new(24_900, 2),
                },
            ],
            delivery_fee: Decimal::new(6_000, 2),
        };

        assert_eq!(draft.subtotal(), Decimal::new(184_700, 2));
        assert_eq!(draft.total(), Decimal::new(190_700, 2));
    }
}
