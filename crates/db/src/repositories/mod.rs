use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use cartly_core::ports::StorageFailure;

pub mod conversation;
pub mod memory;
pub mod order;
pub mod product;

pub use conversation::SqlConversationStore;
pub use memory::{InMemoryConversationStore, InMemoryOrderStore, InMemoryProductLookup};
pub use order::SqlOrderStore;
pub use product::SqlProductLookup;

pub(crate) fn storage_failure(error: sqlx::Error) -> StorageFailure {
    StorageFailure(error.to_string())
}

pub(crate) fn cents_to_decimal(cents: i64) -> Decimal {
    Decimal::new(cents, 2)
}

pub(crate) fn decimal_to_cents(value: Decimal) -> i64 {
    (value * Decimal::new(100, 0)).round().to_i64().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::{cents_to_decimal, decimal_to_cents};

    #[test]
    fn cents_round_trip() {
        let price = Decimal::new(79_900, 2);
        assert_eq!(decimal_to_cents(price), 79_900);
        assert_eq!(cents_to_decimal(79_900), price);
    }
}
