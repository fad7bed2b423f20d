use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProductId(pub String);

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProductVariant {
    pub name: String,
    pub stock: u32,
    pub unit_price: Decimal,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProductSummary {
    pub id: ProductId,
    pub name: String,
    pub unit_price: Decimal,
    pub stock: u32,
    pub variants: Vec<ProductVariant>,
    pub active: bool,
}

impl ProductSummary {
    /// Stock available for the requested variant, or the base product when
    /// no variant is named. An unknown variant name has zero stock.
    pub fn available_stock(&self, variant: Option<&str>) -> u32 {
        match variant {
            None => self.stock,
            Some(name) => self
                .variants
                .iter()
                .find(|candidate| candidate.name.eq_ignore_ascii_case(name))
                .map(|candidate| candidate.stock)
                .unwrap_or(0),
        }
    }

    pub fn price_for(&self, variant: Option<&str>) -> Option<Decimal> {
        match variant {
            None => Some(self.unit_price),
            Some(name) => self
                .variants
                .iter()
                .find(|candidate| candidate.name.eq_ignore_ascii_case(name))
                .map(|candidate| candidate.unit_price),
        }
    }

    pub fn has_variant(&self, variant: &str) -> bool {
        self.variants.iter().any(|candidate| candidate.name.eq_ignore_ascii_case(variant))
    }
}
