use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Represents a single price level in the order book
///
/// `count` is set by aggregated feeds that report the number of orders at a
/// level, `order_id` by order-level (L3) feeds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceLevel {
    pub price: Decimal,
    pub quantity: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
}

impl PriceLevel {
    pub fn new(price: Decimal, quantity: Decimal) -> Self {
        PriceLevel {
            price,
            quantity,
            count: None,
            order_id: None,
        }
    }

    pub fn with_count(mut self, count: u32) -> Self {
        self.count = Some(count);
        self
    }

    pub fn with_order_id(mut self, id: impl Into<String>) -> Self {
        self.order_id = Some(id.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.quantity.is_zero()
    }
}

impl From<(Decimal, Decimal)> for PriceLevel {
    fn from((price, quantity): (Decimal, Decimal)) -> Self {
        PriceLevel::new(price, quantity)
    }
}
