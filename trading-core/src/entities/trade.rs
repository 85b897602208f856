use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::value_objects::{Identified, Side, iso8601};

/// A public or private trade execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub id: Option<String>,
    pub order_id: Option<String>,
    pub symbol: String,
    /// Milliseconds since the epoch
    pub timestamp: Option<i64>,
    pub side: Option<Side>,
    pub price: Decimal,
    pub amount: Decimal,
}

impl Trade {
    pub fn new(symbol: impl Into<String>, price: Decimal, amount: Decimal) -> Self {
        Trade {
            id: None,
            order_id: None,
            symbol: symbol.into(),
            timestamp: None,
            side: None,
            price,
            amount,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_timestamp(mut self, timestamp: i64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn with_side(mut self, side: Side) -> Self {
        self.side = Some(side);
        self
    }

    pub fn cost(&self) -> Decimal {
        self.price * self.amount
    }

    pub fn datetime(&self) -> Option<String> {
        self.timestamp.and_then(iso8601)
    }
}

impl Identified for Trade {
    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn symbol(&self) -> Option<&str> {
        Some(&self.symbol)
    }

    fn timestamp(&self) -> Option<i64> {
        self.timestamp
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_cost_and_datetime() {
        let trade = Trade::new("ETH/EUR", dec!(198.46), dec!(0.5))
            .with_id("450c3298")
            .with_timestamp(1_590_779_594_547)
            .with_side(Side::Buy);

        assert_eq!(trade.cost(), dec!(99.230));
        assert_eq!(trade.datetime().as_deref(), Some("2020-05-29T19:13:14.547Z"));
        assert_eq!(Identified::id(&trade), Some("450c3298"));
    }
}
