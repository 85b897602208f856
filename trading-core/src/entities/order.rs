use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::value_objects::{Identified, Side, iso8601};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Open,
    Closed,
    Canceled,
    Expired,
    Rejected,
}

impl OrderStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, OrderStatus::Open)
    }
}

/// A private order as reported by the exchange's order stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub client_order_id: Option<String>,
    pub symbol: String,
    pub timestamp: Option<i64>,
    pub side: Side,
    pub status: OrderStatus,
    pub price: Option<Decimal>,
    pub amount: Decimal,
    pub filled: Decimal,
}

impl Order {
    pub fn new(
        id: impl Into<String>,
        symbol: impl Into<String>,
        side: Side,
        amount: Decimal,
    ) -> Self {
        Order {
            id: id.into(),
            client_order_id: None,
            symbol: symbol.into(),
            timestamp: None,
            side,
            status: OrderStatus::Open,
            price: None,
            amount,
            filled: Decimal::ZERO,
        }
    }

    pub fn remaining(&self) -> Decimal {
        (self.amount - self.filled).max(Decimal::ZERO)
    }

    pub fn datetime(&self) -> Option<String> {
        self.timestamp.and_then(iso8601)
    }
}

impl Identified for Order {
    fn id(&self) -> Option<&str> {
        Some(&self.id)
    }

    fn symbol(&self) -> Option<&str> {
        Some(&self.symbol)
    }

    fn timestamp(&self) -> Option<i64> {
        self.timestamp
    }
}
