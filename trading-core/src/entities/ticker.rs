use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::value_objects::iso8601;

/// Best bid/ask and rolling statistics for one symbol
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Ticker {
    pub symbol: String,
    pub timestamp: Option<i64>,
    pub bid: Option<Decimal>,
    pub bid_volume: Option<Decimal>,
    pub ask: Option<Decimal>,
    pub ask_volume: Option<Decimal>,
    pub last: Option<Decimal>,
    pub open: Option<Decimal>,
    pub high: Option<Decimal>,
    pub low: Option<Decimal>,
    pub base_volume: Option<Decimal>,
    pub quote_volume: Option<Decimal>,
}

impl Ticker {
    pub fn new(symbol: impl Into<String>) -> Self {
        Ticker {
            symbol: symbol.into(),
            ..Default::default()
        }
    }

    pub fn datetime(&self) -> Option<String> {
        self.timestamp.and_then(iso8601)
    }

    /// Absolute change from open to last
    pub fn change(&self) -> Option<Decimal> {
        Some(self.last? - self.open?)
    }

    pub fn spread(&self) -> Option<Decimal> {
        Some(self.ask? - self.bid?)
    }
}
