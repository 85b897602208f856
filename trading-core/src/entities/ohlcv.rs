use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::value_objects::Identified;

/// One candle. `timestamp` is the candle open time in milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ohlcv {
    pub timestamp: i64,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
}

impl Identified for Ohlcv {
    fn id(&self) -> Option<&str> {
        None
    }

    fn timestamp(&self) -> Option<i64> {
        Some(self.timestamp)
    }
}
