use serde_json::Value;
use trading_core::{Balance, Ohlcv, Order, Ticker, Trade};

use super::error::WatchError;
use super::order_book::OrderBook;

/// Value a watch future settles with.
///
/// Adapters resolve the normalized variant matching the stream; typed watch
/// calls unwrap it and fail with [`WatchError::UnexpectedPayload`] on a
/// mismatch.
#[derive(Debug, Clone)]
pub enum Payload {
    OrderBook(OrderBook),
    Trades(Vec<Trade>),
    Ticker(Ticker),
    Ohlcv(Vec<Ohlcv>),
    Orders(Vec<Order>),
    Balance(Balance),
    Json(Value),
    /// Acknowledgement without a body, e.g. a completed login
    Ack,
}

impl Payload {
    pub fn kind(&self) -> &'static str {
        match self {
            Payload::OrderBook(_) => "order_book",
            Payload::Trades(_) => "trades",
            Payload::Ticker(_) => "ticker",
            Payload::Ohlcv(_) => "ohlcv",
            Payload::Orders(_) => "orders",
            Payload::Balance(_) => "balance",
            Payload::Json(_) => "json",
            Payload::Ack => "ack",
        }
    }

    fn mismatch(&self, expected: &'static str) -> WatchError {
        WatchError::UnexpectedPayload {
            expected,
            actual: self.kind(),
        }
    }

    pub fn into_order_book(self) -> Result<OrderBook, WatchError> {
        match self {
            Payload::OrderBook(book) => Ok(book),
            other => Err(other.mismatch("order_book")),
        }
    }

    pub fn into_trades(self) -> Result<Vec<Trade>, WatchError> {
        match self {
            Payload::Trades(trades) => Ok(trades),
            other => Err(other.mismatch("trades")),
        }
    }

    pub fn into_ticker(self) -> Result<Ticker, WatchError> {
        match self {
            Payload::Ticker(ticker) => Ok(ticker),
            other => Err(other.mismatch("ticker")),
        }
    }

    pub fn into_ohlcv(self) -> Result<Vec<Ohlcv>, WatchError> {
        match self {
            Payload::Ohlcv(candles) => Ok(candles),
            other => Err(other.mismatch("ohlcv")),
        }
    }

    pub fn into_orders(self) -> Result<Vec<Order>, WatchError> {
        match self {
            Payload::Orders(orders) => Ok(orders),
            other => Err(other.mismatch("orders")),
        }
    }

    pub fn into_balance(self) -> Result<Balance, WatchError> {
        match self {
            Payload::Balance(balance) => Ok(balance),
            other => Err(other.mismatch("balance")),
        }
    }

    pub fn into_json(self) -> Result<Value, WatchError> {
        match self {
            Payload::Json(value) => Ok(value),
            other => Err(other.mismatch("json")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mismatch_reports_kinds() {
        let err = Payload::Ack.into_trades().unwrap_err();
        assert_eq!(
            err,
            WatchError::UnexpectedPayload {
                expected: "trades",
                actual: "ack"
            }
        );
    }
}
