//! Trading Core
//!
//! Normalized market data shapes returned by the streaming gateway's watch
//! calls. Exchange adapters parse their wire formats into these types; the
//! gateway's bounded caches key on [`Identified`].

pub mod entities;
pub mod value_objects;

// Re-export value objects at crate root for convenience
pub use value_objects::{Identified, Side, iso8601};

// Re-export entities at crate root
pub use entities::{
    Balance, BalanceEntry, Ohlcv, Order, OrderStatus, PriceLevel, Ticker, Trade,
};
