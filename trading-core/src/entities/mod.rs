mod balance;
mod ohlcv;
mod order;
mod price_level;
mod ticker;
mod trade;

pub use balance::{Balance, BalanceEntry};
pub use ohlcv::Ohlcv;
pub use order::{Order, OrderStatus};
pub use price_level::PriceLevel;
pub use ticker::Ticker;
pub use trade::Trade;
