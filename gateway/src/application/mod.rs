pub mod config;
pub mod context;
pub mod exchange;
pub mod filters;
pub mod order_book_sync;
pub(crate) mod shared;
pub mod tasks;

pub use config::WatchOptions;
pub use context::{AUTHENTICATED, HandlerContext};
pub use exchange::Exchange;
pub use filters::{filter_by_since_limit, filter_by_symbol_since_limit};
pub use order_book_sync::{OrderBookSynchronizer, SnapshotOutcome};
