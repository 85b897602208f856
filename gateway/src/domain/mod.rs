pub mod book_side;
pub mod cache;
pub mod error;
pub mod future;
pub mod market_state;
pub mod nonce;
pub mod order_book;
pub mod payload;
pub mod subscription;
pub mod sync_status;
pub mod traits;

pub use book_side::{BookKind, BookSide, BookSideKind, LevelUpdate};
pub use cache::{
    ArrayCache, ArrayCacheById, ArrayCacheBySymbolById, ArrayCacheByTimestamp, ById,
    BySymbolById, ByTimestamp, CacheKey, IndexedCache,
};
pub use error::{FetchError, WatchError};
pub use future::{Broadcast, Deferred, FutureState, Outcome, Waiter};
pub use market_state::MarketState;
pub use nonce::{NonceCheck, NonceRule};
pub use order_book::{DeltaOutcome, DepthDelta, OrderBook, OrderBookSnapshot};
pub use payload::Payload;
pub use subscription::{AuthRequest, SubscribeRequest};
pub use sync_status::SyncStatus;
pub use traits::{ConnectionObserver, DepthFetcher, MessageHandler, ProtocolAdapter};
