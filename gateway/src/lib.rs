//! Stream Gateway
//!
//! Unified streaming client for exchange WebSocket APIs. One connection per
//! URL carries every subscription on it; watchers get futures keyed by
//! message hash that settle each time the matching stream produces data.
//!
//! # Architecture
//!
//! ```text
//!   watch_order_book / watch_trades / watch_balance ...
//!                        │
//!                        ▼
//! ┌──────────────────────────────────────────────────────┐
//! │                    Exchange<A>                        │
//! │   URL → ConnectionClient   │   MarketState (caches)   │
//! │   subscribe dedupe         │   OrderBookSynchronizer  │
//! └──────────────┬───────────────────────────▲───────────┘
//!                │ send                      │ HandlerContext
//!                ▼                           │
//! ┌──────────────────────────┐     ┌─────────┴──────────┐
//! │   ConnectionClient       │────▶│  ProtocolAdapter A │
//! │ futures, keepalive, I/O  │recv │  (venue messages)  │
//! └──────────────────────────┘     └────────────────────┘
//! ```
//!
//! - `domain`: futures, bounded caches, order books, nonce rules, ports
//! - `application`: watch orchestration, snapshot synchronization, tasks
//! - `infrastructure`: WebSocket connection, keepalive, frames, throttle
//! - `config`: JSON exchange configuration

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod telemetry;

// Re-export key types
pub use domain::{
    ArrayCache, ArrayCacheById, ArrayCacheBySymbolById, ArrayCacheByTimestamp, AuthRequest,
    BookKind, BookSide, BookSideKind, Broadcast, ConnectionObserver, Deferred, DeltaOutcome,
    DepthDelta, DepthFetcher, FetchError, FutureState, IndexedCache, LevelUpdate, MarketState,
    MessageHandler, NonceRule, OrderBook, OrderBookSnapshot, Payload, ProtocolAdapter,
    SubscribeRequest, SyncStatus, WatchError, Waiter,
};

pub use application::{
    AUTHENTICATED, Exchange, HandlerContext, OrderBookSynchronizer, SnapshotOutcome,
    WatchOptions, tasks,
};

pub use infrastructure::{ClientOptions, Compression, ConnectionClient, ConnectionStatus};

pub use config::{ConfigError, ExchangeConfig, GatewayConfigFile, load_config, load_default_config};
