use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};

use trading_core::{Balance, Ohlcv, Order, Ticker, Trade};

use super::cache::{ArrayCache, ArrayCacheBySymbolById, ArrayCacheByTimestamp};
use super::order_book::OrderBook;
use super::sync_status::SyncStatus;

/// Per-exchange stream state mutated by the message handler.
#[derive(Debug, Default)]
pub struct MarketState {
    pub order_books: HashMap<String, OrderBook>,
    pub trades: HashMap<String, ArrayCache<Trade>>,
    pub tickers: HashMap<String, Ticker>,
    /// symbol -> timeframe -> candles
    pub ohlcvs: HashMap<String, HashMap<String, ArrayCacheByTimestamp<Ohlcv>>>,
    pub orders: Option<ArrayCacheBySymbolById<Order>>,
    pub my_trades: Option<ArrayCacheBySymbolById<Trade>>,
    pub balance: Balance,
    desynced: HashSet<String>,
    snapshot_attempts: HashMap<String, u32>,
}

impl MarketState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sync_status(&self, symbol: &str) -> SyncStatus {
        match self.order_books.get(symbol) {
            Some(book) if book.is_synchronized() => SyncStatus::Synced,
            Some(_) => SyncStatus::Syncing,
            None if self.desynced.contains(symbol) => SyncStatus::OutOfSync,
            None => SyncStatus::Uninitialized,
        }
    }

    /// Install `book`, replacing any previous book for the symbol
    pub fn insert_order_book(&mut self, symbol: &str, book: OrderBook) -> &mut OrderBook {
        self.desynced.remove(symbol);
        self.snapshot_attempts.remove(symbol);
        match self.order_books.entry(symbol.to_string()) {
            Entry::Occupied(mut entry) => {
                entry.insert(book);
                entry.into_mut()
            }
            Entry::Vacant(entry) => entry.insert(book),
        }
    }

    /// Drop the book after a sequence failure
    pub fn invalidate_order_book(&mut self, symbol: &str) -> Option<OrderBook> {
        self.desynced.insert(symbol.to_string());
        self.snapshot_attempts.remove(symbol);
        self.order_books.remove(symbol)
    }

    /// Count one more snapshot for `symbol` and return the attempt number,
    /// starting at 1
    pub fn begin_snapshot_attempt(&mut self, symbol: &str) -> u32 {
        let attempts = self.snapshot_attempts.entry(symbol.to_string()).or_insert(0);
        *attempts += 1;
        *attempts
    }

    pub fn finish_snapshot(&mut self, symbol: &str) {
        self.snapshot_attempts.remove(symbol);
    }

    pub fn trades_mut(&mut self, symbol: &str, limit: usize) -> &mut ArrayCache<Trade> {
        self.trades
            .entry(symbol.to_string())
            .or_insert_with(|| ArrayCache::new(limit))
    }

    pub fn ohlcv_mut(
        &mut self,
        symbol: &str,
        timeframe: &str,
        limit: usize,
    ) -> &mut ArrayCacheByTimestamp<Ohlcv> {
        self.ohlcvs
            .entry(symbol.to_string())
            .or_default()
            .entry(timeframe.to_string())
            .or_insert_with(|| ArrayCacheByTimestamp::new(limit))
    }

    pub fn orders_mut(&mut self, limit: usize) -> &mut ArrayCacheBySymbolById<Order> {
        self.orders
            .get_or_insert_with(|| ArrayCacheBySymbolById::new(limit))
    }

    pub fn my_trades_mut(&mut self, limit: usize) -> &mut ArrayCacheBySymbolById<Trade> {
        self.my_trades
            .get_or_insert_with(|| ArrayCacheBySymbolById::new(limit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order_book::OrderBookSnapshot;

    #[test]
    fn test_sync_status_lifecycle() {
        let mut state = MarketState::new();
        assert_eq!(state.sync_status("BTC/USD"), SyncStatus::Uninitialized);

        state.insert_order_book("BTC/USD", OrderBook::new(None));
        assert_eq!(state.sync_status("BTC/USD"), SyncStatus::Syncing);

        if let Some(book) = state.order_books.get_mut("BTC/USD") {
            book.reset(&OrderBookSnapshot::default().with_nonce(1));
        }
        assert_eq!(state.sync_status("BTC/USD"), SyncStatus::Synced);

        assert!(state.invalidate_order_book("BTC/USD").is_some());
        assert_eq!(state.sync_status("BTC/USD"), SyncStatus::OutOfSync);

        state.insert_order_book("BTC/USD", OrderBook::new(None));
        assert_eq!(state.sync_status("BTC/USD"), SyncStatus::Syncing);
    }

    #[test]
    fn test_snapshot_attempts_reset_with_book() {
        let mut state = MarketState::new();
        assert_eq!(state.begin_snapshot_attempt("ETH/USD"), 1);
        assert_eq!(state.begin_snapshot_attempt("ETH/USD"), 2);

        state.insert_order_book("ETH/USD", OrderBook::new(None));
        assert_eq!(state.begin_snapshot_attempt("ETH/USD"), 1);

        state.finish_snapshot("ETH/USD");
        assert_eq!(state.begin_snapshot_attempt("ETH/USD"), 1);
    }
}
