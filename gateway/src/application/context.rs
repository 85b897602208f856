use std::sync::Arc;

use tracing::{debug, warn};
use trading_core::{Balance, Ohlcv, Order, Ticker, Trade};

use super::config::WatchOptions;
use super::order_book_sync::{SnapshotOutcome, SnapshotRequest, synchronize_from_snapshots};
use super::shared::Shared;
use super::tasks;
use crate::domain::{
    BookKind, DeltaOutcome, DepthDelta, MarketState, OrderBook, OrderBookSnapshot, Payload,
    WatchError,
};
use crate::infrastructure::ConnectionClient;

/// Subscription record marking a connection as logged in
pub const AUTHENTICATED: &str = "authenticated";

/// What a protocol adapter sees while handling one inbound message.
///
/// The market state is locked for the duration of the call, so every update
/// an adapter makes here is observed atomically by watchers.
pub struct HandlerContext<'a> {
    client: &'a Arc<ConnectionClient>,
    state: &'a mut MarketState,
    shared: &'a Arc<Shared>,
}

impl<'a> HandlerContext<'a> {
    pub(crate) fn new(
        client: &'a Arc<ConnectionClient>,
        state: &'a mut MarketState,
        shared: &'a Arc<Shared>,
    ) -> Self {
        HandlerContext {
            client,
            state,
            shared,
        }
    }

    pub fn client(&self) -> &Arc<ConnectionClient> {
        self.client
    }

    pub fn url(&self) -> &str {
        self.client.url()
    }

    pub fn options(&self) -> &WatchOptions {
        &self.shared.options
    }

    pub fn state(&mut self) -> &mut MarketState {
        self.state
    }

    pub fn resolve(&self, payload: Payload, message_hash: &str) -> bool {
        self.client.resolve(payload, message_hash)
    }

    pub fn reject(&self, error: WatchError, message_hash: Option<&str>) {
        self.client.reject(error, message_hash)
    }

    /// Count an application-level pong toward connection liveness
    pub fn record_pong(&self) {
        self.client.record_pong();
    }

    /// Install an empty book for `symbol`, replacing any previous one.
    ///
    /// Called when the exchange confirms a book subscription. Deltas are
    /// cached on the new book until a snapshot arrives.
    pub fn create_order_book(&mut self, symbol: &str, kind: BookKind) -> &mut OrderBook {
        let book = OrderBook::with_kind(kind, self.shared.options.order_book_depth)
            .with_symbol(symbol);
        self.state.insert_order_book(symbol, book)
    }

    pub fn order_book(&mut self, symbol: &str) -> Option<&mut OrderBook> {
        self.state.order_books.get_mut(symbol)
    }

    /// Feed a delta to the book for `symbol`.
    ///
    /// An applied delta resolves `message_hash` with the updated book. On a
    /// sequence gap the book has already been invalidated, and the
    /// `subscribe_hash` record dropped, when this returns the error.
    pub fn order_book_delta(
        &mut self,
        symbol: &str,
        delta: DepthDelta,
        message_hash: &str,
        subscribe_hash: &str,
    ) -> Result<DeltaOutcome, WatchError> {
        let Some(book) = self.state.order_books.get_mut(symbol) else {
            return Ok(DeltaOutcome::Untracked);
        };
        match self.shared.synchronizer.on_delta(book, delta) {
            Ok(DeltaOutcome::Applied) => {
                self.client
                    .resolve(Payload::OrderBook(book.clone()), message_hash);
                Ok(DeltaOutcome::Applied)
            }
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                self.invalidate_order_book(symbol, message_hash, subscribe_hash, e.clone());
                Err(e)
            }
        }
    }

    /// Apply a snapshot delivered on the stream.
    ///
    /// Creates the book if needed. A `Retry` outcome means the snapshot was
    /// too old and the adapter should request another one. Once the
    /// attempts run out the book is invalidated and the error returned.
    pub fn order_book_snapshot(
        &mut self,
        symbol: &str,
        snapshot: OrderBookSnapshot,
        message_hash: &str,
        subscribe_hash: &str,
    ) -> Result<SnapshotOutcome, WatchError> {
        if !self.state.order_books.contains_key(symbol) {
            self.create_order_book(symbol, BookKind::Plain);
        }
        let attempt = self.state.begin_snapshot_attempt(symbol);
        let Some(book) = self.state.order_books.get_mut(symbol) else {
            return Ok(SnapshotOutcome::Retry { attempt });
        };
        match self.shared.synchronizer.on_snapshot(book, &snapshot, attempt) {
            Ok(SnapshotOutcome::Synchronized { replayed, discarded }) => {
                let payload = Payload::OrderBook(book.clone());
                self.state.finish_snapshot(symbol);
                self.client.resolve(payload, message_hash);
                Ok(SnapshotOutcome::Synchronized {
                    replayed,
                    discarded,
                })
            }
            Ok(retry) => Ok(retry),
            Err(e) => {
                self.invalidate_order_book(symbol, message_hash, subscribe_hash, e.clone());
                Err(e)
            }
        }
    }

    /// Fetch the snapshot for `symbol` out of band after the configured
    /// warm-up delay, retrying while it predates the cached deltas and the
    /// `subscribe_hash` record is still present.
    pub fn fetch_order_book_snapshot(
        &self,
        symbol: &str,
        limit: Option<usize>,
        message_hash: &str,
        subscribe_hash: &str,
    ) -> Result<(), WatchError> {
        let Some(fetcher) = self.shared.fetcher.clone() else {
            return Err(WatchError::NotSupported(
                "order book snapshots require a depth fetcher".to_string(),
            ));
        };
        let request = SnapshotRequest {
            symbol: symbol.to_string(),
            limit,
            message_hash: message_hash.to_string(),
            subscribe_hash: subscribe_hash.to_string(),
        };
        tasks::delay(
            self.shared.options.snapshot_delay,
            "order_book_snapshot",
            synchronize_from_snapshots(
                Arc::clone(self.shared),
                fetcher,
                Arc::clone(self.client),
                request,
            ),
        );
        Ok(())
    }

    /// Drop the book for `symbol`, reject its watchers and forget the
    /// subscription so the next watch subscribes from scratch.
    pub fn invalidate_order_book(
        &mut self,
        symbol: &str,
        message_hash: &str,
        subscribe_hash: &str,
        error: WatchError,
    ) {
        warn!(url = %self.client.url(), symbol, error = %error, "Invalidating order book");
        self.state.invalidate_order_book(symbol);
        self.client.reject(error, Some(message_hash));
        self.client.remove_subscription(subscribe_hash);
    }

    /// Append public trades and resolve with the symbol's cached trades
    pub fn append_trades(&mut self, symbol: &str, trades: Vec<Trade>, message_hash: &str) {
        let limit = self.shared.options.trades_limit;
        let cache = self.state.trades_mut(symbol, limit);
        for trade in trades {
            cache.append(trade);
        }
        let payload = Payload::Trades(cache.to_vec());
        self.client.resolve(payload, message_hash);
    }

    pub fn update_ticker(&mut self, ticker: Ticker, message_hash: &str) {
        self.state
            .tickers
            .insert(ticker.symbol.clone(), ticker.clone());
        self.client.resolve(Payload::Ticker(ticker), message_hash);
    }

    /// Store candles; a candle with the timestamp of a cached one replaces it
    pub fn append_ohlcv(
        &mut self,
        symbol: &str,
        timeframe: &str,
        candles: Vec<Ohlcv>,
        message_hash: &str,
    ) {
        let limit = self.shared.options.ohlcv_limit;
        let cache = self.state.ohlcv_mut(symbol, timeframe, limit);
        for candle in candles {
            cache.append(candle);
        }
        let payload = Payload::Ohlcv(cache.to_vec());
        self.client.resolve(payload, message_hash);
    }

    /// Upsert orders by (symbol, id) and resolve every hash in
    /// `message_hashes` with all cached orders
    pub fn upsert_orders(&mut self, orders: Vec<Order>, message_hashes: &[&str]) {
        let limit = self.shared.options.orders_limit;
        let cache = self.state.orders_mut(limit);
        for order in orders {
            cache.append(order);
        }
        let snapshot = cache.to_vec();
        for hash in message_hashes {
            self.client.resolve(Payload::Orders(snapshot.clone()), hash);
        }
    }

    pub fn append_my_trades(&mut self, trades: Vec<Trade>, message_hashes: &[&str]) {
        let limit = self.shared.options.trades_limit;
        let cache = self.state.my_trades_mut(limit);
        for trade in trades {
            cache.append(trade);
        }
        let snapshot = cache.to_vec();
        for hash in message_hashes {
            self.client.resolve(Payload::Trades(snapshot.clone()), hash);
        }
    }

    pub fn update_balance(&mut self, update: impl FnOnce(&mut Balance), message_hash: &str) {
        update(&mut self.state.balance);
        let payload = Payload::Balance(self.state.balance.clone());
        self.client.resolve(payload, message_hash);
    }

    /// Login acknowledged: settle the login future
    pub fn complete_authentication(&self, auth_hash: &str) {
        debug!(url = %self.client.url(), "Authenticated");
        self.client.resolve(Payload::Ack, auth_hash);
    }

    /// Login refused: forget the login so the next private watch retries it,
    /// and reject the login future along with the private streams waiting
    /// on it
    pub fn fail_authentication(&self, error: WatchError, auth_hash: &str, private_hashes: &[&str]) {
        warn!(url = %self.client.url(), error = %error, "Authentication failed");
        self.client.remove_subscription(AUTHENTICATED);
        self.client.reject(error.clone(), Some(auth_hash));
        self.client.clear_future(auth_hash);
        for hash in private_hashes {
            self.client.reject(error.clone(), Some(hash));
        }
    }
}
