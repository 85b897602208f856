use std::sync::{Arc, Weak};
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, warn};
use trading_core::{Balance, Ohlcv, Order, Ticker, Trade};
use url::Url;

use super::config::WatchOptions;
use super::context::AUTHENTICATED;
use super::filters::{filter_by_since_limit, filter_by_symbol_since_limit};
use super::order_book_sync::OrderBookSynchronizer;
use super::shared::{Dispatcher, Shared};
use super::tasks;
use crate::config::{ConfigError, ExchangeConfig};
use crate::domain::{
    ConnectionObserver, DepthFetcher, MessageHandler, OrderBook, OrderBookSnapshot, Payload,
    ProtocolAdapter, SubscribeRequest, SyncStatus, WatchError, Waiter,
};
use crate::infrastructure::ConnectionClient;

/// Streaming client for one exchange.
///
/// Multiplexes every watch onto one connection per URL, deduplicates
/// subscribe messages, and keeps order books, trades, candles, orders and
/// balances in bounded per-exchange state. Protocol details come from the
/// adapter `A`.
pub struct Exchange<A: ProtocolAdapter> {
    shared: Arc<Shared>,
    adapter: Arc<A>,
    handler: Arc<dyn MessageHandler>,
}

impl<A: ProtocolAdapter> Exchange<A> {
    pub fn new(adapter: A, options: WatchOptions) -> Self {
        Self::build(adapter, options, None)
    }

    /// Exchange whose order books are seeded from REST snapshots
    pub fn with_depth_fetcher(
        adapter: A,
        options: WatchOptions,
        fetcher: Arc<dyn DepthFetcher>,
    ) -> Self {
        Self::build(adapter, options, Some(fetcher))
    }

    pub fn from_config(adapter: A, config: &ExchangeConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::new(adapter, config.to_watch_options()))
    }

    fn build(adapter: A, options: WatchOptions, fetcher: Option<Arc<dyn DepthFetcher>>) -> Self {
        let adapter = Arc::new(adapter);
        let synchronizer =
            OrderBookSynchronizer::new(adapter.nonce_rule(), options.snapshot_max_attempts);
        let shared = Arc::new(Shared::new(options, synchronizer, fetcher));
        let handler: Arc<dyn MessageHandler> = Arc::new(Dispatcher {
            shared: Arc::downgrade(&shared),
            adapter: Arc::clone(&adapter),
        });
        Exchange {
            shared,
            adapter,
            handler,
        }
    }

    pub fn id(&self) -> &str {
        self.adapter.id()
    }

    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    pub fn options(&self) -> &WatchOptions {
        &self.shared.options
    }

    /// Connection for `url`, created on first use
    pub fn client(&self, url: &str) -> Result<Arc<ConnectionClient>, WatchError> {
        if let Some(client) = self.shared.registry.get(url) {
            return Ok(client);
        }
        let parsed =
            Url::parse(url).map_err(|e| WatchError::BadRequest(format!("{}: {}", url, e)))?;
        if !matches!(parsed.scheme(), "ws" | "wss") {
            return Err(WatchError::BadRequest(format!(
                "{}: expected a ws:// or wss:// url",
                url
            )));
        }

        let registry = Arc::downgrade(&self.shared.registry);
        let observer: Weak<dyn ConnectionObserver> = registry;
        let options = self.shared.options.client.clone();
        let handler = Arc::clone(&self.handler);
        Ok(self.shared.registry.get_or_create(url, move || {
            ConnectionClient::new(url, options, handler).with_observer(observer)
        }))
    }

    /// Connections currently registered
    pub fn clients(&self) -> Vec<Arc<ConnectionClient>> {
        self.shared.registry.all()
    }

    /// Open a stream and return the future for its next result.
    ///
    /// Returns immediately. In the background the connection is opened if
    /// needed and, unless a subscription with the same subscribe hash
    /// exists, the subscribe message is sent exactly once. A failed
    /// connection rejects only the connected future: the returned waiter
    /// stays pending until the caller gives up on it.
    pub fn watch(&self, request: SubscribeRequest) -> Result<Waiter<Payload>, WatchError> {
        let client = self.client(&request.url)?;
        let future = client.future(&request.message_hash);
        let connected = client.connect(Duration::ZERO);
        let shared = Arc::clone(&self.shared);

        tasks::spawn("watch_subscribe", async move {
            if let Err(e) = connected.wait().await {
                debug!(url = %request.url, error = %e, "Connection failed, watch stays pending");
                return Ok(());
            }
            let subscribe_hash = request.subscribe_hash().to_string();
            let subscription = request.subscription.unwrap_or(Value::Bool(true));
            if !client.subscribe_once(&subscribe_hash, subscription) {
                return Ok(());
            }
            let Some(message) = request.message else {
                return Ok(());
            };
            if shared.options.enable_rate_limit {
                shared.throttle.throttle(1.0).await;
            }
            client.send(&message).inspect_err(|e| {
                warn!(url = %client.url(), subscribe_hash = %subscribe_hash, error = %e, "Failed to send subscription");
            })
        });

        Ok(future)
    }

    /// Log in on `url` once per connection.
    ///
    /// Returns `None` when the adapter needs no login. The first caller
    /// sends the login message; later callers share the same future until a
    /// login failure clears it.
    pub fn authenticate(&self, url: &str) -> Result<Option<Waiter<Payload>>, WatchError> {
        let Some(auth) = self.adapter.auth_request(url)? else {
            return Ok(None);
        };
        let client = self.client(url)?;
        let future = client.one_shot(&auth.message_hash);
        if !client.subscribe_once(AUTHENTICATED, Value::Bool(true)) {
            return Ok(Some(future));
        }

        let connected = client.connect(Duration::ZERO);
        let shared = Arc::clone(&self.shared);
        tasks::spawn("watch_authenticate", async move {
            if let Err(e) = connected.wait().await {
                client.remove_subscription(AUTHENTICATED);
                client.reject(e, Some(&auth.message_hash));
                return Ok::<(), WatchError>(());
            }
            if shared.options.enable_rate_limit {
                shared.throttle.throttle(1.0).await;
            }
            match client.send(&auth.message) {
                Ok(()) if auth.implicit => {
                    client.resolve(Payload::Ack, &auth.message_hash);
                }
                Ok(()) => {}
                Err(e) => {
                    client.remove_subscription(AUTHENTICATED);
                    client.reject(e, Some(&auth.message_hash));
                }
            }
            Ok(())
        });

        Ok(Some(future))
    }

    /// Watch a private stream behind the login for its URL
    pub async fn watch_private(&self, request: SubscribeRequest) -> Result<Payload, WatchError> {
        match self.authenticate(&request.url)? {
            Some(login) => {
                tasks::after_dropped(login, || async move { self.watch(request)?.await }).await
            }
            None => self.watch(request)?.await,
        }
    }

    pub async fn watch_order_book(
        &self,
        symbol: &str,
        limit: Option<usize>,
    ) -> Result<OrderBook, WatchError> {
        let request = self.adapter.order_book_request(symbol, limit)?;
        tasks::after(self.watch(request)?, |payload| {
            Ok(payload.into_order_book()?.limit(limit))
        })
        .await
    }

    pub async fn watch_trades(
        &self,
        symbol: &str,
        since: Option<i64>,
        limit: Option<usize>,
    ) -> Result<Vec<Trade>, WatchError> {
        let request = self.adapter.trades_request(symbol)?;
        tasks::after(self.watch(request)?, |payload| {
            Ok(filter_by_since_limit(&payload.into_trades()?, since, limit, true))
        })
        .await
    }

    pub async fn watch_ticker(&self, symbol: &str) -> Result<Ticker, WatchError> {
        let request = self.adapter.ticker_request(symbol)?;
        tasks::after(self.watch(request)?, Payload::into_ticker).await
    }

    pub async fn watch_ohlcv(
        &self,
        symbol: &str,
        timeframe: &str,
        since: Option<i64>,
        limit: Option<usize>,
    ) -> Result<Vec<Ohlcv>, WatchError> {
        let request = self.adapter.ohlcv_request(symbol, timeframe)?;
        tasks::after(self.watch(request)?, |payload| {
            Ok(filter_by_since_limit(&payload.into_ohlcv()?, since, limit, true))
        })
        .await
    }

    pub async fn watch_orders(
        &self,
        symbol: Option<&str>,
        since: Option<i64>,
        limit: Option<usize>,
    ) -> Result<Vec<Order>, WatchError> {
        let request = self.adapter.orders_request(symbol)?;
        let orders = self.watch_private(request).await?.into_orders()?;
        Ok(filter_by_symbol_since_limit(&orders, symbol, since, limit, true))
    }

    pub async fn watch_my_trades(
        &self,
        symbol: Option<&str>,
        since: Option<i64>,
        limit: Option<usize>,
    ) -> Result<Vec<Trade>, WatchError> {
        let request = self.adapter.my_trades_request(symbol)?;
        let trades = self.watch_private(request).await?.into_trades()?;
        Ok(filter_by_symbol_since_limit(&trades, symbol, since, limit, true))
    }

    pub async fn watch_balance(&self) -> Result<Balance, WatchError> {
        let request = self.adapter.balance_request()?;
        self.watch_private(request).await?.into_balance()
    }

    /// Plain book seeded from `snapshot` under the adapter's nonce rule
    pub fn order_book(&self, snapshot: &OrderBookSnapshot, depth: Option<usize>) -> OrderBook {
        self.seeded(OrderBook::new(depth), snapshot)
    }

    pub fn indexed_order_book(
        &self,
        snapshot: &OrderBookSnapshot,
        depth: Option<usize>,
    ) -> OrderBook {
        self.seeded(OrderBook::indexed(depth), snapshot)
    }

    pub fn counted_order_book(
        &self,
        snapshot: &OrderBookSnapshot,
        depth: Option<usize>,
    ) -> OrderBook {
        self.seeded(OrderBook::counted(depth), snapshot)
    }

    fn seeded(&self, mut book: OrderBook, snapshot: &OrderBookSnapshot) -> OrderBook {
        book.reset_with(snapshot, self.adapter.nonce_rule());
        book
    }

    pub fn sync_status(&self, symbol: &str) -> SyncStatus {
        self.shared.state.lock().sync_status(symbol)
    }

    /// Current book for `symbol`, if one is being maintained
    pub fn order_book_snapshot(&self, symbol: &str) -> Option<OrderBook> {
        self.shared
            .state
            .lock()
            .order_books
            .get(symbol)
            .map(|book| book.limit(None))
    }

    /// Close every connection
    pub fn close(&self) {
        for client in self.shared.registry.drain() {
            client.close();
        }
    }
}

impl<A: ProtocolAdapter> Drop for Exchange<A> {
    fn drop(&mut self) {
        self.close();
    }
}
