//! Shared fixtures: a local WebSocket venue and a protocol adapter for it.
//!
//! The venue speaks a small JSON protocol:
//! - `{"op":"subscribe","channel":..,"symbol":..}` / `{"op":"login"}` outbound
//! - `{"event":"subscribed","channel":"book","symbol":..}` confirms a book
//! - `{"channel":"book","type":"snapshot"|"update",..}` carries depth
//! - `{"channel":"trades"|"ticker"|"balance"|"orders",..}` carry the rest

#![allow(dead_code)]

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde_json::{Value, json};
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use stream_gateway::{
    AuthRequest, BookKind, ClientOptions, DepthDelta, DepthFetcher, FetchError, HandlerContext,
    LevelUpdate, NonceRule, OrderBookSnapshot, ProtocolAdapter, SubscribeRequest, WatchError,
    WatchOptions,
};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use trading_core::{BalanceEntry, Order, Side, Ticker, Trade};

// ============================================================================
// Mock venue
// ============================================================================

enum Command {
    Send(Value),
    Close,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VenueMode {
    /// Reads frames and answers pings
    Normal,
    /// Accepts connections but never reads from them
    Silent,
}

pub struct MockVenue {
    addr: SocketAddr,
    frames: mpsc::UnboundedReceiver<Value>,
    connections: Arc<Mutex<Vec<mpsc::UnboundedSender<Command>>>>,
    accepted: Arc<AtomicUsize>,
}

impl MockVenue {
    pub async fn start() -> Self {
        Self::start_with(VenueMode::Normal).await
    }

    pub async fn start_with(mode: VenueMode) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (frames_tx, frames) = mpsc::unbounded_channel();
        let connections = Arc::new(Mutex::new(Vec::new()));
        let accepted = Arc::new(AtomicUsize::new(0));

        let registered = Arc::clone(&connections);
        let counter = Arc::clone(&accepted);
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let Ok(ws) = accept_async(stream).await else {
                    continue;
                };
                counter.fetch_add(1, Ordering::SeqCst);
                let (tx, rx) = mpsc::unbounded_channel();
                registered.lock().push(tx);
                tokio::spawn(serve(ws, rx, frames_tx.clone(), mode));
            }
        });

        MockVenue {
            addr,
            frames,
            connections,
            accepted,
        }
    }

    pub fn url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }

    /// Connections accepted so far
    pub fn accepted(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }

    /// Next frame the client sent, failing the test after two seconds
    pub async fn next_frame(&mut self) -> Value {
        tokio::time::timeout(Duration::from_secs(2), self.frames.recv())
            .await
            .expect("Timeout waiting for client frame")
            .expect("Venue stopped")
    }

    /// Assert the client sends nothing more for `window`
    pub async fn expect_silence(&mut self, window: Duration) {
        if let Ok(Some(frame)) = tokio::time::timeout(window, self.frames.recv()).await {
            panic!("Unexpected frame: {}", frame);
        }
    }

    /// Push a message on the most recent connection
    pub fn push(&self, message: Value) {
        let connections = self.connections.lock();
        let latest = connections.last().expect("No client connected");
        latest.send(Command::Send(message)).unwrap();
    }

    /// Close every connection with a close handshake
    pub fn close_all(&self) {
        for connection in self.connections.lock().drain(..) {
            let _ = connection.send(Command::Close);
        }
    }
}

async fn serve(
    ws: tokio_tungstenite::WebSocketStream<tokio::net::TcpStream>,
    mut commands: mpsc::UnboundedReceiver<Command>,
    frames: mpsc::UnboundedSender<Value>,
    mode: VenueMode,
) {
    let (mut write, mut read) = ws.split();

    if mode == VenueMode::Silent {
        while let Some(command) = commands.recv().await {
            if let Command::Close = command {
                let _ = write.send(Message::Close(None)).await;
                return;
            }
        }
        return;
    }

    loop {
        tokio::select! {
            frame = read.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    let value = serde_json::from_str(text.as_str())
                        .unwrap_or_else(|_| Value::String(text.to_string()));
                    let _ = frames.send(value);
                }
                Some(Ok(Message::Ping(data))) => {
                    let _ = write.send(Message::Pong(data)).await;
                }
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => return,
                Some(Ok(_)) => {}
            },
            command = commands.recv() => match command {
                Some(Command::Send(message)) => {
                    if write.send(Message::Text(message.to_string().into())).await.is_err() {
                        return;
                    }
                }
                Some(Command::Close) | None => {
                    let _ = write.send(Message::Close(None)).await;
                    return;
                }
            },
        }
    }
}

// ============================================================================
// Protocol adapter
// ============================================================================

pub const LOGIN_HASH: &str = "login";
pub const BALANCE_HASH: &str = "balance";
pub const ORDERS_HASH: &str = "orders";

/// How the adapter obtains order book snapshots
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotSource {
    /// The venue pushes snapshots on the stream
    Stream,
    /// The book is seeded through the exchange's depth fetcher
    Rest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Login {
    None,
    /// Venue answers `{"event":"login","success":..}`
    Acknowledged,
    /// Venue never answers
    Implicit,
}

pub struct TestVenue {
    pub url: String,
    pub rule: NonceRule,
    pub snapshots: SnapshotSource,
    pub login: Login,
    /// Book subscriptions are recorded as `depth:SYM` while results
    /// resolve under `book:SYM`
    pub depth_subscriptions: bool,
}

impl TestVenue {
    pub fn new(url: impl Into<String>) -> Self {
        TestVenue {
            url: url.into(),
            rule: NonceRule::StrictlyGreater,
            snapshots: SnapshotSource::Stream,
            login: Login::None,
            depth_subscriptions: false,
        }
    }

    pub fn with_rule(mut self, rule: NonceRule) -> Self {
        self.rule = rule;
        self
    }

    pub fn with_rest_snapshots(mut self) -> Self {
        self.snapshots = SnapshotSource::Rest;
        self
    }

    pub fn with_login(mut self, login: Login) -> Self {
        self.login = login;
        self
    }

    pub fn with_depth_subscriptions(mut self) -> Self {
        self.depth_subscriptions = true;
        self
    }

    /// Record the book subscription for `symbol` lives under
    pub fn book_subscribe_hash(&self, symbol: &str) -> String {
        if self.depth_subscriptions {
            format!("depth:{}", symbol)
        } else {
            format!("book:{}", symbol)
        }
    }

    fn subscribe(&self, channel: &str, symbol: &str) -> SubscribeRequest {
        SubscribeRequest::new(&self.url, format!("{}:{}", channel, symbol)).with_message(
            json!({ "op": "subscribe", "channel": channel, "symbol": symbol }),
        )
    }

    fn handle_book(&self, ctx: &mut HandlerContext<'_>, message: &Value) {
        let symbol = str_field(message, "symbol");
        let hash = format!("book:{}", symbol);
        let subscribe_hash = self.book_subscribe_hash(&symbol);
        let bids = levels(&message["bids"]);
        let asks = levels(&message["asks"]);

        if message["type"] == "snapshot" {
            let mut snapshot = OrderBookSnapshot::new(bids, asks);
            if let Some(nonce) = message["nonce"].as_i64() {
                snapshot = snapshot.with_nonce(nonce);
            }
            let _ = ctx.order_book_snapshot(&symbol, snapshot, &hash, &subscribe_hash);
            return;
        }

        let mut delta = DepthDelta::new(bids, asks);
        match (message["first"].as_i64(), message["last"].as_i64()) {
            (Some(first), Some(last)) => delta = delta.with_range(first, last),
            (None, Some(last)) => delta = delta.with_nonce(last),
            _ => {}
        }
        let _ = ctx.order_book_delta(&symbol, delta, &hash, &subscribe_hash);
    }
}

impl ProtocolAdapter for TestVenue {
    fn id(&self) -> &str {
        "testvenue"
    }

    fn handle_message(&self, ctx: &mut HandlerContext<'_>, message: Value) {
        if message["op"] == "pong" {
            ctx.record_pong();
            return;
        }
        match message["event"].as_str() {
            Some("subscribed") if message["channel"] == "book" => {
                let symbol = str_field(&message, "symbol");
                ctx.create_order_book(&symbol, BookKind::Plain);
                if self.snapshots == SnapshotSource::Rest {
                    let hash = format!("book:{}", symbol);
                    let subscribe_hash = self.book_subscribe_hash(&symbol);
                    let _ = ctx.fetch_order_book_snapshot(&symbol, None, &hash, &subscribe_hash);
                }
                return;
            }
            Some("login") => {
                if message["success"] == true {
                    ctx.complete_authentication(LOGIN_HASH);
                } else {
                    let reason = str_field(&message, "reason");
                    ctx.fail_authentication(
                        WatchError::Authentication(reason),
                        LOGIN_HASH,
                        &[BALANCE_HASH, ORDERS_HASH],
                    );
                }
                return;
            }
            _ => {}
        }

        match message["channel"].as_str() {
            Some("book") => self.handle_book(ctx, &message),
            Some("trades") => {
                let symbol = str_field(&message, "symbol");
                let trades = message["trades"]
                    .as_array()
                    .map(|items| items.iter().map(|t| parse_trade(&symbol, t)).collect())
                    .unwrap_or_default();
                ctx.append_trades(&symbol, trades, &format!("trades:{}", symbol));
            }
            Some("ticker") => {
                let symbol = str_field(&message, "symbol");
                let mut ticker = Ticker::new(symbol.clone());
                ticker.last = decimal(&message["last"]);
                ticker.timestamp = message["timestamp"].as_i64();
                ctx.update_ticker(ticker, &format!("ticker:{}", symbol));
            }
            Some("balance") => {
                let currency = str_field(&message, "currency");
                let entry = BalanceEntry::new(
                    decimal(&message["free"]).unwrap_or_default(),
                    decimal(&message["used"]).unwrap_or_default(),
                );
                ctx.update_balance(|balance| balance.update(currency, entry), BALANCE_HASH);
            }
            Some("orders") => {
                let orders = message["orders"]
                    .as_array()
                    .map(|items| items.iter().map(parse_order).collect())
                    .unwrap_or_default();
                ctx.upsert_orders(orders, &[ORDERS_HASH]);
            }
            _ => {}
        }
    }

    fn nonce_rule(&self) -> NonceRule {
        self.rule
    }

    fn order_book_request(
        &self,
        symbol: &str,
        _limit: Option<usize>,
    ) -> Result<SubscribeRequest, WatchError> {
        let request = self.subscribe("book", symbol);
        Ok(if self.depth_subscriptions {
            request.with_subscribe_hash(self.book_subscribe_hash(symbol))
        } else {
            request
        })
    }

    fn trades_request(&self, symbol: &str) -> Result<SubscribeRequest, WatchError> {
        Ok(self.subscribe("trades", symbol))
    }

    fn ticker_request(&self, symbol: &str) -> Result<SubscribeRequest, WatchError> {
        Ok(self.subscribe("ticker", symbol))
    }

    fn orders_request(&self, _symbol: Option<&str>) -> Result<SubscribeRequest, WatchError> {
        Ok(SubscribeRequest::new(&self.url, ORDERS_HASH)
            .with_message(json!({ "op": "subscribe", "channel": "orders" })))
    }

    fn balance_request(&self) -> Result<SubscribeRequest, WatchError> {
        Ok(SubscribeRequest::new(&self.url, BALANCE_HASH)
            .with_message(json!({ "op": "subscribe", "channel": "balance" })))
    }

    fn auth_request(&self, _url: &str) -> Result<Option<AuthRequest>, WatchError> {
        let request = AuthRequest::new(json!({ "op": "login", "key": "test-key" }), LOGIN_HASH);
        Ok(match self.login {
            Login::None => None,
            Login::Acknowledged => Some(request),
            Login::Implicit => Some(request.implicit()),
        })
    }
}

fn str_field(message: &Value, field: &str) -> String {
    message[field].as_str().unwrap_or_default().to_string()
}

fn decimal(value: &Value) -> Option<Decimal> {
    value.as_str().and_then(|s| s.parse().ok())
}

fn levels(value: &Value) -> Vec<LevelUpdate> {
    let pairs: Vec<[String; 2]> = serde_json::from_value(value.clone()).unwrap_or_default();
    LevelUpdate::parse_pairs(&pairs)
}

fn parse_trade(symbol: &str, value: &Value) -> Trade {
    let mut trade = Trade::new(
        symbol,
        decimal(&value["price"]).unwrap_or_default(),
        decimal(&value["amount"]).unwrap_or_default(),
    )
    .with_id(str_field(value, "id"));
    if let Some(timestamp) = value["timestamp"].as_i64() {
        trade = trade.with_timestamp(timestamp);
    }
    if let Some(side) = value["side"].as_str().and_then(Side::parse) {
        trade = trade.with_side(side);
    }
    trade
}

fn parse_order(value: &Value) -> Order {
    let side = value["side"].as_str().and_then(Side::parse).unwrap_or(Side::Buy);
    let mut order = Order::new(
        str_field(value, "id"),
        str_field(value, "symbol"),
        side,
        decimal(&value["amount"]).unwrap_or_default(),
    );
    order.filled = decimal(&value["filled"]).unwrap_or_default();
    order
}

// ============================================================================
// Depth fetcher
// ============================================================================

/// Returns queued snapshots in order and counts calls
#[derive(Default)]
pub struct ScriptedFetcher {
    responses: Mutex<VecDeque<Result<OrderBookSnapshot, FetchError>>>,
    calls: AtomicUsize,
}

impl ScriptedFetcher {
    pub fn new(responses: Vec<Result<OrderBookSnapshot, FetchError>>) -> Self {
        ScriptedFetcher {
            responses: Mutex::new(responses.into()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DepthFetcher for ScriptedFetcher {
    async fn fetch_order_book(
        &self,
        _symbol: &str,
        _limit: Option<usize>,
    ) -> Result<OrderBookSnapshot, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.responses
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(FetchError::Network("no scripted response".to_string())))
    }
}

// ============================================================================
// Options
// ============================================================================

/// Fast options for tests: no keepalive, short delays
pub fn test_options() -> WatchOptions {
    WatchOptions {
        client: ClientOptions {
            keep_alive: None,
            connect_timeout: Duration::from_secs(2),
            ..ClientOptions::default()
        },
        enable_rate_limit: false,
        snapshot_delay: Duration::from_millis(20),
        ..WatchOptions::default()
    }
}

/// Await `future`, failing the test after two seconds
pub async fn within<F: std::future::IntoFuture>(future: F) -> F::Output {
    tokio::time::timeout(Duration::from_secs(2), future.into_future())
        .await
        .expect("Timeout waiting for watch")
}
