use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Weak};
use std::time::Duration;

use arc_swap::ArcSwap;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, timeout};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};
use tracing::{debug, error, info, trace, warn};

use super::frames::{self, Compression};
use super::keepalive;
use crate::domain::{
    Broadcast, ConnectionObserver, Deferred, MessageHandler, Payload, WatchError, Waiter,
};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Transport settings of a single connection
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Ping interval; `None` disables the keepalive loop
    pub keep_alive: Option<Duration>,
    /// Pong silence tolerated, in multiples of `keep_alive`
    pub max_ping_pong_misses: f64,
    pub connect_timeout: Duration,
    pub compression: Compression,
}

impl Default for ClientOptions {
    fn default() -> Self {
        ClientOptions {
            keep_alive: Some(Duration::from_millis(30_000)),
            max_ping_pong_misses: 2.0,
            connect_timeout: Duration::from_millis(10_000),
            compression: Compression::None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Idle,
    Connecting,
    Open,
    Closing,
    Closed,
    Errored,
}

enum Slot {
    Once(Deferred<Payload>),
    Stream(Broadcast<Payload>),
}

struct ClientState {
    status: ConnectionStatus,
    slots: HashMap<String, Slot>,
    subscriptions: HashMap<String, Value>,
    last_pong: Option<Instant>,
    error: Option<WatchError>,
    outbound: Option<mpsc::UnboundedSender<Message>>,
    tasks: Vec<JoinHandle<()>>,
    connect_attempts: u32,
}

/// One WebSocket connection shared by every stream on the same URL.
///
/// Holds the futures keyed by message hash, the subscription records that
/// deduplicate outbound subscribe messages, and the liveness state used by
/// the keepalive loop. Inbound frames are decoded and handed to the
/// [`MessageHandler`] sequentially from a single reader task.
pub struct ConnectionClient {
    url: String,
    options: ClientOptions,
    handler: Arc<dyn MessageHandler>,
    observer: Option<Weak<dyn ConnectionObserver>>,
    connected: ArcSwap<Deferred<()>>,
    state: Mutex<ClientState>,
}

impl ConnectionClient {
    pub fn new(
        url: impl Into<String>,
        options: ClientOptions,
        handler: Arc<dyn MessageHandler>,
    ) -> Self {
        ConnectionClient {
            url: url.into(),
            options,
            handler,
            observer: None,
            connected: ArcSwap::from_pointee(Deferred::new()),
            state: Mutex::new(ClientState {
                status: ConnectionStatus::Idle,
                slots: HashMap::new(),
                subscriptions: HashMap::new(),
                last_pong: None,
                error: None,
                outbound: None,
                tasks: Vec::new(),
                connect_attempts: 0,
            }),
        }
    }

    pub fn with_observer(mut self, observer: Weak<dyn ConnectionObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    pub fn status(&self) -> ConnectionStatus {
        self.state.lock().status
    }

    pub fn is_open(&self) -> bool {
        self.status() == ConnectionStatus::Open
    }

    /// Error that ended the connection, if any
    pub fn error(&self) -> Option<WatchError> {
        self.state.lock().error.clone()
    }

    pub fn connect_attempts(&self) -> u32 {
        self.state.lock().connect_attempts
    }

    /// Future settled when the current connection attempt opens or fails
    pub fn connected(&self) -> Deferred<()> {
        Deferred::clone(&self.connected.load())
    }

    /// Start connecting unless an attempt is already in flight or open.
    ///
    /// Idempotent: concurrent callers share the same connected future. After
    /// a failure or close, the next call starts a new attempt with a fresh
    /// connected future.
    pub fn connect(self: &Arc<Self>, backoff: Duration) -> Deferred<()> {
        let connected = {
            let mut state = self.state.lock();
            match state.status {
                ConnectionStatus::Connecting | ConnectionStatus::Open | ConnectionStatus::Closing => {
                    return self.connected();
                }
                ConnectionStatus::Idle => {}
                ConnectionStatus::Closed | ConnectionStatus::Errored => {
                    self.connected.store(Arc::new(Deferred::new()));
                }
            }
            state.status = ConnectionStatus::Connecting;
            state.error = None;
            state.connect_attempts += 1;
            self.connected()
        };

        let client = Arc::clone(self);
        tokio::spawn(async move {
            if !backoff.is_zero() {
                tokio::time::sleep(backoff).await;
            }
            client.open().await;
        });
        connected
    }

    async fn open(self: Arc<Self>) {
        debug!(url = %self.url, "Connecting");
        let stream = match timeout(self.options.connect_timeout, connect_async(self.url.as_str())).await
        {
            Ok(Ok((stream, _response))) => stream,
            Ok(Err(e)) => {
                self.on_error(e.into());
                return;
            }
            Err(_) => {
                self.on_error(WatchError::RequestTimeout(format!(
                    "Connection to {} timed out after {:?}",
                    self.url, self.options.connect_timeout
                )));
                return;
            }
        };

        let (write, read) = stream.split();
        let (tx, rx) = mpsc::unbounded_channel();
        {
            let mut state = self.state.lock();
            if state.status != ConnectionStatus::Connecting {
                debug!(url = %self.url, status = ?state.status, "Connection abandoned before open");
                return;
            }
            state.status = ConnectionStatus::Open;
            state.outbound = Some(tx);
            state.last_pong = Some(Instant::now());
            state
                .tasks
                .push(tokio::spawn(Arc::clone(&self).write_loop(write, rx)));
            state
                .tasks
                .push(tokio::spawn(Arc::clone(&self).read_loop(read)));
            if let Some(interval) = self.options.keep_alive {
                state.tasks.push(keepalive::spawn(
                    Arc::clone(&self),
                    interval,
                    self.options.max_ping_pong_misses,
                ));
            }
        }

        info!(url = %self.url, "Connected");
        self.connected().resolve(());
    }

    async fn write_loop(
        self: Arc<Self>,
        mut write: SplitSink<WsStream, Message>,
        mut rx: mpsc::UnboundedReceiver<Message>,
    ) {
        while let Some(frame) = rx.recv().await {
            let closing = matches!(frame, Message::Close(_));
            if let Err(e) = write.send(frame).await {
                self.on_error(e.into());
                return;
            }
            if closing {
                break;
            }
        }
    }

    async fn read_loop(self: Arc<Self>, mut read: SplitStream<WsStream>) {
        while let Some(frame) = read.next().await {
            match frame {
                Ok(Message::Text(text)) => self.dispatch(frames::decode_text(text.as_str())),
                Ok(Message::Binary(data)) => {
                    match frames::decode_binary(&data, self.options.compression) {
                        Ok(message) => self.dispatch(message),
                        Err(e) => warn!(url = %self.url, error = %e, "Dropping undecodable frame"),
                    }
                }
                Ok(Message::Ping(data)) => {
                    trace!(url = %self.url, "Received ping: {:?}", data);
                }
                Ok(Message::Pong(_)) => self.record_pong(),
                Ok(Message::Close(frame)) => {
                    debug!(url = %self.url, ?frame, "Close frame received");
                    break;
                }
                Ok(Message::Frame(_)) => {}
                Err(e) => {
                    self.on_error(e.into());
                    return;
                }
            }
        }
        self.on_close();
    }

    fn dispatch(self: &Arc<Self>, message: Value) {
        let handled = catch_unwind(AssertUnwindSafe(|| {
            self.handler.handle_message(self, message)
        }));
        if handled.is_err() {
            error!(url = %self.url, "Message handler panicked");
        }
    }

    /// Queue a message for sending. Strings go out verbatim, everything else
    /// as JSON text.
    pub fn send(&self, message: &Value) -> Result<(), WatchError> {
        let frame = match message {
            Value::String(text) => Message::Text(text.clone().into()),
            other => Message::Text(serde_json::to_string(other)?.into()),
        };
        trace!(url = %self.url, %message, "Sending");
        self.send_frame(frame)
    }

    pub(crate) fn send_frame(&self, frame: Message) -> Result<(), WatchError> {
        let state = self.state.lock();
        match (state.status, &state.outbound) {
            (ConnectionStatus::Open, Some(outbound)) => {
                outbound.send(frame).map_err(|_| WatchError::NotConnected)
            }
            _ => Err(WatchError::NotConnected),
        }
    }

    pub(crate) fn ping_message(&self) -> Option<Value> {
        self.handler.ping(self)
    }

    /// Repeatable future for `message_hash`, created on first use
    pub fn future(&self, message_hash: &str) -> Waiter<Payload> {
        let mut state = self.state.lock();
        match state.slots.entry(message_hash.to_string()) {
            Entry::Occupied(entry) => match entry.get() {
                Slot::Stream(cell) => cell.waiter(),
                Slot::Once(cell) => cell.waiter(),
            },
            Entry::Vacant(entry) => {
                let cell = Broadcast::new();
                let waiter = cell.waiter();
                entry.insert(Slot::Stream(cell));
                waiter
            }
        }
    }

    /// Single-settlement future for `message_hash`.
    ///
    /// A resolved one-shot stays settled until [`clear_future`] removes it; a
    /// rejected one is removed at once so the next call starts fresh.
    ///
    /// [`clear_future`]: ConnectionClient::clear_future
    pub fn one_shot(&self, message_hash: &str) -> Waiter<Payload> {
        let mut state = self.state.lock();
        match state.slots.entry(message_hash.to_string()) {
            Entry::Occupied(entry) => match entry.get() {
                Slot::Stream(cell) => cell.waiter(),
                Slot::Once(cell) => cell.waiter(),
            },
            Entry::Vacant(entry) => {
                let cell = Deferred::new();
                let waiter = cell.waiter();
                entry.insert(Slot::Once(cell));
                waiter
            }
        }
    }

    /// Settle the future for `message_hash`. Returns false when nobody
    /// registered that hash or a one-shot had already settled.
    pub fn resolve(&self, payload: Payload, message_hash: &str) -> bool {
        let state = self.state.lock();
        match state.slots.get(message_hash) {
            Some(Slot::Stream(cell)) => {
                cell.resolve(payload);
                true
            }
            Some(Slot::Once(cell)) => cell.resolve(payload),
            None => false,
        }
    }

    /// Reject one future, or every registered future when `message_hash` is
    /// `None`.
    pub fn reject(&self, error: WatchError, message_hash: Option<&str>) {
        let mut state = self.state.lock();
        match message_hash {
            Some(hash) => {
                let settled_once = match state.slots.get(hash) {
                    Some(Slot::Stream(cell)) => {
                        cell.reject(error);
                        false
                    }
                    Some(Slot::Once(cell)) => cell.reject(error),
                    None => false,
                };
                if settled_once {
                    state.slots.remove(hash);
                }
            }
            None => {
                for slot in state.slots.values() {
                    match slot {
                        Slot::Stream(cell) => cell.reject(error.clone()),
                        Slot::Once(cell) => {
                            cell.reject(error.clone());
                        }
                    }
                }
                state.slots.retain(|_, slot| matches!(slot, Slot::Stream(_)));
            }
        }
    }

    pub fn clear_future(&self, message_hash: &str) {
        self.state.lock().slots.remove(message_hash);
    }

    /// Last value resolved on a repeatable future
    pub fn latest(&self, message_hash: &str) -> Option<Payload> {
        match self.state.lock().slots.get(message_hash) {
            Some(Slot::Stream(cell)) => cell.latest(),
            _ => None,
        }
    }

    /// Record `subscribe_hash` unless present. Returns true if this call
    /// inserted it, which makes the caller responsible for sending the
    /// subscribe message.
    pub fn subscribe_once(&self, subscribe_hash: &str, subscription: Value) -> bool {
        let mut state = self.state.lock();
        match state.subscriptions.entry(subscribe_hash.to_string()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(entry) => {
                entry.insert(subscription);
                true
            }
        }
    }

    pub fn subscription(&self, subscribe_hash: &str) -> Option<Value> {
        self.state.lock().subscriptions.get(subscribe_hash).cloned()
    }

    pub fn has_subscription(&self, subscribe_hash: &str) -> bool {
        self.state.lock().subscriptions.contains_key(subscribe_hash)
    }

    /// Overwrite a subscription record, e.g. to bump a retry counter
    pub fn set_subscription(&self, subscribe_hash: &str, subscription: Value) {
        self.state
            .lock()
            .subscriptions
            .insert(subscribe_hash.to_string(), subscription);
    }

    pub fn remove_subscription(&self, subscribe_hash: &str) -> Option<Value> {
        self.state.lock().subscriptions.remove(subscribe_hash)
    }

    pub fn subscription_hashes(&self) -> Vec<String> {
        self.state.lock().subscriptions.keys().cloned().collect()
    }

    pub fn record_pong(&self) {
        self.state.lock().last_pong = Some(Instant::now());
    }

    pub fn last_pong(&self) -> Option<Instant> {
        self.state.lock().last_pong
    }

    /// Send a close frame and stop background tasks. Pending futures are
    /// rejected once the close completes.
    pub fn close(&self) {
        let (outbound, tasks) = {
            let mut state = self.state.lock();
            match state.status {
                ConnectionStatus::Open => {
                    state.status = ConnectionStatus::Closing;
                    (state.outbound.take(), Vec::new())
                }
                ConnectionStatus::Closing => return,
                _ => {
                    state.status = ConnectionStatus::Closed;
                    state.outbound = None;
                    (None, std::mem::take(&mut state.tasks))
                }
            }
        };
        debug!(url = %self.url, "Closing");
        if let Some(outbound) = outbound {
            let _ = outbound.send(Message::Close(None));
        }
        for task in tasks {
            task.abort();
        }
        self.connected().reject(WatchError::Closed);
    }

    /// Transport failure: reject the connected future if it is still
    /// pending, reject every data future if the connection had opened, then
    /// notify the observer.
    pub fn on_error(&self, error: WatchError) {
        let (was_open, tasks) = {
            let mut state = self.state.lock();
            if state.status == ConnectionStatus::Errored {
                return;
            }
            let was_open = matches!(
                state.status,
                ConnectionStatus::Open | ConnectionStatus::Closing
            );
            state.status = ConnectionStatus::Errored;
            state.error = Some(error.clone());
            state.outbound = None;
            (was_open, std::mem::take(&mut state.tasks))
        };
        for task in tasks {
            task.abort();
        }

        warn!(url = %self.url, error = %error, "Connection error");
        self.connected().reject(error.clone());
        if was_open {
            self.reject(error.clone(), None);
        }
        if let Some(observer) = self.observer() {
            observer.on_error(self, &error);
        }
    }

    fn on_close(&self) {
        let (had_error, was_closing, tasks) = {
            let mut state = self.state.lock();
            let had_error = state.error.is_some();
            let was_closing = state.status == ConnectionStatus::Closing;
            if state.status != ConnectionStatus::Errored {
                state.status = ConnectionStatus::Closed;
            }
            state.outbound = None;
            (had_error, was_closing, std::mem::take(&mut state.tasks))
        };
        for task in tasks {
            task.abort();
        }

        if !had_error {
            let error = if was_closing {
                info!(url = %self.url, "Connection closed");
                WatchError::Network(format!("Connection to {} closed", self.url))
            } else {
                warn!(url = %self.url, "Connection closed by remote server");
                WatchError::Network(format!(
                    "Connection to {} closed by remote server",
                    self.url
                ))
            };
            self.connected().reject(error.clone());
            self.reject(error, None);
        }
        if let Some(observer) = self.observer() {
            observer.on_close(self);
        }
    }

    fn observer(&self) -> Option<Arc<dyn ConnectionObserver>> {
        self.observer.as_ref().and_then(Weak::upgrade)
    }
}

impl Drop for ConnectionClient {
    fn drop(&mut self) {
        for task in self.state.get_mut().tasks.drain(..) {
            task.abort();
        }
    }
}
