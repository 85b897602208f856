use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use super::error::{FetchError, WatchError};
use super::nonce::NonceRule;
use super::order_book::OrderBookSnapshot;
use super::subscription::{AuthRequest, SubscribeRequest};
use crate::application::context::HandlerContext;
use crate::infrastructure::ws_client::ConnectionClient;

/// Trait for fetching order book snapshots out of band (usually REST)
///
/// Uses domain-level FetchError to avoid infrastructure leakage.
#[async_trait]
pub trait DepthFetcher: Send + Sync {
    async fn fetch_order_book(
        &self,
        symbol: &str,
        limit: Option<usize>,
    ) -> Result<OrderBookSnapshot, FetchError>;
}

/// Routes decoded inbound frames of one connection.
///
/// Called from the connection's reader task in arrival order, one message at
/// a time.
pub trait MessageHandler: Send + Sync {
    fn handle_message(&self, client: &Arc<ConnectionClient>, message: Value);

    /// Application-level keepalive frame. `None` sends a protocol ping.
    fn ping(&self, _client: &ConnectionClient) -> Option<Value> {
        None
    }
}

/// Lifecycle notifications from a connection
pub trait ConnectionObserver: Send + Sync {
    fn on_error(&self, client: &ConnectionClient, error: &WatchError);

    fn on_close(&self, client: &ConnectionClient);
}

/// Exchange-specific protocol knowledge.
///
/// The adapter builds outbound subscribe messages and parses inbound
/// messages into book, trade and account updates through the
/// [`HandlerContext`]. Streams the exchange does not offer keep the default
/// and fail with [`WatchError::NotSupported`].
pub trait ProtocolAdapter: Send + Sync + 'static {
    fn id(&self) -> &str;

    fn handle_message(&self, ctx: &mut HandlerContext<'_>, message: Value);

    fn ping(&self, _client: &ConnectionClient) -> Option<Value> {
        None
    }

    fn nonce_rule(&self) -> NonceRule {
        NonceRule::default()
    }

    fn order_book_request(
        &self,
        _symbol: &str,
        _limit: Option<usize>,
    ) -> Result<SubscribeRequest, WatchError> {
        Err(not_supported(self.id(), "watch_order_book"))
    }

    fn trades_request(&self, _symbol: &str) -> Result<SubscribeRequest, WatchError> {
        Err(not_supported(self.id(), "watch_trades"))
    }

    fn ticker_request(&self, _symbol: &str) -> Result<SubscribeRequest, WatchError> {
        Err(not_supported(self.id(), "watch_ticker"))
    }

    fn ohlcv_request(
        &self,
        _symbol: &str,
        _timeframe: &str,
    ) -> Result<SubscribeRequest, WatchError> {
        Err(not_supported(self.id(), "watch_ohlcv"))
    }

    fn orders_request(&self, _symbol: Option<&str>) -> Result<SubscribeRequest, WatchError> {
        Err(not_supported(self.id(), "watch_orders"))
    }

    fn my_trades_request(&self, _symbol: Option<&str>) -> Result<SubscribeRequest, WatchError> {
        Err(not_supported(self.id(), "watch_my_trades"))
    }

    fn balance_request(&self) -> Result<SubscribeRequest, WatchError> {
        Err(not_supported(self.id(), "watch_balance"))
    }

    /// Login message for `url`. `Ok(None)` means private streams need no login.
    fn auth_request(&self, _url: &str) -> Result<Option<AuthRequest>, WatchError> {
        Ok(None)
    }
}

fn not_supported(exchange: &str, method: &str) -> WatchError {
    WatchError::NotSupported(format!("{} {}() is not supported yet", exchange, method))
}
