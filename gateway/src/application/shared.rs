use std::sync::{Arc, Weak};

use dashmap::DashMap;
use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::config::WatchOptions;
use super::context::HandlerContext;
use super::order_book_sync::OrderBookSynchronizer;
use crate::domain::{
    ConnectionObserver, DepthFetcher, MarketState, MessageHandler, ProtocolAdapter, WatchError,
};
use crate::infrastructure::{ConnectionClient, Throttle};

/// State shared by an exchange, its connections and background tasks
pub(crate) struct Shared {
    pub state: Mutex<MarketState>,
    pub options: WatchOptions,
    pub synchronizer: OrderBookSynchronizer,
    pub fetcher: Option<Arc<dyn DepthFetcher>>,
    pub registry: Arc<ClientRegistry>,
    pub throttle: Throttle,
}

impl Shared {
    pub fn new(
        options: WatchOptions,
        synchronizer: OrderBookSynchronizer,
        fetcher: Option<Arc<dyn DepthFetcher>>,
    ) -> Self {
        let throttle = Throttle::new(options.rate_limit, options.rate_limit_capacity);
        Shared {
            state: Mutex::new(MarketState::new()),
            options,
            synchronizer,
            fetcher,
            registry: Arc::new(ClientRegistry::default()),
            throttle,
        }
    }
}

/// Connections keyed by URL.
///
/// Observes every connection it creates and evicts it after an error or a
/// remote close, so the next watch on that URL starts a new connection.
#[derive(Default)]
pub(crate) struct ClientRegistry {
    clients: DashMap<String, Arc<ConnectionClient>>,
}

impl ClientRegistry {
    pub fn get_or_create(
        &self,
        url: &str,
        create: impl FnOnce() -> ConnectionClient,
    ) -> Arc<ConnectionClient> {
        self.clients
            .entry(url.to_string())
            .or_insert_with(|| Arc::new(create()))
            .clone()
    }

    pub fn get(&self, url: &str) -> Option<Arc<ConnectionClient>> {
        self.clients.get(url).map(|entry| Arc::clone(entry.value()))
    }

    pub fn all(&self) -> Vec<Arc<ConnectionClient>> {
        self.clients
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }

    /// Remove `client` if it is still the registered connection for its URL
    pub fn evict(&self, client: &ConnectionClient) -> bool {
        self.clients
            .remove_if(client.url(), |_, registered| {
                std::ptr::eq(Arc::as_ptr(registered), client)
            })
            .is_some()
    }

    pub fn drain(&self) -> Vec<Arc<ConnectionClient>> {
        let clients = self.all();
        self.clients.clear();
        clients
    }
}

impl ConnectionObserver for ClientRegistry {
    fn on_error(&self, client: &ConnectionClient, error: &WatchError) {
        if self.evict(client) {
            warn!(url = %client.url(), error = %error, "Evicted connection after error");
        }
    }

    fn on_close(&self, client: &ConnectionClient) {
        if client.error().is_none() && self.evict(client) {
            info!(url = %client.url(), "Evicted closed connection");
        }
    }
}

/// Routes inbound messages of every connection to the protocol adapter
pub(crate) struct Dispatcher<A: ProtocolAdapter> {
    pub shared: Weak<Shared>,
    pub adapter: Arc<A>,
}

impl<A: ProtocolAdapter> MessageHandler for Dispatcher<A> {
    fn handle_message(&self, client: &Arc<ConnectionClient>, message: Value) {
        let Some(shared) = self.shared.upgrade() else {
            debug!(url = %client.url(), "Exchange dropped, ignoring message");
            return;
        };
        let mut state = shared.state.lock();
        let mut ctx = HandlerContext::new(client, &mut state, &shared);
        self.adapter.handle_message(&mut ctx, message);
    }

    fn ping(&self, client: &ConnectionClient) -> Option<Value> {
        self.adapter.ping(client)
    }
}
