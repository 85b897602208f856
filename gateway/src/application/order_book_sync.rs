//! Order book reconciliation
//!
//! Deltas that arrive before a snapshot are cached on the book. When the
//! snapshot lands it replaces the book, the cache is replayed in arrival
//! order under the exchange's nonce rule, and the book goes live. A snapshot
//! that predates the cached deltas is refetched a bounded number of times.

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::shared::Shared;
use crate::domain::{
    DeltaOutcome, DepthDelta, DepthFetcher, NonceRule, OrderBook, OrderBookSnapshot, Payload,
    WatchError,
};
use crate::infrastructure::ConnectionClient;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotOutcome {
    /// Snapshot applied and the delta cache replayed
    Synchronized { replayed: usize, discarded: usize },
    /// Snapshot too old for the cached deltas; fetch again as `attempt`
    Retry { attempt: u32 },
}

#[derive(Debug, Clone)]
pub struct OrderBookSynchronizer {
    rule: NonceRule,
    max_attempts: u32,
}

impl OrderBookSynchronizer {
    pub fn new(rule: NonceRule, max_attempts: u32) -> Self {
        OrderBookSynchronizer {
            rule,
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn rule(&self) -> NonceRule {
        self.rule
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Cache the delta until the book is synchronized, then apply it live
    pub fn on_delta(
        &self,
        book: &mut OrderBook,
        delta: DepthDelta,
    ) -> Result<DeltaOutcome, WatchError> {
        if !book.is_synchronized() {
            book.cache_delta(delta);
            return Ok(DeltaOutcome::Cached);
        }
        book.apply_delta(&delta, self.rule)
    }

    /// Whether `snapshot` connects to the oldest cached delta.
    ///
    /// Contiguous feeds accept a snapshot right before the first delta;
    /// other sequence feeds need the snapshot at or past it. Timestamps are
    /// not comparable across REST and stream, so they always pass.
    pub fn is_usable(&self, book: &OrderBook, snapshot: &OrderBookSnapshot) -> bool {
        let first_cached = book
            .cache
            .first()
            .and_then(|delta| delta.first_nonce.or(delta.nonce));
        let (Some(nonce), Some(first)) = (snapshot.nonce, first_cached) else {
            return true;
        };
        match self.rule {
            NonceRule::Timestamp => true,
            NonceRule::Sequential | NonceRule::RangeCovering => nonce.saturating_add(1) >= first,
            NonceRule::StrictlyGreater | NonceRule::GreaterOrEqual => nonce >= first,
        }
    }

    /// Apply `snapshot` (the `attempt`-th one, counting from 1) and replay
    /// the cached deltas.
    ///
    /// Fails with [`WatchError::InvalidNonce`] once `max_attempts` snapshots
    /// were unusable, or when the replay hits a gap.
    pub fn on_snapshot(
        &self,
        book: &mut OrderBook,
        snapshot: &OrderBookSnapshot,
        attempt: u32,
    ) -> Result<SnapshotOutcome, WatchError> {
        let symbol = book.symbol.clone().unwrap_or_default();
        if !self.is_usable(book, snapshot) {
            if attempt < self.max_attempts {
                debug!(
                    symbol = %symbol,
                    attempt,
                    snapshot_nonce = ?snapshot.nonce,
                    "Snapshot older than cached deltas, refetching"
                );
                return Ok(SnapshotOutcome::Retry {
                    attempt: attempt + 1,
                });
            }
            return Err(WatchError::InvalidNonce(format!(
                "{} failed to synchronize order book after {} snapshot attempts",
                symbol, self.max_attempts
            )));
        }

        book.reset_with(snapshot, self.rule);
        let cached = std::mem::take(&mut book.cache);
        let mut replayed = 0;
        let mut discarded = 0;
        for delta in &cached {
            match book.apply_delta(delta, self.rule)? {
                DeltaOutcome::Applied => replayed += 1,
                _ => discarded += 1,
            }
        }

        info!(
            symbol = %symbol,
            nonce = ?book.nonce,
            replayed,
            discarded,
            "Order book synchronized"
        );
        Ok(SnapshotOutcome::Synchronized {
            replayed,
            discarded,
        })
    }
}

/// Which book a background snapshot fetch is for
#[derive(Debug, Clone)]
pub(crate) struct SnapshotRequest {
    pub symbol: String,
    pub limit: Option<usize>,
    pub message_hash: String,
    pub subscribe_hash: String,
}

enum Step {
    Done,
    Retry,
    Failed(WatchError),
}

/// Fetch REST snapshots until the book synchronizes, the attempts run out,
/// or the book disappears.
///
/// On success the book is resolved under the request's message hash. On
/// failure the book is dropped, the message hash rejected, and the
/// subscribe hash record removed so the next watch subscribes again.
pub(crate) async fn synchronize_from_snapshots(
    shared: Arc<Shared>,
    fetcher: Arc<dyn DepthFetcher>,
    client: Arc<ConnectionClient>,
    request: SnapshotRequest,
) -> Result<(), WatchError> {
    let SnapshotRequest {
        symbol,
        limit,
        message_hash,
        subscribe_hash,
    } = request;

    loop {
        debug!(symbol = %symbol, "Fetching order book snapshot");
        let fetched = fetcher
            .fetch_order_book(&symbol, limit)
            .await
            .map_err(WatchError::from);

        let step = {
            let mut state = shared.state.lock();
            let attempt = state.begin_snapshot_attempt(&symbol);
            let Some(book) = state.order_books.get_mut(&symbol) else {
                debug!(symbol = %symbol, "Order book dropped before snapshot arrived");
                return Ok(());
            };
            let outcome = fetched
                .and_then(|snapshot| shared.synchronizer.on_snapshot(book, &snapshot, attempt));
            match outcome {
                Ok(SnapshotOutcome::Synchronized { .. }) => {
                    let payload = Payload::OrderBook(book.clone());
                    state.finish_snapshot(&symbol);
                    client.resolve(payload, &message_hash);
                    Step::Done
                }
                Ok(SnapshotOutcome::Retry { .. }) => Step::Retry,
                Err(e) => {
                    state.invalidate_order_book(&symbol);
                    Step::Failed(e)
                }
            }
        };

        match step {
            Step::Done => return Ok(()),
            Step::Retry => {
                if !client.has_subscription(&subscribe_hash) {
                    return Ok(());
                }
                tokio::time::sleep(shared.options.snapshot_delay).await;
            }
            Step::Failed(e) => {
                warn!(symbol = %symbol, error = %e, "Order book synchronization failed");
                client.reject(e.clone(), Some(&message_hash));
                client.remove_subscription(&subscribe_hash);
                return Err(e);
            }
        }
    }
}
