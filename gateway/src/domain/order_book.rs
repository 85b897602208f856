use rust_decimal::Decimal;
use tracing::{trace, warn};
use trading_core::{PriceLevel, iso8601};

use super::book_side::{BookKind, BookSide, BookSideKind, LevelUpdate};
use super::error::WatchError;
use super::nonce::{NonceCheck, NonceRule};

/// Full book state as delivered by a snapshot (REST or stream)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderBookSnapshot {
    pub bids: Vec<LevelUpdate>,
    pub asks: Vec<LevelUpdate>,
    pub nonce: Option<i64>,
    pub timestamp: Option<i64>,
}

impl OrderBookSnapshot {
    pub fn new(bids: Vec<LevelUpdate>, asks: Vec<LevelUpdate>) -> Self {
        OrderBookSnapshot {
            bids,
            asks,
            nonce: None,
            timestamp: None,
        }
    }

    pub fn with_nonce(mut self, nonce: i64) -> Self {
        self.nonce = Some(nonce);
        self
    }

    pub fn with_timestamp(mut self, timestamp: i64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Indicator the book starts from under `rule`, matching what
    /// [`DepthDelta::sequence`] compares against it
    pub fn sequence(&self, rule: NonceRule) -> Option<i64> {
        match rule {
            NonceRule::Timestamp => self.timestamp.or(self.nonce),
            _ => self.nonce.or(self.timestamp),
        }
    }
}

/// Incremental book update.
///
/// `nonce` is the last sequence number the delta covers; feeds that send
/// ranges also set `first_nonce`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DepthDelta {
    pub bids: Vec<LevelUpdate>,
    pub asks: Vec<LevelUpdate>,
    pub nonce: Option<i64>,
    pub first_nonce: Option<i64>,
    pub timestamp: Option<i64>,
}

impl DepthDelta {
    pub fn new(bids: Vec<LevelUpdate>, asks: Vec<LevelUpdate>) -> Self {
        DepthDelta {
            bids,
            asks,
            ..Default::default()
        }
    }

    pub fn with_nonce(mut self, nonce: i64) -> Self {
        self.nonce = Some(nonce);
        self
    }

    pub fn with_range(mut self, first: i64, last: i64) -> Self {
        self.first_nonce = Some(first);
        self.nonce = Some(last);
        self
    }

    pub fn with_timestamp(mut self, timestamp: i64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Indicator compared under `rule`
    pub fn sequence(&self, rule: NonceRule) -> Option<i64> {
        match rule {
            NonceRule::Timestamp => self.timestamp.or(self.nonce),
            _ => self.nonce,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeltaOutcome {
    /// Book has no snapshot yet; the delta was queued
    Cached,
    Applied,
    /// Older than the book; dropped
    Stale,
    /// No book exists for the symbol
    Untracked,
}

/// Two-sided book with sequence bookkeeping.
///
/// `nonce` stays `None` until a snapshot lands; deltas received before that
/// are queued in `cache` and replayed once the snapshot is applied.
#[derive(Debug, Clone)]
pub struct OrderBook {
    pub symbol: Option<String>,
    pub bids: BookSide,
    pub asks: BookSide,
    pub nonce: Option<i64>,
    pub timestamp: Option<i64>,
    pub datetime: Option<String>,
    pub cache: Vec<DepthDelta>,
}

impl OrderBook {
    pub fn with_kind(kind: BookKind, depth: Option<usize>) -> Self {
        OrderBook {
            symbol: None,
            bids: BookSide::new(BookSideKind::Bids, kind, depth),
            asks: BookSide::new(BookSideKind::Asks, kind, depth),
            nonce: None,
            timestamp: None,
            datetime: None,
            cache: Vec::new(),
        }
    }

    /// Price-keyed book
    pub fn new(depth: Option<usize>) -> Self {
        Self::with_kind(BookKind::Plain, depth)
    }

    /// Order-id-keyed book
    pub fn indexed(depth: Option<usize>) -> Self {
        Self::with_kind(BookKind::Indexed, depth)
    }

    /// Price-keyed book with per-level order counts
    pub fn counted(depth: Option<usize>) -> Self {
        Self::with_kind(BookKind::Counted, depth)
    }

    pub fn from_snapshot(snapshot: &OrderBookSnapshot, depth: Option<usize>) -> Self {
        let mut book = Self::new(depth);
        book.reset(snapshot);
        book
    }

    pub fn with_symbol(mut self, symbol: impl Into<String>) -> Self {
        self.symbol = Some(symbol.into());
        self
    }

    pub fn kind(&self) -> BookKind {
        self.bids.kind()
    }

    pub fn depth(&self) -> Option<usize> {
        self.bids.depth()
    }

    /// A book is synchronized once a snapshot has set its nonce
    pub fn is_synchronized(&self) -> bool {
        self.nonce.is_some()
    }

    /// Replace both sides with `snapshot` for a sequence-numbered feed.
    ///
    /// A snapshot always synchronizes the book. Feeds without sequence
    /// numbers start from the snapshot timestamp, or zero.
    pub fn reset(&mut self, snapshot: &OrderBookSnapshot) {
        self.reset_with(snapshot, NonceRule::default());
    }

    /// Replace both sides with `snapshot`, seeding the nonce with the
    /// indicator deltas are compared by under `rule`
    pub fn reset_with(&mut self, snapshot: &OrderBookSnapshot, rule: NonceRule) {
        self.bids.clear();
        self.asks.clear();
        for level in &snapshot.bids {
            self.bids.store(level.clone());
        }
        for level in &snapshot.asks {
            self.asks.store(level.clone());
        }
        self.nonce = Some(snapshot.sequence(rule).unwrap_or(0));
        match snapshot.timestamp {
            Some(timestamp) => self.set_timestamp(timestamp),
            None => {
                self.timestamp = None;
                self.datetime = None;
            }
        }
    }

    pub fn set_timestamp(&mut self, timestamp: i64) {
        self.timestamp = Some(timestamp);
        self.datetime = iso8601(timestamp);
    }

    /// Queue a delta received before the book is synchronized
    pub fn cache_delta(&mut self, delta: DepthDelta) {
        self.cache.push(delta);
    }

    /// Apply a delta under `rule`.
    ///
    /// Unsynchronized books queue the delta instead. A delta without any
    /// sequence indicator is applied unconditionally. Returns
    /// [`WatchError::InvalidNonce`] when the rule detects a gap; the book is
    /// left untouched in that case.
    pub fn apply_delta(
        &mut self,
        delta: &DepthDelta,
        rule: NonceRule,
    ) -> Result<DeltaOutcome, WatchError> {
        let Some(current) = self.nonce else {
            self.cache.push(delta.clone());
            return Ok(DeltaOutcome::Cached);
        };

        let Some(sequence) = delta.sequence(rule) else {
            self.apply_levels(delta);
            if let Some(timestamp) = delta.timestamp {
                self.set_timestamp(timestamp);
            }
            return Ok(DeltaOutcome::Applied);
        };

        match rule.check(current, delta.first_nonce, sequence) {
            NonceCheck::Apply => {
                if sequence == current && rule == NonceRule::GreaterOrEqual {
                    warn!(
                        symbol = ?self.symbol,
                        nonce = sequence,
                        "Re-applying delta with equal nonce"
                    );
                }
                self.apply_levels(delta);
                self.nonce = Some(sequence);
                if let Some(timestamp) = delta.timestamp {
                    self.set_timestamp(timestamp);
                }
                Ok(DeltaOutcome::Applied)
            }
            NonceCheck::Stale => {
                trace!(
                    symbol = ?self.symbol,
                    current,
                    received = sequence,
                    "Dropping stale delta"
                );
                Ok(DeltaOutcome::Stale)
            }
            NonceCheck::Gap { expected, received } => Err(WatchError::InvalidNonce(format!(
                "{}: expected {}, received {}",
                self.symbol.as_deref().unwrap_or("order book"),
                expected,
                received
            ))),
        }
    }

    fn apply_levels(&mut self, delta: &DepthDelta) {
        for level in &delta.bids {
            self.bids.store(level.clone());
        }
        for level in &delta.asks {
            self.asks.store(level.clone());
        }
    }

    /// Copy truncated to the best `n` levels per side. The delta queue is
    /// not carried over.
    pub fn limit(&self, n: Option<usize>) -> OrderBook {
        let (bids, asks) = match n {
            Some(n) => (self.bids.limited(n), self.asks.limited(n)),
            None => (self.bids.clone(), self.asks.clone()),
        };
        OrderBook {
            symbol: self.symbol.clone(),
            bids,
            asks,
            nonce: self.nonce,
            timestamp: self.timestamp,
            datetime: self.datetime.clone(),
            cache: Vec::new(),
        }
    }

    pub fn best_bid(&self) -> Option<PriceLevel> {
        self.bids.best()
    }

    pub fn best_ask(&self) -> Option<PriceLevel> {
        self.asks.best()
    }

    pub fn spread(&self) -> Option<Decimal> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => Some(ask.price - bid.price),
            _ => None,
        }
    }

    pub fn mid_price(&self) -> Option<Decimal> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => Some((bid.price + ask.price) / Decimal::TWO),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn level(price: Decimal, size: Decimal) -> LevelUpdate {
        LevelUpdate::new(price, size)
    }

    fn snapshot() -> OrderBookSnapshot {
        OrderBookSnapshot::new(
            vec![level(dec!(100), dec!(1)), level(dec!(99), dec!(2))],
            vec![level(dec!(101), dec!(1))],
        )
        .with_nonce(5)
    }

    #[test]
    fn test_snapshot_then_delta() {
        let mut book = OrderBook::from_snapshot(&snapshot(), None);
        let delta = DepthDelta::new(vec![level(dec!(100), dec!(0))], vec![]).with_nonce(6);

        let outcome = book.apply_delta(&delta, NonceRule::StrictlyGreater);

        assert_eq!(outcome, Ok(DeltaOutcome::Applied));
        assert_eq!(book.bids.len(), 1);
        assert_eq!(book.best_bid().map(|l| l.price), Some(dec!(99)));
        assert_eq!(book.best_ask().map(|l| l.price), Some(dec!(101)));
        assert_eq!(book.nonce, Some(6));
    }

    #[test]
    fn test_out_of_order_delta_is_dropped() {
        let mut book = OrderBook::from_snapshot(&snapshot(), None);
        let newer = DepthDelta::new(vec![level(dec!(100), dec!(3))], vec![]).with_nonce(7);
        let older = DepthDelta::new(vec![level(dec!(100), dec!(9))], vec![]).with_nonce(6);

        assert_eq!(
            book.apply_delta(&newer, NonceRule::StrictlyGreater),
            Ok(DeltaOutcome::Applied)
        );
        assert_eq!(
            book.apply_delta(&older, NonceRule::StrictlyGreater),
            Ok(DeltaOutcome::Stale)
        );
        assert_eq!(book.bids.size_at(dec!(100)), Some(dec!(3)));
        assert_eq!(book.nonce, Some(7));
    }

    #[test]
    fn test_unsynchronized_book_caches() {
        let mut book = OrderBook::new(None);
        let delta = DepthDelta::new(vec![level(dec!(1), dec!(1))], vec![]).with_nonce(1);

        assert_eq!(
            book.apply_delta(&delta, NonceRule::Sequential),
            Ok(DeltaOutcome::Cached)
        );
        assert!(book.bids.is_empty());
        assert_eq!(book.cache.len(), 1);
    }

    #[test]
    fn test_gap_leaves_book_untouched() {
        let mut book = OrderBook::from_snapshot(&snapshot(), None).with_symbol("BTC/USD");
        let delta = DepthDelta::new(vec![level(dec!(100), dec!(0))], vec![]).with_nonce(9);

        let err = book.apply_delta(&delta, NonceRule::Sequential);

        assert_eq!(
            err,
            Err(WatchError::InvalidNonce(
                "BTC/USD: expected 6, received 9".to_string()
            ))
        );
        assert_eq!(book.bids.len(), 2);
        assert_eq!(book.nonce, Some(5));
    }

    #[test]
    fn test_timestamp_rule_tracks_latest() {
        let mut book = OrderBook::from_snapshot(
            &OrderBookSnapshot::new(vec![], vec![]).with_timestamp(1_000),
            None,
        );
        let delta = DepthDelta::new(vec![level(dec!(5), dec!(1))], vec![]).with_timestamp(1_500);
        let late = DepthDelta::new(vec![level(dec!(5), dec!(0))], vec![]).with_timestamp(1_200);

        book.apply_delta(&delta, NonceRule::Timestamp).unwrap();
        book.apply_delta(&late, NonceRule::Timestamp).unwrap();

        assert_eq!(book.timestamp, Some(1_500));
        assert_eq!(book.datetime.as_deref(), Some("1970-01-01T00:00:01.500Z"));
        assert_eq!(book.bids.len(), 1);
    }

    #[test]
    fn test_timestamp_rule_ignores_snapshot_sequence_number() {
        let snapshot = OrderBookSnapshot::new(vec![level(dec!(100), dec!(1))], vec![])
            .with_nonce(12_345)
            .with_timestamp(1_700_000_002_000);
        let mut book = OrderBook::new(None);
        book.reset_with(&snapshot, NonceRule::Timestamp);
        assert_eq!(book.nonce, Some(1_700_000_002_000));

        let older = DepthDelta::new(vec![level(dec!(100), dec!(0))], vec![])
            .with_timestamp(1_700_000_001_000);
        assert_eq!(
            book.apply_delta(&older, NonceRule::Timestamp),
            Ok(DeltaOutcome::Stale)
        );
        assert_eq!(book.bids.size_at(dec!(100)), Some(dec!(1)));
        assert_eq!(book.nonce, Some(1_700_000_002_000));

        // Sequence feeds keep starting from the sequence number
        book.reset_with(&snapshot, NonceRule::StrictlyGreater);
        assert_eq!(book.nonce, Some(12_345));
    }

    #[test]
    fn test_reset_replaces_contents() {
        let mut book = OrderBook::from_snapshot(&snapshot(), None);
        book.reset(&OrderBookSnapshot::new(vec![level(dec!(50), dec!(1))], vec![]).with_nonce(20));

        assert_eq!(book.bids.len(), 1);
        assert!(book.asks.is_empty());
        assert_eq!(book.nonce, Some(20));
        assert_eq!(book.spread(), None);
    }

    #[test]
    fn test_limit_copies_top_levels() {
        let book = OrderBook::from_snapshot(&snapshot(), None);
        let limited = book.limit(Some(1));

        assert_eq!(limited.bids.len(), 1);
        assert_eq!(limited.best_bid().map(|l| l.price), Some(dec!(100)));
        assert_eq!(book.bids.len(), 2);
        assert_eq!(limited.spread(), Some(dec!(1)));
        assert_eq!(limited.mid_price(), Some(dec!(100.5)));
    }
}
