use std::collections::{BTreeMap, HashMap};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use trading_core::PriceLevel;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookSideKind {
    Bids,
    Asks,
}

/// How levels are keyed and when they are removed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookKind {
    /// One level per price; size 0 removes it
    #[default]
    Plain,
    /// Per-price order count; size 0 or count 0 removes the level
    Counted,
    /// One entry per order id; an id moves when its price changes
    Indexed,
}

/// A single inbound level change
#[derive(Debug, Clone, PartialEq)]
pub struct LevelUpdate {
    pub price: Decimal,
    pub size: Decimal,
    pub count: Option<u32>,
    pub id: Option<String>,
}

impl LevelUpdate {
    pub fn new(price: Decimal, size: Decimal) -> Self {
        LevelUpdate {
            price,
            size,
            count: None,
            id: None,
        }
    }

    pub fn counted(price: Decimal, size: Decimal, count: u32) -> Self {
        LevelUpdate {
            count: Some(count),
            ..Self::new(price, size)
        }
    }

    pub fn indexed(price: Decimal, size: Decimal, id: impl Into<String>) -> Self {
        LevelUpdate {
            id: Some(id.into()),
            ..Self::new(price, size)
        }
    }

    /// Parse a `[price, size]` string pair as most venues send them
    pub fn parse(price: &str, size: &str) -> Option<Self> {
        match (price.parse::<Decimal>(), size.parse::<Decimal>()) {
            (Ok(price), Ok(size)) => Some(Self::new(price, size)),
            _ => None,
        }
    }

    /// Parse a list of string pairs, skipping malformed entries
    pub fn parse_pairs(pairs: &[[String; 2]]) -> Vec<Self> {
        pairs
            .iter()
            .filter_map(|[price, size]| Self::parse(price, size))
            .collect()
    }

    pub fn is_removal(&self) -> bool {
        self.size.is_zero() || self.count == Some(0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
struct LevelKey {
    price: Decimal,
    id: Option<String>,
}

#[derive(Debug, Clone)]
struct Level {
    size: Decimal,
    count: Option<u32>,
}

/// One side of an order book.
///
/// Levels are kept sorted by price (bids iterate descending, asks
/// ascending), zero-size levels are never stored, and an optional depth cap
/// drops the worst-priced levels on overflow.
#[derive(Debug, Clone)]
pub struct BookSide {
    side: BookSideKind,
    kind: BookKind,
    levels: BTreeMap<LevelKey, Level>,
    /// Order id to its current price, indexed sides only
    ids: HashMap<String, Decimal>,
    depth: Option<usize>,
}

impl BookSide {
    pub fn new(side: BookSideKind, kind: BookKind, depth: Option<usize>) -> Self {
        BookSide {
            side,
            kind,
            levels: BTreeMap::new(),
            ids: HashMap::new(),
            depth,
        }
    }

    pub fn side(&self) -> BookSideKind {
        self.side
    }

    pub fn kind(&self) -> BookKind {
        self.kind
    }

    pub fn depth(&self) -> Option<usize> {
        self.depth
    }

    /// Apply one level change according to the side's kind
    pub fn store(&mut self, update: LevelUpdate) {
        match (self.kind, update.id) {
            (BookKind::Indexed, Some(id)) => self.store_indexed(update.price, update.size, id),
            (BookKind::Counted, _) => {
                self.store_level(update.price, update.size, update.count)
            }
            (_, _) => self.store_level(update.price, update.size, None),
        }
        self.enforce_depth();
    }

    fn store_level(&mut self, price: Decimal, size: Decimal, count: Option<u32>) {
        let key = LevelKey { price, id: None };
        if size.is_zero() || count == Some(0) {
            self.levels.remove(&key);
        } else {
            self.levels.insert(key, Level { size, count });
        }
    }

    fn store_indexed(&mut self, price: Decimal, size: Decimal, id: String) {
        if let Some(previous) = self.ids.remove(&id) {
            self.levels.remove(&LevelKey {
                price: previous,
                id: Some(id.clone()),
            });
        }
        if size.is_zero() {
            return;
        }
        self.ids.insert(id.clone(), price);
        self.levels.insert(
            LevelKey {
                price,
                id: Some(id),
            },
            Level { size, count: None },
        );
    }

    fn enforce_depth(&mut self) {
        let Some(depth) = self.depth else {
            return;
        };
        while self.levels.len() > depth {
            let evicted = match self.side {
                BookSideKind::Bids => self.levels.pop_first(),
                BookSideKind::Asks => self.levels.pop_last(),
            };
            if let Some((LevelKey { id: Some(id), .. }, _)) = evicted {
                self.ids.remove(&id);
            }
        }
    }

    /// Remove a price level, or every order resting at it on an indexed side
    pub fn remove(&mut self, price: Decimal) {
        let keys: Vec<LevelKey> = self
            .levels
            .keys()
            .filter(|key| key.price == price)
            .cloned()
            .collect();
        for key in keys {
            if let Some(id) = &key.id {
                self.ids.remove(id);
            }
            self.levels.remove(&key);
        }
    }

    pub fn clear(&mut self) {
        self.levels.clear();
        self.ids.clear();
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Levels best-first
    pub fn iter(&self) -> Box<dyn Iterator<Item = PriceLevel> + '_> {
        let entries = self.levels.iter().map(|(key, level)| to_price_level(key, level));
        match self.side {
            BookSideKind::Bids => Box::new(entries.rev()),
            BookSideKind::Asks => Box::new(entries),
        }
    }

    pub fn best(&self) -> Option<PriceLevel> {
        self.iter().next()
    }

    /// Best `n` levels
    pub fn top(&self, n: usize) -> Vec<PriceLevel> {
        self.iter().take(n).collect()
    }

    /// Copy holding only the best `n` levels
    pub fn limited(&self, n: usize) -> BookSide {
        let mut copy = BookSide::new(self.side, self.kind, self.depth);
        let keys: Vec<&LevelKey> = match self.side {
            BookSideKind::Bids => self.levels.keys().rev().take(n).collect(),
            BookSideKind::Asks => self.levels.keys().take(n).collect(),
        };
        for key in keys {
            if let Some(level) = self.levels.get(key) {
                if let Some(id) = &key.id {
                    copy.ids.insert(id.clone(), key.price);
                }
                copy.levels.insert(key.clone(), level.clone());
            }
        }
        copy
    }

    /// Total size resting at `price`
    pub fn size_at(&self, price: Decimal) -> Option<Decimal> {
        let mut found = false;
        let total = self
            .levels
            .iter()
            .filter(|(key, _)| key.price == price)
            .inspect(|_| found = true)
            .map(|(_, level)| level.size)
            .sum();
        found.then_some(total)
    }

    /// Price of a resting order on an indexed side
    pub fn order_price(&self, id: &str) -> Option<Decimal> {
        self.ids.get(id).copied()
    }

    pub fn volume(&self) -> Decimal {
        self.levels.values().map(|level| level.size).sum()
    }
}

fn to_price_level(key: &LevelKey, level: &Level) -> PriceLevel {
    PriceLevel {
        price: key.price,
        quantity: level.size,
        count: level.count,
        order_id: key.id.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn prices(side: &BookSide) -> Vec<Decimal> {
        side.iter().map(|level| level.price).collect()
    }

    #[test]
    fn test_bids_descending_asks_ascending() {
        let mut bids = BookSide::new(BookSideKind::Bids, BookKind::Plain, None);
        let mut asks = BookSide::new(BookSideKind::Asks, BookKind::Plain, None);
        for price in [dec!(99), dec!(101), dec!(100)] {
            bids.store(LevelUpdate::new(price, dec!(1)));
            asks.store(LevelUpdate::new(price + dec!(10), dec!(1)));
        }

        assert_eq!(prices(&bids), vec![dec!(101), dec!(100), dec!(99)]);
        assert_eq!(prices(&asks), vec![dec!(109), dec!(110), dec!(111)]);
        assert_eq!(bids.best().map(|l| l.price), Some(dec!(101)));
        assert_eq!(asks.best().map(|l| l.price), Some(dec!(109)));
    }

    #[test]
    fn test_zero_size_removes_and_unknown_removal_is_noop() {
        let mut bids = BookSide::new(BookSideKind::Bids, BookKind::Plain, None);
        bids.store(LevelUpdate::new(dec!(100), dec!(1)));
        bids.store(LevelUpdate::new(dec!(100), dec!(2.5)));
        assert_eq!(bids.size_at(dec!(100)), Some(dec!(2.5)));

        bids.store(LevelUpdate::new(dec!(100), dec!(0)));
        assert!(bids.is_empty());

        bids.store(LevelUpdate::new(dec!(42), dec!(0)));
        assert!(bids.is_empty());
    }

    #[test]
    fn test_counted_removes_on_zero_count() {
        let mut asks = BookSide::new(BookSideKind::Asks, BookKind::Counted, None);
        asks.store(LevelUpdate::counted(dec!(10), dec!(3), 2));
        assert_eq!(asks.best().and_then(|l| l.count), Some(2));

        asks.store(LevelUpdate::counted(dec!(10), dec!(3), 0));
        assert!(asks.is_empty());
    }

    #[test]
    fn test_indexed_order_moves_price() {
        let mut bids = BookSide::new(BookSideKind::Bids, BookKind::Indexed, None);
        bids.store(LevelUpdate::indexed(dec!(100), dec!(1), "a"));
        bids.store(LevelUpdate::indexed(dec!(100), dec!(2), "b"));
        assert_eq!(bids.size_at(dec!(100)), Some(dec!(3)));

        bids.store(LevelUpdate::indexed(dec!(101), dec!(1), "a"));
        assert_eq!(bids.order_price("a"), Some(dec!(101)));
        assert_eq!(bids.size_at(dec!(100)), Some(dec!(2)));
        assert_eq!(bids.len(), 2);

        bids.store(LevelUpdate::indexed(dec!(101), dec!(0), "a"));
        assert_eq!(bids.order_price("a"), None);
        assert_eq!(prices(&bids), vec![dec!(100)]);
    }

    #[test]
    fn test_depth_cap_drops_worst() {
        let mut bids = BookSide::new(BookSideKind::Bids, BookKind::Plain, Some(2));
        let mut asks = BookSide::new(BookSideKind::Asks, BookKind::Plain, Some(2));
        for price in [dec!(1), dec!(2), dec!(3)] {
            bids.store(LevelUpdate::new(price, dec!(1)));
            asks.store(LevelUpdate::new(price, dec!(1)));
        }

        assert_eq!(prices(&bids), vec![dec!(3), dec!(2)]);
        assert_eq!(prices(&asks), vec![dec!(1), dec!(2)]);
    }

    #[test]
    fn test_limited_and_top() {
        let mut asks = BookSide::new(BookSideKind::Asks, BookKind::Plain, None);
        for price in [dec!(5), dec!(3), dec!(4), dec!(6)] {
            asks.store(LevelUpdate::new(price, dec!(2)));
        }

        let limited = asks.limited(2);
        assert_eq!(prices(&limited), vec![dec!(3), dec!(4)]);
        assert_eq!(asks.len(), 4);
        assert_eq!(asks.top(3).len(), 3);
        assert_eq!(asks.volume(), dec!(8));
    }

    #[test]
    fn test_parse_pairs_skips_garbage() {
        let pairs = [
            ["100.5".to_string(), "2".to_string()],
            ["oops".to_string(), "1".to_string()],
        ];
        let updates = LevelUpdate::parse_pairs(&pairs);
        assert_eq!(updates, vec![LevelUpdate::new(dec!(100.5), dec!(2))]);
    }
}
