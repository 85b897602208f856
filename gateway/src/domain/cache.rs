//! Bounded caches backing trade, candle and order streams.
//!
//! Every cache holds at most `capacity` entries and drops the oldest on
//! overflow. Keyed variants replace an existing entry in place instead of
//! appending, which keeps the relative order of all other entries intact.

use std::collections::{HashMap, VecDeque};
use std::fmt::Debug;
use std::hash::Hash;
use std::marker::PhantomData;

use trading_core::Identified;

/// FIFO with a fixed capacity.
#[derive(Debug, Clone)]
pub struct ArrayCache<T> {
    items: VecDeque<T>,
    capacity: usize,
}

impl<T> ArrayCache<T> {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            items: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
        }
    }

    pub fn append(&mut self, item: T) {
        self.items.push_back(item);
        while self.items.len() > self.capacity {
            self.items.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &T> {
        self.items.iter()
    }

    pub fn last(&self) -> Option<&T> {
        self.items.back()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}

impl<T: Clone> ArrayCache<T> {
    /// Oldest first
    pub fn to_vec(&self) -> Vec<T> {
        self.items.iter().cloned().collect()
    }
}

/// Extracts the identity a keyed cache replaces on.
pub trait CacheKey<T> {
    type Key: Eq + Hash + Clone + Debug;

    /// `None` appends the item as an anonymous entry.
    fn key(item: &T) -> Option<Self::Key>;
}

/// Replace by record id
#[derive(Debug, Clone, Copy, Default)]
pub struct ById;

impl<T: Identified> CacheKey<T> for ById {
    type Key = String;

    fn key(item: &T) -> Option<String> {
        item.id().map(str::to_owned)
    }
}

/// Replace by (symbol, id)
#[derive(Debug, Clone, Copy, Default)]
pub struct BySymbolById;

impl<T: Identified> CacheKey<T> for BySymbolById {
    type Key = (String, String);

    fn key(item: &T) -> Option<(String, String)> {
        match (item.symbol(), item.id()) {
            (Some(symbol), Some(id)) => Some((symbol.to_owned(), id.to_owned())),
            _ => None,
        }
    }
}

/// Replace by timestamp, used for the still-open candle
#[derive(Debug, Clone, Copy, Default)]
pub struct ByTimestamp;

impl<T: Identified> CacheKey<T> for ByTimestamp {
    type Key = i64;

    fn key(item: &T) -> Option<i64> {
        item.timestamp()
    }
}

/// Bounded FIFO that replaces entries sharing a key.
///
/// Lookups go through a key index holding absolute sequence numbers, so an
/// in-place replace is O(1) regardless of how many entries were evicted.
#[derive(Debug, Clone)]
pub struct IndexedCache<T, K: CacheKey<T>> {
    items: VecDeque<T>,
    keys: VecDeque<Option<K::Key>>,
    index: HashMap<K::Key, u64>,
    head: u64,
    capacity: usize,
    _key: PhantomData<K>,
}

pub type ArrayCacheById<T> = IndexedCache<T, ById>;
pub type ArrayCacheBySymbolById<T> = IndexedCache<T, BySymbolById>;
pub type ArrayCacheByTimestamp<T> = IndexedCache<T, ByTimestamp>;

impl<T, K: CacheKey<T>> IndexedCache<T, K> {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            items: VecDeque::new(),
            keys: VecDeque::new(),
            index: HashMap::new(),
            head: 0,
            capacity,
            _key: PhantomData,
        }
    }

    /// Appends `item`, or replaces the entry with the same key in place.
    pub fn append(&mut self, item: T) {
        let key = K::key(&item);
        if let Some(key) = &key {
            if let Some(&sequence) = self.index.get(key) {
                let position = (sequence - self.head) as usize;
                self.items[position] = item;
                return;
            }
            let sequence = self.head + self.items.len() as u64;
            self.index.insert(key.clone(), sequence);
        }
        self.items.push_back(item);
        self.keys.push_back(key);

        while self.items.len() > self.capacity {
            self.items.pop_front();
            if let Some(Some(evicted)) = self.keys.pop_front() {
                self.index.remove(&evicted);
            }
            self.head += 1;
        }
    }

    pub fn get(&self, key: &K::Key) -> Option<&T> {
        let sequence = self.index.get(key)?;
        self.items.get((sequence - self.head) as usize)
    }

    pub fn contains_key(&self, key: &K::Key) -> bool {
        self.index.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &T> {
        self.items.iter()
    }

    pub fn last(&self) -> Option<&T> {
        self.items.back()
    }
}

impl<T: Clone, K: CacheKey<T>> IndexedCache<T, K> {
    pub fn to_vec(&self) -> Vec<T> {
        self.items.iter().cloned().collect()
    }
}
