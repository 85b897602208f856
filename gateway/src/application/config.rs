use std::time::Duration;

use crate::infrastructure::ClientOptions;

/// Runtime settings of one exchange instance
#[derive(Debug, Clone)]
pub struct WatchOptions {
    /// Transport settings shared by every connection
    pub client: ClientOptions,
    /// Pace outbound subscribe messages through the token bucket
    pub enable_rate_limit: bool,
    /// Time to earn one token
    pub rate_limit: Duration,
    pub rate_limit_capacity: f64,
    /// Capacity of each per-symbol trade cache
    pub trades_limit: usize,
    pub ohlcv_limit: usize,
    pub orders_limit: usize,
    /// Warm-up before the first REST snapshot and between retries
    pub snapshot_delay: Duration,
    pub snapshot_max_attempts: u32,
    /// Hard cap on levels per book side; `None` keeps every level
    pub order_book_depth: Option<usize>,
}

impl Default for WatchOptions {
    fn default() -> Self {
        WatchOptions {
            client: ClientOptions::default(),
            enable_rate_limit: true,
            rate_limit: Duration::from_millis(100),
            rate_limit_capacity: 1.0,
            trades_limit: 1000,
            ohlcv_limit: 1000,
            orders_limit: 1000,
            snapshot_delay: Duration::from_millis(100),
            snapshot_max_attempts: 3,
            order_book_depth: None,
        }
    }
}
