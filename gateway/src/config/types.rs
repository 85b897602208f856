use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::application::WatchOptions;
use crate::infrastructure::{ClientOptions, Compression};

/// Root configuration file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfigFile {
    pub exchanges: Vec<ExchangeConfig>,
}

/// Configuration for a single exchange
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeConfig {
    /// Unique identifier for the exchange (e.g., "binance", "kraken")
    pub id: String,
    /// Display name
    #[serde(default)]
    pub name: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Public stream endpoint
    pub ws_url: String,
    /// REST endpoint used for order book snapshots
    #[serde(default)]
    pub rest_url: Option<String>,
    #[serde(default)]
    pub streaming: StreamingConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub options: OptionsConfig,
}

/// Connection-level settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamingConfig {
    /// Ping interval in milliseconds; 0 disables keepalive
    #[serde(default = "default_keep_alive")]
    pub keep_alive_ms: u64,
    #[serde(default = "default_max_ping_pong_misses")]
    pub max_ping_pong_misses: f64,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,
    #[serde(default)]
    pub compression: Compression,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        StreamingConfig {
            keep_alive_ms: default_keep_alive(),
            max_ping_pong_misses: default_max_ping_pong_misses(),
            connect_timeout_ms: default_connect_timeout(),
            compression: Compression::None,
        }
    }
}

impl StreamingConfig {
    pub fn to_client_options(&self) -> ClientOptions {
        ClientOptions {
            keep_alive: (self.keep_alive_ms > 0).then(|| Duration::from_millis(self.keep_alive_ms)),
            max_ping_pong_misses: self.max_ping_pong_misses,
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
            compression: self.compression,
        }
    }
}

/// Outbound message pacing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Milliseconds to earn one message token
    #[serde(default = "default_rate_limit")]
    pub rate_limit_ms: u64,
    #[serde(default = "default_capacity")]
    pub capacity: f64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        RateLimitConfig {
            enabled: true,
            rate_limit_ms: default_rate_limit(),
            capacity: default_capacity(),
        }
    }
}

/// Cache sizes and order book synchronization
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptionsConfig {
    #[serde(default = "default_cache_limit")]
    pub trades_limit: usize,
    #[serde(default = "default_cache_limit")]
    pub ohlcv_limit: usize,
    #[serde(default = "default_cache_limit")]
    pub orders_limit: usize,
    /// Defaults to the rate limit interval
    #[serde(default)]
    pub snapshot_delay_ms: Option<u64>,
    #[serde(default = "default_snapshot_max_attempts")]
    pub snapshot_max_attempts: u32,
    #[serde(default)]
    pub order_book_depth: Option<usize>,
}

impl Default for OptionsConfig {
    fn default() -> Self {
        OptionsConfig {
            trades_limit: default_cache_limit(),
            ohlcv_limit: default_cache_limit(),
            orders_limit: default_cache_limit(),
            snapshot_delay_ms: None,
            snapshot_max_attempts: default_snapshot_max_attempts(),
            order_book_depth: None,
        }
    }
}

impl ExchangeConfig {
    /// Convert to the runtime options of an exchange instance
    pub fn to_watch_options(&self) -> WatchOptions {
        let snapshot_delay_ms = self
            .options
            .snapshot_delay_ms
            .unwrap_or(self.rate_limit.rate_limit_ms);
        WatchOptions {
            client: self.streaming.to_client_options(),
            enable_rate_limit: self.rate_limit.enabled,
            rate_limit: Duration::from_millis(self.rate_limit.rate_limit_ms),
            rate_limit_capacity: self.rate_limit.capacity,
            trades_limit: self.options.trades_limit,
            ohlcv_limit: self.options.ohlcv_limit,
            orders_limit: self.options.orders_limit,
            snapshot_delay: Duration::from_millis(snapshot_delay_ms),
            snapshot_max_attempts: self.options.snapshot_max_attempts,
            order_book_depth: self.options.order_book_depth,
        }
    }
}

// Default value functions for serde
fn default_true() -> bool {
    true
}

fn default_keep_alive() -> u64 {
    30_000
}

fn default_max_ping_pong_misses() -> f64 {
    2.0
}

fn default_connect_timeout() -> u64 {
    10_000
}

fn default_rate_limit() -> u64 {
    100
}

fn default_capacity() -> f64 {
    1.0
}

fn default_cache_limit() -> usize {
    1000
}

fn default_snapshot_max_attempts() -> u32 {
    3
}
