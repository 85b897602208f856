use std::path::Path;
use thiserror::Error;
use url::Url;

use super::types::{ExchangeConfig, GatewayConfigFile};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("No enabled exchanges in config")]
    NoEnabledExchanges,
    #[error("Exchange not found: {0}")]
    ExchangeNotFound(String),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Load configuration from a JSON file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<GatewayConfigFile, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    load_config_from_str(&content)
}

/// Load configuration from a JSON string
pub fn load_config_from_str(json: &str) -> Result<GatewayConfigFile, ConfigError> {
    let config: GatewayConfigFile = serde_json::from_str(json)?;
    Ok(config)
}

/// Load the default embedded configuration
pub fn load_default_config() -> Result<GatewayConfigFile, ConfigError> {
    let default_config = include_str!("exchange_config.json");
    load_config_from_str(default_config)
}

impl GatewayConfigFile {
    /// Get only enabled exchanges
    pub fn enabled_exchanges(&self) -> Vec<&ExchangeConfig> {
        self.exchanges.iter().filter(|e| e.enabled).collect()
    }

    /// Get a specific exchange by ID
    pub fn get_exchange(&self, id: &str) -> Result<&ExchangeConfig, ConfigError> {
        self.exchanges
            .iter()
            .find(|e| e.id == id)
            .ok_or_else(|| ConfigError::ExchangeNotFound(id.to_string()))
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        let enabled = self.enabled_exchanges();
        if enabled.is_empty() {
            return Err(ConfigError::NoEnabledExchanges);
        }
        for exchange in enabled {
            exchange.validate()?;
        }
        Ok(())
    }
}

impl ExchangeConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.id.trim().is_empty() {
            return Err(ConfigError::Invalid("exchange id is empty".to_string()));
        }

        let url = Url::parse(&self.ws_url)
            .map_err(|e| ConfigError::Invalid(format!("{}: ws_url {}: {}", self.id, self.ws_url, e)))?;
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(ConfigError::Invalid(format!(
                "{}: ws_url must use ws:// or wss://, got {}",
                self.id, self.ws_url
            )));
        }

        if self.rate_limit.capacity <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "{}: rate_limit.capacity must be positive",
                self.id
            )));
        }
        let options = &self.options;
        for (name, value) in [
            ("trades_limit", options.trades_limit),
            ("ohlcv_limit", options.ohlcv_limit),
            ("orders_limit", options.orders_limit),
            ("order_book_depth", options.order_book_depth.unwrap_or(1)),
        ] {
            if value == 0 {
                return Err(ConfigError::Invalid(format!(
                    "{}: options.{} must be positive",
                    self.id, name
                )));
            }
        }
        if options.snapshot_max_attempts == 0 {
            return Err(ConfigError::Invalid(format!(
                "{}: options.snapshot_max_attempts must be positive",
                self.id
            )));
        }
        Ok(())
    }
}
