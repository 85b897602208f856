use std::fmt;
use thiserror::Error;

/// Error carried by a rejected watch future.
///
/// Cloneable because a single rejection settles every waiter of a round.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WatchError {
    #[error("Network error: {0}")]
    Network(String),
    #[error("Request timeout: {0}")]
    RequestTimeout(String),
    #[error("Not connected")]
    NotConnected,
    #[error("Authentication error: {0}")]
    Authentication(String),
    #[error("Invalid nonce: {0}")]
    InvalidNonce(String),
    #[error("Not supported: {0}")]
    NotSupported(String),
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("Exchange error: {0}")]
    Exchange(String),
    #[error("Unexpected payload: expected {expected}, got {actual}")]
    UnexpectedPayload {
        expected: &'static str,
        actual: &'static str,
    },
    #[error("Closed")]
    Closed,
}

impl WatchError {
    /// Transport-level failures. Callers usually retry these with a fresh watch.
    pub fn is_network(&self) -> bool {
        matches!(
            self,
            WatchError::Network(_)
                | WatchError::RequestTimeout(_)
                | WatchError::NotConnected
                | WatchError::Closed
        )
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for WatchError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        WatchError::Network(err.to_string())
    }
}

impl From<serde_json::Error> for WatchError {
    fn from(err: serde_json::Error) -> Self {
        WatchError::BadRequest(format!("Serialization error: {}", err))
    }
}

/// Domain error for depth fetching operations
///
/// Snapshot fetchers live outside the core; they convert their transport
/// errors to this type.
#[derive(Debug, Clone)]
pub enum FetchError {
    /// Network or communication failure
    Network(String),
    /// API returned an error response
    Api { code: i32, message: String },
    /// Failed to parse the response
    Parse(String),
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchError::Network(msg) => write!(f, "Network error: {}", msg),
            FetchError::Api { code, message } => write!(f, "API error {}: {}", code, message),
            FetchError::Parse(msg) => write!(f, "Parse error: {}", msg),
        }
    }
}

impl std::error::Error for FetchError {}

impl From<FetchError> for WatchError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::Network(msg) => WatchError::Network(msg),
            other => WatchError::Exchange(other.to_string()),
        }
    }
}
