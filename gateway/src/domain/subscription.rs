use serde_json::Value;

/// Everything needed to open one logical stream.
///
/// `message_hash` names the stream results are resolved under.
/// `subscribe_hash` names the subscription record that deduplicates the
/// outbound message; it defaults to the message hash.
#[derive(Debug, Clone, PartialEq)]
pub struct SubscribeRequest {
    pub url: String,
    pub message_hash: String,
    pub message: Option<Value>,
    pub subscribe_hash: Option<String>,
    pub subscription: Option<Value>,
}

impl SubscribeRequest {
    pub fn new(url: impl Into<String>, message_hash: impl Into<String>) -> Self {
        SubscribeRequest {
            url: url.into(),
            message_hash: message_hash.into(),
            message: None,
            subscribe_hash: None,
            subscription: None,
        }
    }

    pub fn with_message(mut self, message: Value) -> Self {
        self.message = Some(message);
        self
    }

    pub fn with_subscribe_hash(mut self, subscribe_hash: impl Into<String>) -> Self {
        self.subscribe_hash = Some(subscribe_hash.into());
        self
    }

    /// Value stored in the subscription record, `true` when unset
    pub fn with_subscription(mut self, subscription: Value) -> Self {
        self.subscription = Some(subscription);
        self
    }

    pub fn subscribe_hash(&self) -> &str {
        self.subscribe_hash.as_deref().unwrap_or(&self.message_hash)
    }
}

/// Login exchange for private streams
#[derive(Debug, Clone, PartialEq)]
pub struct AuthRequest {
    pub message: Value,
    /// Hash the login response is resolved under
    pub message_hash: String,
    /// The venue sends no login response; the login counts as done once sent
    pub implicit: bool,
}

impl AuthRequest {
    pub fn new(message: Value, message_hash: impl Into<String>) -> Self {
        AuthRequest {
            message,
            message_hash: message_hash.into(),
            implicit: false,
        }
    }

    pub fn implicit(mut self) -> Self {
        self.implicit = true;
        self
    }
}
