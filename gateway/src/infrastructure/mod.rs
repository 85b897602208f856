//! Infrastructure Layer - WebSocket transport
//!
//! - ConnectionClient: one multiplexed connection per URL
//! - keepalive: ping/pong liveness loop
//! - frames: text and compressed binary frame decoding
//! - Throttle: token bucket pacing outbound messages

pub mod frames;
pub mod keepalive;
pub mod throttle;
pub mod ws_client;

pub use frames::{Compression, decode_binary, decode_text};
pub use throttle::Throttle;
pub use ws_client::{ClientOptions, ConnectionClient, ConnectionStatus};
