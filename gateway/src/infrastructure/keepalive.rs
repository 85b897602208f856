use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, trace};

use super::ws_client::ConnectionClient;
use crate::domain::WatchError;

/// Whether the peer has been silent for longer than `max_misses` intervals
pub fn is_expired(last_pong: Instant, now: Instant, interval: Duration, max_misses: f64) -> bool {
    now.saturating_duration_since(last_pong) > interval.mul_f64(max_misses)
}

/// Ping loop of an open connection.
///
/// Every `interval` it either fails the connection with
/// [`WatchError::RequestTimeout`] when pongs stopped arriving, or sends the
/// adapter's custom ping (falling back to a protocol ping frame).
pub(crate) fn spawn(
    client: Arc<ConnectionClient>,
    interval: Duration,
    max_misses: f64,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // First tick completes immediately
        ticker.tick().await;

        loop {
            ticker.tick().await;
            if !client.is_open() {
                break;
            }

            let last_pong = client.last_pong().unwrap_or_else(Instant::now);
            if is_expired(last_pong, Instant::now(), interval, max_misses) {
                client.on_error(WatchError::RequestTimeout(format!(
                    "Connection to {} timed out due to a ping-pong keepalive missing on time",
                    client.url()
                )));
                break;
            }

            let sent = match client.ping_message() {
                Some(message) => client.send(&message),
                None => client.send_frame(Message::Ping(Default::default())),
            };
            match sent {
                Ok(()) => trace!(url = %client.url(), "Ping sent"),
                Err(e) => {
                    debug!(url = %client.url(), error = %e, "Keepalive stopped");
                    break;
                }
            }
        }
    })
}
