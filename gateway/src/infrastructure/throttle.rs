use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

/// Token bucket refilled at one token per `rate_limit`
struct TokenBucket {
    tokens: f64,
    capacity: f64,
    refill_rate: f64, // tokens per second
    last_update: Instant,
}

impl TokenBucket {
    fn new(capacity: f64, rate_limit: Duration) -> Self {
        let capacity = capacity.max(1.0);
        TokenBucket {
            tokens: capacity,
            capacity,
            refill_rate: 1.0 / rate_limit.as_secs_f64(),
            last_update: Instant::now(),
        }
    }

    fn try_consume(&mut self, cost: f64) -> (bool, Duration) {
        self.refill();

        let cost = cost.min(self.capacity);
        if self.tokens >= cost {
            self.tokens -= cost;
            (true, Duration::ZERO)
        } else {
            let deficit = cost - self.tokens;
            let wait_seconds = deficit / self.refill_rate;
            // Rounding can leave a deficit too small to sleep on
            let wait = Duration::from_secs_f64(wait_seconds).max(Duration::from_millis(1));
            (false, wait)
        }
    }

    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_update);
        let new_tokens = elapsed.as_secs_f64() * self.refill_rate;
        self.tokens = (self.tokens + new_tokens).min(self.capacity);
        self.last_update = now;
    }
}

/// Paces outbound messages of one exchange.
///
/// A `rate_limit` below one millisecond is raised to one millisecond.
pub struct Throttle {
    bucket: Mutex<TokenBucket>,
}

impl Throttle {
    pub fn new(rate_limit: Duration, capacity: f64) -> Self {
        let rate_limit = rate_limit.max(Duration::from_millis(1));
        Throttle {
            bucket: Mutex::new(TokenBucket::new(capacity, rate_limit)),
        }
    }

    /// Take `cost` tokens now, or report how long until they are available
    pub fn try_acquire(&self, cost: f64) -> Result<(), Duration> {
        match self.bucket.lock().try_consume(cost) {
            (true, _) => Ok(()),
            (false, wait) => Err(wait),
        }
    }

    /// Wait until `cost` tokens can be taken
    pub async fn throttle(&self, cost: f64) {
        while let Err(wait) = self.try_acquire(cost) {
            tokio::time::sleep(wait).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_throttle_spaces_requests() {
        let throttle = Throttle::new(Duration::from_millis(100), 1.0);
        let start = Instant::now();

        throttle.throttle(1.0).await;
        assert!(start.elapsed() < Duration::from_millis(1));

        throttle.throttle(1.0).await;
        throttle.throttle(1.0).await;
        assert!(start.elapsed() >= Duration::from_millis(200));
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_capacity() {
        let throttle = Throttle::new(Duration::from_millis(50), 3.0);

        assert!(throttle.try_acquire(1.0).is_ok());
        assert!(throttle.try_acquire(1.0).is_ok());
        assert!(throttle.try_acquire(1.0).is_ok());

        let wait = throttle.try_acquire(1.0).unwrap_err();
        assert!(wait <= Duration::from_millis(50));
        assert!(wait > Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_oversized_cost_is_capped() {
        let throttle = Throttle::new(Duration::from_millis(10), 1.0);
        // Would never fit in a bucket of one token otherwise
        throttle.throttle(5.0).await;
    }
}
