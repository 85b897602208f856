//! Settlement cells for watch results.
//!
//! [`Deferred`] settles exactly once and answers request/response style
//! exchanges such as "connection established" or "login acknowledged".
//! [`Broadcast`] settles repeatedly under a stable message hash: each resolve
//! or reject closes the current round and immediately re-arms the cell, so a
//! [`Waiter`] completes with the first settlement that happens after it was
//! created. A rejection wins over any later resolve for every waiter that was
//! armed before it.

use std::future::IntoFuture;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use tokio::sync::watch;

use super::error::WatchError;

pub type Outcome<T> = Result<T, WatchError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FutureState {
    Pending,
    Resolved,
    Rejected,
}

#[derive(Debug)]
struct Round<T> {
    generation: u64,
    outcome: Option<Outcome<T>>,
    latest: Option<T>,
    last_rejection: Option<(u64, WatchError)>,
}

impl<T: Clone> Round<T> {
    fn new() -> Self {
        Self {
            generation: 0,
            outcome: None,
            latest: None,
            last_rejection: None,
        }
    }

    fn settle(&mut self, outcome: Outcome<T>) {
        self.generation += 1;
        match &outcome {
            Ok(value) => self.latest = Some(value.clone()),
            Err(err) => self.last_rejection = Some((self.generation, err.clone())),
        }
        self.outcome = Some(outcome);
    }

    fn state(&self) -> FutureState {
        match &self.outcome {
            None => FutureState::Pending,
            Some(Ok(_)) => FutureState::Resolved,
            Some(Err(_)) => FutureState::Rejected,
        }
    }

    /// Outcome visible to a waiter armed at generation `after`.
    fn outcome_after(&self, after: u64) -> Option<Outcome<T>> {
        if self.generation <= after {
            return None;
        }
        if let Some((generation, err)) = &self.last_rejection {
            if *generation > after {
                return Some(Err(err.clone()));
            }
        }
        self.outcome.clone()
    }
}

/// Handle that completes with the next settlement of its cell.
///
/// Await it directly (`waiter.await`) or through [`Waiter::wait`]. If the
/// cell is dropped before settling, the waiter fails with
/// [`WatchError::Closed`].
pub struct Waiter<T> {
    rx: watch::Receiver<Round<T>>,
    after: u64,
}

impl<T: Clone + Send + Sync + 'static> Waiter<T> {
    pub async fn wait(mut self) -> Outcome<T> {
        let after = self.after;
        let outcome = match self.rx.wait_for(|round| round.generation > after).await {
            Ok(round) => round.outcome_after(after),
            Err(_) => None,
        };
        outcome.unwrap_or(Err(WatchError::Closed))
    }

    /// Settlement observed so far, without waiting.
    pub fn try_outcome(&self) -> Option<Outcome<T>> {
        self.rx.borrow().outcome_after(self.after)
    }

    pub fn is_settled(&self) -> bool {
        self.rx.borrow().generation > self.after
    }
}

impl<T: Clone + Send + Sync + 'static> IntoFuture for Waiter<T> {
    type Output = Outcome<T>;
    type IntoFuture = BoxFuture<'static, Outcome<T>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(self.wait())
    }
}

impl<T> std::fmt::Debug for Waiter<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Waiter").field("after", &self.after).finish()
    }
}

/// One-shot cell. Only the first resolve or reject has any effect.
#[derive(Debug)]
pub struct Deferred<T> {
    tx: Arc<watch::Sender<Round<T>>>,
}

impl<T> Clone for Deferred<T> {
    fn clone(&self) -> Self {
        Self {
            tx: Arc::clone(&self.tx),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> Default for Deferred<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Send + Sync + 'static> Deferred<T> {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(Round::new());
        Self { tx: Arc::new(tx) }
    }

    /// Returns false if the cell had already settled.
    pub fn resolve(&self, value: T) -> bool {
        self.settle(Ok(value))
    }

    /// Returns false if the cell had already settled.
    pub fn reject(&self, err: WatchError) -> bool {
        self.settle(Err(err))
    }

    fn settle(&self, outcome: Outcome<T>) -> bool {
        let mut pending = Some(outcome);
        self.tx.send_if_modified(|round| {
            if round.generation > 0 {
                return false;
            }
            if let Some(outcome) = pending.take() {
                round.settle(outcome);
            }
            true
        })
    }

    pub fn state(&self) -> FutureState {
        self.tx.borrow().state()
    }

    /// Waiter on this cell. Completes immediately if it has settled already.
    pub fn waiter(&self) -> Waiter<T> {
        Waiter {
            rx: self.tx.subscribe(),
            after: 0,
        }
    }

    pub async fn wait(&self) -> Outcome<T> {
        self.waiter().wait().await
    }
}

/// Repeatable cell keyed by a message hash.
#[derive(Debug)]
pub struct Broadcast<T> {
    tx: Arc<watch::Sender<Round<T>>>,
}

impl<T> Clone for Broadcast<T> {
    fn clone(&self) -> Self {
        Self {
            tx: Arc::clone(&self.tx),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> Default for Broadcast<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Send + Sync + 'static> Broadcast<T> {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(Round::new());
        Self { tx: Arc::new(tx) }
    }

    /// Completes every outstanding waiter and re-arms the cell.
    pub fn resolve(&self, value: T) {
        self.tx.send_modify(|round| round.settle(Ok(value)));
    }

    pub fn reject(&self, err: WatchError) {
        self.tx.send_modify(|round| round.settle(Err(err)));
    }

    /// Waiter for the next round.
    pub fn waiter(&self) -> Waiter<T> {
        let rx = self.tx.subscribe();
        let after = rx.borrow().generation;
        Waiter { rx, after }
    }

    /// Most recently resolved value, if any.
    pub fn latest(&self) -> Option<T> {
        self.tx.borrow().latest.clone()
    }

    /// Number of settled rounds.
    pub fn generation(&self) -> u64 {
        self.tx.borrow().generation
    }

    /// State of the last settled round, or pending if none settled yet.
    pub fn state(&self) -> FutureState {
        self.tx.borrow().state()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    #[tokio::test]
    async fn test_deferred_settles_once() {
        let deferred = Deferred::new();
        let waiter = deferred.waiter();
        assert_eq!(deferred.state(), FutureState::Pending);

        assert!(deferred.resolve(1));
        assert!(!deferred.resolve(2));
        assert!(!deferred.reject(WatchError::Closed));

        assert_eq!(waiter.await, Ok(1));
        // Late waiters observe the same settlement
        assert_eq!(deferred.wait().await, Ok(1));
        assert_eq!(deferred.state(), FutureState::Resolved);
    }

    #[tokio::test]
    async fn test_deferred_rejection_is_sticky() {
        let deferred: Deferred<u32> = Deferred::new();
        let waiter = deferred.waiter();

        assert!(deferred.reject(WatchError::Network("reset".to_string())));
        assert!(!deferred.resolve(5));

        assert_eq!(waiter.await, Err(WatchError::Network("reset".to_string())));
        assert_eq!(deferred.state(), FutureState::Rejected);
    }

    #[tokio::test]
    async fn test_broadcast_rounds() {
        let cell = Broadcast::new();
        let first = cell.waiter();
        let second = cell.waiter();

        cell.resolve("a");
        assert_eq!(first.await, Ok("a"));
        assert_eq!(second.await, Ok("a"));

        // A waiter created after the round does not see it
        let next = cell.waiter();
        assert!(!next.is_settled());
        cell.resolve("b");
        assert_eq!(next.await, Ok("b"));

        assert_eq!(cell.latest(), Some("b"));
        assert_eq!(cell.generation(), 2);
    }

    #[tokio::test]
    async fn test_broadcast_waiter_stays_pending_until_next_round() {
        let cell = Broadcast::new();
        cell.resolve(1u8);

        let waiter = cell.waiter();
        assert!(timeout(Duration::from_millis(20), cell.waiter().wait()).await.is_err());

        cell.resolve(2);
        assert_eq!(waiter.await, Ok(2));
    }

    #[tokio::test]
    async fn test_broadcast_rejection_not_overwritten() {
        let cell = Broadcast::new();
        let waiter = cell.waiter();

        cell.reject(WatchError::InvalidNonce("gap".to_string()));
        cell.resolve(10u64);

        // The waiter was armed before the rejection
        assert_eq!(waiter.await, Err(WatchError::InvalidNonce("gap".to_string())));

        // Waiters armed after it see only later rounds
        let fresh = cell.waiter();
        cell.resolve(11);
        assert_eq!(fresh.await, Ok(11));
    }

    #[tokio::test]
    async fn test_waiter_fails_when_cell_dropped() {
        let cell: Broadcast<u8> = Broadcast::new();
        let waiter = cell.waiter();
        drop(cell);

        assert_eq!(waiter.await, Err(WatchError::Closed));
    }
}
