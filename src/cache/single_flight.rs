//! Per-key fetch guard

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Serializes work per key so only one caller fetches a missing entry.
///
/// Callers take the guard after a cache miss, then re-check the cache: the
/// first holder populates it and later holders find a hit. A holder that
/// fails records the failure on the guard, and callers queued behind it
/// receive that failure instead of calling upstream again. The record is
/// dropped once the last queued caller releases the key.
#[derive(Default)]
pub struct SingleFlight {
    locks: DashMap<String, Arc<Mutex<Option<String>>>>,
}

pub struct FlightGuard<'a> {
    owner: &'a SingleFlight,
    key: String,
    guard: Option<OwnedMutexGuard<Option<String>>>,
}

impl SingleFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive use of `key`
    pub async fn acquire(&self, key: &str) -> FlightGuard<'_> {
        let lock = self
            .locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(None)))
            .clone();

        let guard = lock.lock_owned().await;
        FlightGuard {
            owner: self,
            key: key.to_string(),
            guard: Some(guard),
        }
    }

    /// Keys with a holder or waiters
    pub fn in_flight(&self) -> usize {
        self.locks.len()
    }
}

impl FlightGuard<'_> {
    /// Failure left by an earlier holder of this key
    pub fn shared_failure(&self) -> Option<&str> {
        self.guard.as_ref().and_then(|slot| slot.as_deref())
    }

    /// Leave a failure for the callers still queued on this key
    pub fn record_failure(&mut self, message: impl Into<String>) {
        if let Some(slot) = self.guard.as_mut() {
            **slot = Some(message.into());
        }
    }
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        // Release first so the strong count reflects only waiters
        drop(self.guard.take());
        self.owner
            .locks
            .remove_if(&self.key, |_, lock| Arc::strong_count(lock) == 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_guard_is_exclusive_per_key() {
        let flight = Arc::new(SingleFlight::new());
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let flight = flight.clone();
            let active = active.clone();
            let peak = peak.clone();
            handles.push(tokio::spawn(async move {
                let _guard = flight.acquire("quote/AAPL").await;
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                active.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(peak.load(Ordering::SeqCst), 1);
        assert_eq!(flight.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_failure_reaches_queued_callers_only() {
        let flight = Arc::new(SingleFlight::new());

        let mut leader = flight.acquire("quote/AAPL").await;
        let waiter = {
            let flight = flight.clone();
            tokio::spawn(async move {
                let guard = flight.acquire("quote/AAPL").await;
                guard.shared_failure().map(str::to_string)
            })
        };
        tokio::time::sleep(Duration::from_millis(5)).await;

        assert!(leader.shared_failure().is_none());
        leader.record_failure("status 503");
        drop(leader);

        assert_eq!(waiter.await.unwrap().as_deref(), Some("status 503"));
        assert_eq!(flight.in_flight(), 0);

        // A later caller starts with a clean slate
        let fresh = flight.acquire("quote/AAPL").await;
        assert!(fresh.shared_failure().is_none());
    }

    #[tokio::test]
    async fn test_distinct_keys_do_not_block() {
        let flight = SingleFlight::new();
        let _a = flight.acquire("quote/A").await;
        let _b = flight.acquire("quote/B").await;
        assert_eq!(flight.in_flight(), 2);
    }
}
