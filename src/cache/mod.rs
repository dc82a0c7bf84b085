//! Response cache for upstream provider payloads
//!
//! Raw provider responses are stored under keys such as `quote/AAPL` with a
//! per-entry TTL. `SingleFlight` collapses concurrent misses for one key.

mod single_flight;

pub use single_flight::SingleFlight;

use crate::clock::Clock;
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;

/// Key-value cache with expiring entries
#[async_trait]
pub trait Cache: Send + Sync {
    /// Cached value, or `None` on a miss or an expired entry
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store `value` under `key` for `ttl`
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()>;

    /// Drop every expired entry, returning how many were removed
    fn purge_expired(&self) -> usize;
}

/// Cache key for a live quote
pub fn quote_key(symbol: &str) -> String {
    format!("quote/{}", symbol)
}

/// Cache key for a ticker summary
pub fn summary_key(symbol: &str) -> String {
    format!("summary/{}", symbol)
}

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: DateTime<Utc>,
}

/// In-process cache backed by a concurrent map
pub struct MemoryCache {
    entries: DashMap<String, Entry>,
    clock: Arc<dyn Clock>,
}

impl MemoryCache {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            clock,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let now = self.clock.now();

        let hit = match self.entries.get(key) {
            Some(entry) if entry.expires_at > now => return Ok(Some(entry.value.clone())),
            Some(_) => true,
            None => false,
        };

        // Expired: evict outside the read guard
        if hit {
            self.entries.remove_if(key, |_, entry| entry.expires_at <= now);
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let ttl = chrono::Duration::from_std(ttl)
            .map_err(|e| crate::error::AppError::Cache(format!("Invalid TTL for {}: {}", key, e)))?;

        self.entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: self.clock.now() + ttl,
            },
        );
        Ok(())
    }

    fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.expires_at > now);
        let removed = before.saturating_sub(self.entries.len());
        if removed > 0 {
            tracing::debug!("Purged {} expired cache entries", removed);
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use chrono::TimeZone;

    fn fixture() -> (Arc<FixedClock>, MemoryCache) {
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2024, 3, 4, 15, 0, 0).unwrap(),
        ));
        let cache = MemoryCache::new(clock.clone());
        (clock, cache)
    }

    #[tokio::test]
    async fn test_hit_within_ttl() {
        let (clock, cache) = fixture();
        cache
            .set("quote/AAPL", "{}", Duration::from_secs(20))
            .await
            .unwrap();

        clock.advance(chrono::Duration::seconds(19));
        assert_eq!(cache.get("quote/AAPL").await.unwrap().as_deref(), Some("{}"));
    }

    #[tokio::test]
    async fn test_expired_entry_is_miss_and_evicted() {
        let (clock, cache) = fixture();
        cache
            .set("quote/AAPL", "{}", Duration::from_secs(20))
            .await
            .unwrap();

        clock.advance(chrono::Duration::seconds(20));
        assert!(cache.get("quote/AAPL").await.unwrap().is_none());
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_purge_expired() {
        let (clock, cache) = fixture();
        cache.set("quote/A", "a", Duration::from_secs(20)).await.unwrap();
        cache
            .set("summary/A", "s", Duration::from_secs(86400))
            .await
            .unwrap();

        clock.advance(chrono::Duration::minutes(1));
        assert_eq!(cache.purge_expired(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_keys() {
        assert_eq!(quote_key("AAPL"), "quote/AAPL");
        assert_eq!(summary_key("AAPL"), "summary/AAPL");
    }
}
