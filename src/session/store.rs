//! Server-side session storage

use super::WatcherSession;
use crate::clock::Clock;
use crate::error::Result;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;

struct StoredSession {
    data: String,
    expires_at: DateTime<Utc>,
}

/// Session id -> serialized `WatcherSession`, with a sliding lifetime
pub struct SessionStore {
    entries: DashMap<String, StoredSession>,
    clock: Arc<dyn Clock>,
    max_age: chrono::Duration,
}

impl SessionStore {
    pub fn new(clock: Arc<dyn Clock>, max_age: chrono::Duration) -> Self {
        Self {
            entries: DashMap::new(),
            clock,
            max_age,
        }
    }

    /// Start an empty session and return its id
    pub fn create(&self) -> String {
        let id = uuid::Uuid::new_v4().to_string();
        self.entries.insert(
            id.clone(),
            StoredSession {
                data: "{}".to_string(),
                expires_at: self.clock.now() + self.max_age,
            },
        );
        tracing::debug!("Created session {}", id);
        id
    }

    /// Load a live session; unknown and expired ids yield `None`
    pub fn load(&self, id: &str) -> Option<WatcherSession> {
        let now = self.clock.now();
        if self
            .entries
            .remove_if(id, |_, stored| stored.expires_at <= now)
            .is_some()
        {
            tracing::debug!("Session {} expired", id);
            return None;
        }

        self.entries
            .get(id)
            .map(|stored| WatcherSession::decode(&stored.data))
    }

    /// Write the session back and extend its lifetime
    pub fn save(&self, id: &str, session: &WatcherSession) -> Result<()> {
        let data = serde_json::to_string(session)?;
        self.entries.insert(
            id.to_string(),
            StoredSession {
                data,
                expires_at: self.clock.now() + self.max_age,
            },
        );
        Ok(())
    }

    pub fn remove(&self, id: &str) {
        self.entries.remove(id);
    }

    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let before = self.entries.len();
        self.entries.retain(|_, stored| stored.expires_at > now);
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
