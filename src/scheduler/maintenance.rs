//! Periodic cleanup of expired cache entries and sessions

use crate::state::AppState;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info};

const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

pub struct MaintenanceScheduler {
    state: Arc<AppState>,
}

impl MaintenanceScheduler {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }

    /// Spawn the sweep loop
    pub fn start(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!("Maintenance scheduler started");
            let mut interval = tokio::time::interval(SWEEP_INTERVAL);
            loop {
                interval.tick().await;
                self.sweep();
            }
        })
    }

    /// Purge expired entries; returns (cache entries, sessions) removed
    pub fn sweep(&self) -> (usize, usize) {
        let cache = self.state.cache.purge_expired();
        let sessions = self.state.sessions.purge_expired();
        if cache + sessions > 0 {
            debug!("Swept {} cache entries and {} sessions", cache, sessions);
        }
        (cache, sessions)
    }
}
