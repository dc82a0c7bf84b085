//! Application state management

use crate::cache::{Cache, MemoryCache, SingleFlight};
use crate::clock::{Clock, SystemClock};
use crate::config::AppConfig;
use crate::db::sqlite::SqliteDb;
use crate::error::{AppError, Result};
use crate::market::MarketHours;
use crate::providers::ProviderRegistry;
use crate::queue::{ChannelQueue, Task, WorkQueue};
use crate::session::{CookieCodec, SessionStore};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Application state shared by every handler, service and worker
pub struct AppState {
    pub config: AppConfig,

    /// Source of "now"
    pub clock: Arc<dyn Clock>,

    /// Trading session of the listed exchanges
    pub market: MarketHours,

    /// SQLite database connection
    pub sqlite: Arc<SqliteDb>,

    /// Provider response cache
    pub cache: Arc<dyn Cache>,

    /// Per-key guard collapsing concurrent upstream fetches
    pub single_flight: SingleFlight,

    /// Upstream market-data providers
    pub providers: Arc<ProviderRegistry>,

    /// Refresh task sink
    pub queue: Arc<dyn WorkQueue>,

    /// Server-side session data
    pub sessions: SessionStore,

    /// Session cookie sealing
    pub cookies: CookieCodec,
}

impl AppState {
    /// Build production state; the receiver feeds the refresh worker
    pub fn new(config: AppConfig) -> Result<(Self, mpsc::Receiver<Task>)> {
        if let Some(parent) = config.database_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        tracing::info!("Database: {:?}", config.database_path);

        let sqlite = Arc::new(SqliteDb::new(&config.database_path)?);
        let providers = Arc::new(ProviderRegistry::from_config(&config)?);
        let (queue, receiver) = ChannelQueue::new(config.queue_capacity);

        let state = Self::with_parts(
            config,
            Arc::new(SystemClock),
            sqlite,
            providers,
            Arc::new(queue),
        )?;
        Ok((state, receiver))
    }

    /// Assemble state from explicit collaborators
    pub fn with_parts(
        config: AppConfig,
        clock: Arc<dyn Clock>,
        sqlite: Arc<SqliteDb>,
        providers: Arc<ProviderRegistry>,
        queue: Arc<dyn WorkQueue>,
    ) -> Result<Self> {
        let secret = config
            .cookie_secret
            .as_deref()
            .ok_or_else(|| AppError::Config("cookie_secret is required".to_string()))?;
        let cookies = CookieCodec::from_secret(secret)?;
        let sessions = SessionStore::new(clock.clone(), config.session_max_age());
        let cache: Arc<dyn Cache> = Arc::new(MemoryCache::new(clock.clone()));

        Ok(Self {
            config,
            clock,
            market: MarketHours::us_equities(),
            sqlite,
            cache,
            single_flight: SingleFlight::new(),
            providers,
            queue,
            sessions,
            cookies,
        })
    }

    /// Whether the market is trading right now
    pub fn is_market_open(&self) -> bool {
        self.market.is_open(self.clock.now())
    }
}
