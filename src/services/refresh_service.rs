//! Lazy refresh scheduling
//!
//! Viewing a ticker queues a news and a financials refresh when the last
//! successful run of that kind is older than its configured delay.

use crate::db::sqlite::models::Ticker;
use crate::queue::{TaskAction, TaskTickerBody};
use crate::state::AppState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Ledger activity for the market-wide news feed
pub const MARKET_NEWS_ACTIVITY: &str = "financial_news";
pub const MARKET_NEWS_KEY: &str = "stockwatch";

/// Freshness of a news feed as shown on a page
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewsStatus {
    /// Time of the last successful refresh
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_checked: Option<DateTime<Utc>>,
    /// A refresh was queued by this request
    pub updating_now: bool,
}

pub struct RefreshScheduler;

impl RefreshScheduler {
    /// Queue stale refreshes for `ticker` and report its news status
    pub fn schedule(state: &AppState, ticker: &Ticker) -> NewsStatus {
        let news = Self::schedule_action(
            state,
            TaskAction::News,
            &ticker.ticker_symbol,
            state.config.ticker_news_delay(),
        );
        Self::schedule_action(
            state,
            TaskAction::Financials,
            &ticker.ticker_symbol,
            state.config.ticker_financials_delay(),
        );
        news
    }

    fn schedule_action(
        state: &AppState,
        action: TaskAction,
        symbol: &str,
        delay: chrono::Duration,
    ) -> NewsStatus {
        let last_checked = Self::last_success(state, action.activity(), symbol);

        let due = last_checked.map_or(true, |at| at + delay < state.clock.now());
        if !due {
            debug!("{} for {} is fresh", action.activity(), symbol);
            return NewsStatus {
                last_checked,
                updating_now: false,
            };
        }

        let body = TaskTickerBody {
            ticker_symbol: symbol.to_string(),
        };
        let updating_now = match state.queue.enqueue(action, body) {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to queue {} for {}: {}", action.as_str(), symbol, e);
                false
            }
        };

        NewsStatus {
            last_checked,
            updating_now,
        }
    }

    /// Status of the market-wide news feed; never schedules anything
    pub fn market_news_status(state: &AppState) -> NewsStatus {
        Self::status(state, MARKET_NEWS_ACTIVITY, MARKET_NEWS_KEY)
    }

    /// News status of one ticker without scheduling a refresh
    pub fn ticker_news_status(state: &AppState, ticker: &Ticker) -> NewsStatus {
        Self::status(state, TaskAction::News.activity(), &ticker.ticker_symbol)
    }

    fn status(state: &AppState, activity: &str, key: &str) -> NewsStatus {
        NewsStatus {
            last_checked: Self::last_success(state, activity, key),
            updating_now: false,
        }
    }

    /// Last successful run, treating ledger failures as "never"
    fn last_success(state: &AppState, activity: &str, key: &str) -> Option<DateTime<Utc>> {
        match state.sqlite.get_lastdone(activity, key) {
            Ok(entry) => entry
                .filter(|entry| entry.succeeded())
                .map(|entry| entry.lastdone_datetime),
            Err(e) => {
                warn!("Ledger read failed for {}/{}: {}", activity, key, e);
                None
            }
        }
    }
}
