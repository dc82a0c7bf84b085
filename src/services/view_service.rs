//! View Service
//!
//! Assembles page view-models. Only the ticker identity is required; every
//! other section is fetched on its own and left out when it fails.

use crate::db::sqlite::models::{
    Article, Exchange, Ticker, TickerAttribute, TickerDaily, TickerIntraday, TickerSplit,
    TickerUpDown,
};
use crate::error::{AppError, Result};
use crate::market::{next_workday, prior_workday};
use crate::providers::types::Quote;
use crate::services::intraday_service::IntradayService;
use crate::services::movers_service::{MoversService, MoversView};
use crate::services::quotes_service::QuotesService;
use crate::services::refresh_service::{NewsStatus, RefreshScheduler};
use crate::services::ticker_service::TickerService;
use crate::session::{
    add_to_recents, get_recents, Message, MessageLevel, ViewPair, WatcherSession,
};
use crate::state::AppState;
use crate::util::normalize_symbol;
use chrono::{Duration, NaiveDate};
use serde::Serialize;
use std::collections::HashMap;
use tracing::{info, warn};

const TICKER_ARTICLE_LIMIT: usize = 20;
const TICKER_ARTICLE_DAYS: i64 = 180;
const RECENT_ARTICLE_LIMIT: usize = 5;
const RECENT_ARTICLE_DAYS: i64 = 7;
const DESKTOP_ARTICLE_LIMIT: usize = 20;
const UPDOWN_DAYS: i64 = 180;
/// Price history window in days: default and accepted range
const DEFAULT_TIMESPAN_DAYS: i64 = 90;
const MIN_TIMESPAN_DAYS: i64 = 15;
const MAX_TIMESPAN_DAYS: i64 = 180;
/// Fewer stored moments than this are not worth charting
const MIN_SHOWN_MOMENTS: usize = 20;
/// Lookback for the closes around an intraday date
const INTRADAY_CLOSE_DAYS: i64 = 10;

/// Ticker detail page
#[derive(Debug, Clone, Serialize)]
pub struct TickerView {
    pub ticker: Ticker,
    pub exchange: Exchange,
    pub is_market_open: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quote: Option<Quote>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_close: Option<TickerDaily>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prior_close: Option<TickerDaily>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_daily_move: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updowns: Option<Vec<TickerUpDown>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attributes: Option<Vec<TickerAttribute>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub splits: Option<Vec<TickerSplit>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history: Option<Vec<TickerDaily>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub articles: Option<Vec<Article>>,
    pub news: NewsStatus,
    pub recents: Vec<ViewPair>,
    pub messages: Vec<Message>,
}

/// One trading day of a ticker
#[derive(Debug, Clone, Serialize)]
pub struct IntradayView {
    pub ticker: Ticker,
    pub exchange: Exchange,
    pub date: NaiveDate,
    pub is_market_open: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub day_close: Option<TickerDaily>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prior_close: Option<TickerDaily>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_daily_move: Option<String>,
    pub prior_business_date: NaiveDate,
    /// Absent when the next workday has not started yet
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_business_date: Option<NaiveDate>,
    pub intradays: Vec<TickerIntraday>,
    pub recents: Vec<ViewPair>,
    pub messages: Vec<Message>,
}

/// A recently viewed ticker with its latest prices
#[derive(Debug, Clone, Serialize)]
pub struct RecentPlus {
    pub ticker_symbol: String,
    pub exchange_acronym: String,
    pub ticker_name: String,
    pub company_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub live_quote: Option<Quote>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_close: Option<TickerDaily>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prior_close: Option<TickerDaily>,
    pub last_daily_move: String,
    pub articles: Vec<Article>,
    pub news: NewsStatus,
}

/// Dashboard page
#[derive(Debug, Clone, Serialize)]
pub struct DesktopView {
    pub is_market_open: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub movers: Option<MoversView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub articles: Option<Vec<Article>>,
    pub recents: Vec<ViewPair>,
    pub recents_plus: Vec<RecentPlus>,
    pub market_news: NewsStatus,
    pub messages: Vec<Message>,
}

pub struct ViewService;

impl ViewService {
    /// Detail page for `symbol`.
    ///
    /// Fails only when the ticker or its exchange cannot be resolved. The
    /// view also adds the ticker to the session's recents and queues stale
    /// news and financials refreshes. `timespan_days` sizes the price
    /// history and is clamped to 15..=180 (default 90).
    pub async fn ticker_view(
        state: &AppState,
        session: &mut WatcherSession,
        symbol: &str,
        timespan_days: Option<i64>,
    ) -> Result<TickerView> {
        let symbol = normalize_symbol(symbol);
        info!("ViewService::ticker_view - {}", symbol);

        let ticker = TickerService::get_fresh_ticker(state, &symbol, false).await?;
        let exchange = state.sqlite.get_exchange_by_id(ticker.exchange_id)?;

        let is_market_open = state.is_market_open();
        let quote = if is_market_open {
            Self::live_quote(state, &ticker).await
        } else {
            if let Err(e) = TickerService::ensure_eods(state, &ticker).await {
                warn!("Omitting fresh EODs for {}: {}", symbol, e);
            }
            None
        };

        let now = state.clock.now();
        let today = state.market.local_date(now);
        let id = ticker.id;

        let (last_close, prior_close) =
            match optional("last closes", &symbol, state.sqlite.get_last_two_dailies(id)) {
                Some(dailies) => split_closes(dailies),
                None => (None, None),
            };

        let view = TickerView {
            is_market_open,
            quote,
            last_close,
            prior_close,
            last_daily_move: optional("daily move", &symbol, state.sqlite.get_last_daily_move(id)),
            description: optional("description", &symbol, state.sqlite.get_description(id))
                .flatten()
                .map(|d| d.business_summary),
            updowns: optional(
                "up/downgrades",
                &symbol,
                state.sqlite.get_updowns_since(id, days_before(today, UPDOWN_DAYS)),
            ),
            attributes: optional("attributes", &symbol, state.sqlite.get_attributes(id)),
            splits: optional("splits", &symbol, state.sqlite.get_splits(id)),
            history: optional(
                "price history",
                &symbol,
                state.sqlite.get_dailies_since(id, days_before(today, timespan(timespan_days))),
            ),
            articles: optional(
                "articles",
                &symbol,
                state.sqlite.get_articles_by_ticker(
                    id,
                    now - Duration::days(TICKER_ARTICLE_DAYS),
                    TICKER_ARTICLE_LIMIT,
                ),
            ),
            news: RefreshScheduler::schedule(state, &ticker),
            recents: add_to_recents(session, &ticker.ticker_symbol, &exchange.exchange_acronym),
            messages: session.take_messages(),
            ticker,
            exchange,
        };

        if let Err(e) = state.sqlite.touch_recent(view.ticker.id, now) {
            warn!("Failed to record recent view of {}: {}", symbol, e);
        }

        Ok(view)
    }

    /// Intraday page for `symbol` on `date` (`YYYY-MM-DD`).
    ///
    /// Missing moments for the day are fetched first, with the outcome
    /// flashed to the session. Moments are listed only when enough of the
    /// session was stored to chart it.
    pub async fn intraday_view(
        state: &AppState,
        session: &mut WatcherSession,
        symbol: &str,
        date: &str,
    ) -> Result<IntradayView> {
        let symbol = normalize_symbol(symbol);
        info!("ViewService::intraday_view - {} {}", symbol, date);

        let date = NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d")
            .map_err(|_| AppError::Validation(format!("Invalid date: {}", date)))?;
        let ticker = TickerService::get_fresh_ticker(state, &symbol, false).await?;
        let exchange = state.sqlite.get_exchange_by_id(ticker.exchange_id)?;

        match IntradayService::update_intradays(state, &ticker, &exchange, date).await {
            Ok(true) => session.flash(
                format!("Pulled intraday prices for {} on {}", symbol, date),
                MessageLevel::Success,
            ),
            Ok(false) => {}
            Err(e) => session.flash(
                format!("Failed to pull intraday prices for {} on {}: {}", symbol, date, e),
                MessageLevel::Danger,
            ),
        }

        let intradays = optional("intradays", &symbol, state.sqlite.get_intradays(ticker.id, date))
            .unwrap_or_default();
        let intradays = if intradays.len() < MIN_SHOWN_MOMENTS {
            session.flash(
                format!("No intraday data found for {}", symbol),
                MessageLevel::Warning,
            );
            Vec::new()
        } else {
            intradays
        };

        let (day_close, prior_close) = match optional(
            "day closes",
            &symbol,
            state
                .sqlite
                .get_dailies_since(ticker.id, days_before(date, INTRADAY_CLOSE_DAYS)),
        ) {
            Some(dailies) => closes_through(dailies, date),
            None => (None, None),
        };

        let today = state.market.local_date(state.clock.now());
        let next = next_workday(date);

        Ok(IntradayView {
            date,
            is_market_open: state.is_market_open(),
            day_close,
            prior_close,
            last_daily_move: optional("daily move", &symbol, state.sqlite.get_last_daily_move(ticker.id)),
            prior_business_date: prior_workday(date),
            next_business_date: (next <= today).then_some(next),
            intradays,
            recents: add_to_recents(session, &ticker.ticker_symbol, &exchange.exchange_acronym),
            messages: session.take_messages(),
            ticker,
            exchange,
        })
    }

    /// Live quote, recorded on the ticker; failures leave the section out
    async fn live_quote(state: &AppState, ticker: &Ticker) -> Option<Quote> {
        match QuotesService::get_quote(state, &ticker.ticker_symbol).await {
            Ok(Some(quote)) => {
                if let Err(e) = QuotesService::update_ticker_with_live_quote(state, ticker, &quote) {
                    warn!("Failed to record live quote for {}: {}", ticker.ticker_symbol, e);
                }
                Some(quote)
            }
            Ok(None) => {
                warn!("No live quote returned for {}", ticker.ticker_symbol);
                None
            }
            Err(e) => {
                warn!("Omitting live quote for {}: {}", ticker.ticker_symbol, e);
                None
            }
        }
    }

    /// Dashboard: movers, latest articles and the session's recents
    pub async fn desktop_view(state: &AppState, session: &mut WatcherSession) -> DesktopView {
        let recents = get_recents(session);
        let is_market_open = state.is_market_open();

        DesktopView {
            is_market_open,
            movers: optional("movers", "desktop", MoversService::get_movers(state)),
            articles: optional(
                "articles",
                "desktop",
                state.sqlite.get_recent_articles(DESKTOP_ARTICLE_LIMIT),
            ),
            recents_plus: Self::recents_plus(state, &recents, is_market_open).await,
            recents,
            market_news: RefreshScheduler::market_news_status(state),
            messages: session.take_messages(),
        }
    }

    /// Price and news summary for each recent ticker.
    ///
    /// While the market is open all live quotes come from one batched call;
    /// otherwise missing EODs are loaded and the last closes are shown.
    async fn recents_plus(state: &AppState, recents: &[ViewPair], open: bool) -> Vec<RecentPlus> {
        let mut resolved: Vec<(Ticker, Exchange)> = Vec::new();
        for pair in recents {
            let found = state
                .sqlite
                .get_ticker_by_symbol_and_acronym(&pair.symbol, &pair.exchange_acronym)
                .and_then(|ticker| {
                    ticker
                        .map(|t| state.sqlite.get_exchange_by_id(t.exchange_id).map(|e| (t, e)))
                        .transpose()
                });
            match found {
                Ok(Some(listing)) => resolved.push(listing),
                Ok(None) => warn!(
                    "Recent ticker {} on {} is not stored",
                    pair.symbol, pair.exchange_acronym
                ),
                Err(e) => warn!("Failed to load recent ticker {}: {}", pair.symbol, e),
            }
        }

        let mut quotes: HashMap<String, Quote> = HashMap::new();
        if open {
            let symbols: Vec<String> = resolved.iter().map(|(t, _)| t.ticker_symbol.clone()).collect();
            match QuotesService::get_quotes(state, &symbols).await {
                Ok(found) => quotes = found,
                Err(e) => warn!("Omitting live quotes for recents: {}", e),
            }
        } else {
            for (ticker, _) in &resolved {
                if let Err(e) = TickerService::ensure_eods(state, ticker).await {
                    warn!("Omitting fresh EODs for {}: {}", ticker.ticker_symbol, e);
                }
            }
        }

        let since = state.clock.now() - Duration::days(RECENT_ARTICLE_DAYS);
        resolved
            .into_iter()
            .map(|(ticker, exchange)| {
                let symbol = ticker.ticker_symbol.clone();
                let (last_close, prior_close) =
                    match optional("last closes", &symbol, state.sqlite.get_last_two_dailies(ticker.id)) {
                        Some(dailies) => split_closes(dailies),
                        None => (None, None),
                    };
                RecentPlus {
                    live_quote: quotes.remove(&symbol),
                    last_close,
                    prior_close,
                    last_daily_move: optional("daily move", &symbol, state.sqlite.get_last_daily_move(ticker.id))
                        .unwrap_or_else(|| "unknown".to_string()),
                    articles: optional(
                        "articles",
                        &symbol,
                        state.sqlite.get_articles_by_ticker(ticker.id, since, RECENT_ARTICLE_LIMIT),
                    )
                    .unwrap_or_default(),
                    news: RefreshScheduler::ticker_news_status(state, &ticker),
                    exchange_acronym: exchange.exchange_acronym,
                    ticker_name: ticker.ticker_name,
                    company_name: ticker.company_name,
                    ticker_symbol: symbol,
                }
            })
            .collect()
    }
}

/// Keep a section only when it loaded
fn optional<T>(section: &str, subject: &str, result: Result<T>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("Omitting {} for {}: {}", section, subject, e);
            None
        }
    }
}

/// Newest-first dailies into (last, prior)
fn split_closes(dailies: Vec<TickerDaily>) -> (Option<TickerDaily>, Option<TickerDaily>) {
    let mut iter = dailies.into_iter();
    (iter.next(), iter.next())
}

/// Oldest-first dailies into (close of `date`, the close before it)
fn closes_through(
    dailies: Vec<TickerDaily>,
    date: NaiveDate,
) -> (Option<TickerDaily>, Option<TickerDaily>) {
    let mut upto: Vec<TickerDaily> = dailies.into_iter().filter(|d| d.price_date <= date).collect();
    upto.sort_by_key(|d| d.price_date);
    let day = upto.pop().filter(|d| d.price_date == date);
    let prior = if day.is_some() { upto.pop() } else { None };
    (day, prior)
}

fn timespan(requested: Option<i64>) -> i64 {
    requested
        .unwrap_or(DEFAULT_TIMESPAN_DAYS)
        .clamp(MIN_TIMESPAN_DAYS, MAX_TIMESPAN_DAYS)
}

fn days_before(date: NaiveDate, days: i64) -> NaiveDate {
    date - Duration::days(days)
}
