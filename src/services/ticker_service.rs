//! Ticker Service
//!
//! Keeps ticker identity, profile and end-of-day prices in the local
//! database, refreshing them from the Yahoo Finance provider when stale.

use crate::cache::summary_key;
use crate::db::sqlite::models::{Ticker, TickerDaily, TickerUpDown, TickerUpsert};
use crate::error::{AppError, Result};
use crate::providers::types::{from_epoch, YhHistoricalResponse, YhSummaryResponse};
use crate::providers::YHFINANCE;
use crate::state::AppState;
use crate::util::normalize_symbol;
use tracing::{debug, info, warn};

/// Ticker info older than this is refreshed on access
const TICKER_INFO_MAX_AGE_HOURS: i64 = 24;

/// Ticker service for business logic
pub struct TickerService;

impl TickerService {
    /// Ticker for `symbol`, refreshed from the provider when missing or stale.
    ///
    /// `force` skips both the local freshness check and the summary cache.
    /// A failed refresh falls back to the stored row when there is one.
    pub async fn get_fresh_ticker(state: &AppState, symbol: &str, force: bool) -> Result<Ticker> {
        let symbol = normalize_symbol(symbol);
        if symbol.is_empty() {
            return Err(AppError::Validation("Ticker symbol is empty".to_string()));
        }

        let existing = state.sqlite.get_ticker_by_symbol(&symbol)?;
        if let Some(ticker) = &existing {
            if !force && !state.config.skip_local_ticker_info && Self::is_fresh(state, ticker) {
                debug!("Using stored ticker info for {}", symbol);
                return Ok(ticker.clone());
            }
        }

        match Self::refresh_ticker(state, &symbol, force).await {
            Ok(ticker) => Ok(ticker),
            Err(e) => match existing {
                Some(ticker) if !e.is_not_found() => {
                    warn!("Refresh of {} failed, using stored row: {}", symbol, e);
                    Ok(ticker)
                }
                _ => Err(e),
            },
        }
    }

    /// Refetch the ticker's summary unconditionally; errors are returned as is
    pub async fn refresh(state: &AppState, symbol: &str) -> Result<Ticker> {
        let symbol = normalize_symbol(symbol);
        if symbol.is_empty() {
            return Err(AppError::Validation("Ticker symbol is empty".to_string()));
        }
        Self::refresh_ticker(state, &symbol, true).await
    }

    fn is_fresh(state: &AppState, ticker: &Ticker) -> bool {
        ticker.fetch_datetime.map_or(false, |fetched| {
            state.clock.now() - fetched < chrono::Duration::hours(TICKER_INFO_MAX_AGE_HOURS)
        })
    }

    async fn refresh_ticker(state: &AppState, symbol: &str, force: bool) -> Result<Ticker> {
        let summary = Self::fetch_summary(state, symbol, force).await?;
        let exchange = state
            .sqlite
            .get_or_create_exchange(summary.price.exchange.trim())?;

        let quote_type = &summary.quote_type;
        let profile = &summary.summary_profile;
        let text = |v: &Option<String>| v.clone().unwrap_or_default();

        let ticker = state.sqlite.create_or_update_ticker(&TickerUpsert {
            ticker_symbol: symbol.to_string(),
            exchange_id: exchange.id,
            ticker_type: text(&quote_type.quote_type),
            ticker_market: text(&quote_type.market),
            ticker_name: quote_type
                .short_name
                .clone()
                .or_else(|| quote_type.long_name.clone())
                .unwrap_or_default(),
            company_name: text(&quote_type.long_name),
            address: text(&profile.address1),
            city: text(&profile.city),
            state: text(&profile.state),
            zip: text(&profile.zip),
            country: text(&profile.country),
            website: text(&profile.website),
            phone: text(&profile.phone),
            sector: text(&profile.sector),
            industry: text(&profile.industry),
            market_price: summary.price.regular_market_price.raw,
            market_prev_close: summary.price.regular_market_previous_close.raw,
            market_volume: summary.price.regular_market_volume.raw.map(|v| v as i64),
            fetch_datetime: Some(state.clock.now()),
        })?;

        if let Some(business_summary) = profile
            .long_business_summary
            .as_deref()
            .filter(|s| !s.trim().is_empty())
        {
            state
                .sqlite
                .create_or_update_description(ticker.id, business_summary)?;
        }

        for item in &summary.upgrade_downgrade_history.history {
            let Some(graded_at) = from_epoch(item.epoch_grade_date) else {
                continue;
            };
            if item.firm.trim().is_empty() {
                continue;
            }
            state.sqlite.create_updown_if_new(&TickerUpDown {
                id: 0,
                ticker_id: ticker.id,
                updown_action: item.action.clone(),
                updown_from_grade: item.from_grade.clone(),
                updown_to_grade: item.to_grade.clone(),
                updown_date: state.market.local_date(graded_at),
                updown_firm: item.firm.clone(),
            })?;
        }

        for (name, value) in summary.default_key_statistics.attributes() {
            state
                .sqlite
                .create_or_update_attribute(ticker.id, name, "", value)?;
        }

        info!("Refreshed ticker {} on {}", symbol, exchange.exchange_acronym);
        Ok(ticker)
    }

    /// Decoded summary for `symbol`.
    ///
    /// Only a body that decodes and names an exchange is cached; anything
    /// else fails this call and the next call asks the provider again.
    async fn fetch_summary(state: &AppState, symbol: &str, force: bool) -> Result<YhSummaryResponse> {
        let key = summary_key(symbol);

        if !force && !state.config.skip_cache_checks {
            match state.cache.get(&key).await {
                Ok(Some(raw)) => match Self::decode_summary(symbol, &raw) {
                    Ok(summary) => {
                        debug!("Summary cache hit for {}", symbol);
                        return Ok(summary);
                    }
                    Err(e) => warn!("Unreadable cached summary for {}: {}", symbol, e),
                },
                Ok(None) => {}
                Err(e) => warn!("Cache read failed for {}: {}", key, e),
            }
        }

        let provider = state.providers.require(YHFINANCE)?;
        let raw = provider.fetch("summary", &[("symbol", symbol)]).await?;
        let summary = Self::decode_summary(symbol, &raw)?;

        if let Err(e) = state.cache.set(&key, &raw, state.config.summary_ttl()).await {
            warn!("Cache write failed for {}: {}", key, e);
        }
        Ok(summary)
    }

    fn decode_summary(symbol: &str, raw: &str) -> Result<YhSummaryResponse> {
        let summary: YhSummaryResponse = serde_json::from_str(raw)?;
        if summary.price.exchange.trim().is_empty() {
            return Err(AppError::NotFound(format!("Ticker not found: {}", symbol)));
        }
        Ok(summary)
    }

    /// Load end-of-day prices and splits; returns the number of dailies written.
    ///
    /// Rows without a close or with zero volume are skipped. While the
    /// session is open, today's row is stamped with the current exchange
    /// time so it is not mistaken for a settled close.
    pub async fn load_eods(state: &AppState, ticker: &Ticker) -> Result<usize> {
        info!("TickerService::load_eods - {}", ticker.ticker_symbol);

        let provider = state.providers.require(YHFINANCE)?;
        let raw = provider
            .fetch("historical", &[("symbol", ticker.ticker_symbol.as_str())])
            .await?;
        let history: YhHistoricalResponse = serde_json::from_str(&raw)?;

        let now = state.clock.now();
        let today = state.market.local_date(now);
        let open_now = state.market.is_open(now);
        let mut written = 0;

        for price in &history.prices {
            let (Some(close), Some(volume)) = (price.close, price.volume) else {
                continue;
            };
            if volume <= 0.0 {
                continue;
            }
            let Some(bar_time) = from_epoch(price.date) else {
                continue;
            };

            let local = bar_time.with_timezone(&state.market.tz);
            let price_date = local.date_naive();
            let stamp = if price_date == today && open_now {
                now.with_timezone(&state.market.tz)
            } else {
                local
            };

            state.sqlite.create_or_update_daily(&TickerDaily {
                id: 0,
                ticker_id: ticker.id,
                price_date,
                price_time: stamp.format("%H:%M:%S").to_string(),
                open_price: price.open.unwrap_or(close),
                high_price: price.high.unwrap_or(close),
                low_price: price.low.unwrap_or(close),
                close_price: close,
                volume,
            })?;
            written += 1;
        }

        for event in &history.events_data {
            if !event.event_type.eq_ignore_ascii_case("SPLIT") {
                continue;
            }
            let (Some(ratio), Some(at)) = (event.split_ratio.as_deref(), from_epoch(event.date)) else {
                continue;
            };
            state
                .sqlite
                .create_split_if_new(ticker.id, state.market.local_date(at), ratio)?;
        }

        debug!("Stored {} dailies for {}", written, ticker.ticker_symbol);
        Ok(written)
    }

    /// Load EODs when the last settled close is missing
    pub async fn ensure_eods(state: &AppState, ticker: &Ticker) -> Result<()> {
        let needed = state.market.eods_needed(state.clock.now(), |date| {
            state
                .sqlite
                .have_eod_for_date(ticker.id, date)
                .unwrap_or_else(|e| {
                    warn!("EOD lookup failed for {}: {}", ticker.ticker_symbol, e);
                    false
                })
        });

        if needed {
            Self::load_eods(state, ticker).await?;
        }
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use crate::providers::testing::{param, FakeProvider};
    use crate::state::testing::harness;
    use chrono::{TimeZone, Utc};
    use std::sync::Arc;

    fn yahoo() -> Arc<FakeProvider> {
        Arc::new(FakeProvider::new(YHFINANCE, |endpoint, params| match endpoint {
            "summary" => Ok(summary_body(param(params, "symbol"))),
            // Fri 2024-03-01 and Mon 2024-03-04, 09:30 EST
            "historical" => Ok(historical_body(&[(1709303400, 180.0), (1709562600, 182.0)])),
            other => Err(AppError::Validation(format!("unexpected endpoint {}", other))),
        }))
    }

    fn monday(hour_utc: u32) -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 4, hour_utc, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_fresh_ticker_creates_from_summary() {
        let provider = yahoo();
        let h = harness(monday(15), vec![provider.clone()]);

        let ticker = TickerService::get_fresh_ticker(&h.state, "aapl", false).await.unwrap();
        assert_eq!(ticker.ticker_symbol, "AAPL");
        assert_eq!(ticker.ticker_name, "AAPL Inc");
        assert_eq!(ticker.sector, "Technology");
        assert_eq!(ticker.market_price, 190.0);

        let exchange = h.state.sqlite.get_exchange_by_id(ticker.exchange_id).unwrap();
        assert_eq!(exchange.exchange_acronym, "NASDAQ");

        let description = h.state.sqlite.get_description(ticker.id).unwrap().unwrap();
        assert_eq!(description.business_summary, "AAPL makes things.");
        let updowns = h
            .state
            .sqlite
            .get_updowns_since(ticker.id, "2024-01-01".parse().unwrap())
            .unwrap();
        assert_eq!(updowns.len(), 1);
        assert_eq!(h.state.sqlite.get_attributes(ticker.id).unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_stored_ticker_reused_until_stale() {
        let provider = yahoo();
        let h = harness(monday(15), vec![provider.clone()]);

        let first = TickerService::get_fresh_ticker(&h.state, "AAPL", false).await.unwrap();
        let again = TickerService::get_fresh_ticker(&h.state, "AAPL", false).await.unwrap();
        assert_eq!(first.id, again.id);
        assert_eq!(provider.calls_to("summary"), 1);

        // Past a day both the row and the cached summary are stale
        h.clock.advance(chrono::Duration::hours(25));
        let refreshed = TickerService::get_fresh_ticker(&h.state, "AAPL", false).await.unwrap();
        assert_eq!(refreshed.id, first.id);
        assert_eq!(provider.calls_to("summary"), 2);
    }

    #[tokio::test]
    async fn test_forced_refresh_skips_summary_cache() {
        let provider = yahoo();
        let h = harness(monday(15), vec![provider.clone()]);

        TickerService::get_fresh_ticker(&h.state, "AAPL", false).await.unwrap();
        TickerService::get_fresh_ticker(&h.state, "AAPL", true).await.unwrap();
        assert_eq!(provider.calls_to("summary"), 2);
    }

    #[tokio::test]
    async fn test_failed_refresh_falls_back_to_stored_row() {
        let h = harness(monday(15), vec![yahoo()]);
        let stored = TickerService::get_fresh_ticker(&h.state, "AAPL", false).await.unwrap();

        let failing = crate::state::testing::harness(monday(15), vec![Arc::new(FakeProvider::failing(YHFINANCE, 503))]);
        let state = AppState::with_parts(
            failing.state.config.clone(),
            failing.state.clock.clone(),
            h.state.sqlite.clone(),
            failing.state.providers.clone(),
            failing.state.queue.clone(),
        )
        .unwrap();

        let ticker = TickerService::get_fresh_ticker(&state, "AAPL", true).await.unwrap();
        assert_eq!(ticker.id, stored.id);
    }

    #[tokio::test]
    async fn test_unknown_symbol_is_not_found() {
        let provider = Arc::new(FakeProvider::new(YHFINANCE, |_, _| Ok("{}".to_string())));
        let h = harness(monday(15), vec![provider]);

        let err = TickerService::get_fresh_ticker(&h.state, "NOPE", false).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_malformed_summary_is_not_cached() {
        let provider = Arc::new(FakeProvider::new(YHFINANCE, {
            let served = std::sync::atomic::AtomicUsize::new(0);
            move |_, params| {
                if served.fetch_add(1, std::sync::atomic::Ordering::SeqCst) == 0 {
                    Ok("<html>".to_string())
                } else {
                    Ok(summary_body(param(params, "symbol")))
                }
            }
        }));
        let h = harness(monday(15), vec![provider.clone()]);

        let err = TickerService::get_fresh_ticker(&h.state, "AAPL", false).await.unwrap_err();
        assert!(matches!(err, AppError::Serialization(_)));

        h.clock.advance(chrono::Duration::hours(1));
        let ticker = TickerService::get_fresh_ticker(&h.state, "AAPL", false).await.unwrap();
        assert_eq!(ticker.ticker_symbol, "AAPL");
        assert_eq!(provider.calls_to("summary"), 2);
    }

    #[tokio::test]
    async fn test_unknown_symbol_is_asked_again() {
        let provider = Arc::new(FakeProvider::new(YHFINANCE, |_, _| Ok("{}".to_string())));
        let h = harness(monday(15), vec![provider.clone()]);

        for _ in 0..2 {
            let err = TickerService::get_fresh_ticker(&h.state, "NOPE", false).await.unwrap_err();
            assert!(err.is_not_found());
        }
        assert_eq!(provider.calls_to("summary"), 2);
    }

    #[tokio::test]
    async fn test_load_eods_stamps_today_while_open() {
        // Monday 10:00 EST, session open
        let h = harness(monday(15), vec![yahoo()]);
        let ticker = TickerService::get_fresh_ticker(&h.state, "AAPL", false).await.unwrap();

        let written = TickerService::load_eods(&h.state, &ticker).await.unwrap();
        assert_eq!(written, 2);

        let dailies = h.state.sqlite.get_last_two_dailies(ticker.id).unwrap();
        assert_eq!(dailies[0].price_date.to_string(), "2024-03-04");
        assert_eq!(dailies[0].price_time, "10:00:00");
        assert_eq!(dailies[1].price_time, "09:30:00");

        let friday = "2024-03-01".parse().unwrap();
        let monday_date = "2024-03-04".parse().unwrap();
        assert!(h.state.sqlite.have_eod_for_date(ticker.id, friday).unwrap());
        assert!(!h.state.sqlite.have_eod_for_date(ticker.id, monday_date).unwrap());

        assert_eq!(h.state.sqlite.get_splits(ticker.id).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_ensure_eods_only_when_missing() {
        let provider = yahoo();
        // Monday 12:00 EST: Friday's close is the one that matters
        let h = harness(monday(17), vec![provider.clone()]);
        let ticker = TickerService::get_fresh_ticker(&h.state, "AAPL", false).await.unwrap();

        TickerService::ensure_eods(&h.state, &ticker).await.unwrap();
        TickerService::ensure_eods(&h.state, &ticker).await.unwrap();
        assert_eq!(provider.calls_to("historical"), 1);
    }
}
