//! Intraday Service
//!
//! Price moments through one trading day, pulled from Marketstack the first
//! time a day is viewed and stored per ticker.

use crate::db::sqlite::models::{Exchange, Ticker, TickerIntraday};
use crate::error::Result;
use crate::market::is_workday;
use crate::providers::types::MkIntradayResponse;
use crate::providers::MARKETSTACK;
use crate::state::AppState;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use tracing::{info, warn};

/// A day holding at least this many moments is not fetched again
const STORED_DAY_MOMENTS: usize = 50;
const INTERVAL: &str = "5min";
const FETCH_LIMIT: &str = "1000";
/// Moments stamped this long after the close still belong to the session
const CLOSE_GRACE_MINUTES: i64 = 5;

pub struct IntradayService;

impl IntradayService {
    /// Whether `date` is a past or current workday with too few stored moments
    pub fn intradays_needed(state: &AppState, ticker: &Ticker, date: NaiveDate) -> Result<bool> {
        let today = state.market.local_date(state.clock.now());
        if date > today || !is_workday(date) {
            return Ok(false);
        }
        Ok(state.sqlite.count_intradays(ticker.id, date)? < STORED_DAY_MOMENTS)
    }

    /// Fetch and store the session moments of `date`; returns how many
    /// were written.
    ///
    /// The provider reports cumulative volume, so each stored moment keeps
    /// the volume traded since the previous one.
    pub async fn load_intradays(
        state: &AppState,
        ticker: &Ticker,
        exchange: &Exchange,
        date: NaiveDate,
    ) -> Result<usize> {
        let provider = state.providers.require(MARKETSTACK)?;
        let day = date.format("%Y-%m-%d").to_string();
        let mut params = vec![
            ("symbols", ticker.ticker_symbol.as_str()),
            ("interval", INTERVAL),
            ("date_from", day.as_str()),
            ("date_to", day.as_str()),
            ("limit", FETCH_LIMIT),
        ];
        if !exchange.exchange_mic.is_empty() {
            params.push(("exchange", exchange.exchange_mic.as_str()));
        }

        let raw = provider.fetch("intraday", &params).await?;
        let response: MkIntradayResponse = serde_json::from_str(&raw)?;

        let mut moments: Vec<(DateTime<Utc>, f64, f64)> = response
            .data
            .iter()
            .filter_map(|m| Some((m.at()?, m.price()?, m.volume.unwrap_or(0.0))))
            .filter(|(at, _, _)| Self::in_session(state, date, *at))
            .collect();
        moments.sort_by_key(|(at, _, _)| *at);

        let mut traded = 0.0;
        for (at, price, cumulative) in &moments {
            state.sqlite.create_or_update_intraday(&TickerIntraday {
                id: 0,
                ticker_id: ticker.id,
                price_date: date,
                price_datetime: *at,
                last_price: *price,
                volume: (cumulative - traded).max(0.0),
            })?;
            traded = traded.max(*cumulative);
        }

        info!(
            "Stored {} intraday moments for {} on {}",
            moments.len(),
            ticker.ticker_symbol,
            day
        );
        Ok(moments.len())
    }

    /// Load `date` when it is needed. Returns whether a fetch succeeded;
    /// `Ok(false)` means the day was already stored or cannot have data.
    pub async fn update_intradays(
        state: &AppState,
        ticker: &Ticker,
        exchange: &Exchange,
        date: NaiveDate,
    ) -> Result<bool> {
        if !Self::intradays_needed(state, ticker, date)? {
            return Ok(false);
        }
        match Self::load_intradays(state, ticker, exchange, date).await {
            Ok(_) => Ok(true),
            Err(e) => {
                warn!("Failed to load intradays for {}: {}", ticker.ticker_symbol, e);
                Err(e)
            }
        }
    }

    fn in_session(state: &AppState, date: NaiveDate, at: DateTime<Utc>) -> bool {
        let local = at.with_timezone(&state.market.tz);
        let time = local.time();
        local.date_naive() == date
            && time >= state.market.open
            && time <= state.market.close + Duration::minutes(CLOSE_GRACE_MINUTES)
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::{full_session, intraday_body};
    use super::*;
    use crate::db::sqlite::models::TickerUpsert;
    use crate::error::AppError;
    use crate::providers::testing::{param, FakeProvider};
    use crate::state::testing::{harness, TestHarness};
    use chrono::TimeZone;
    use std::sync::Arc;

    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 4).unwrap()
    }

    fn setup(provider: Arc<FakeProvider>) -> (TestHarness, Ticker, Exchange) {
        // Tuesday 2024-03-05 10:00 EST
        let h = harness(Utc.with_ymd_and_hms(2024, 3, 5, 15, 0, 0).unwrap(), vec![provider]);
        let exchange = h.state.sqlite.get_or_create_exchange("NMS").unwrap();
        let ticker = h
            .state
            .sqlite
            .create_or_update_ticker(&TickerUpsert {
                ticker_symbol: "AAPL".to_string(),
                exchange_id: exchange.id,
                ..Default::default()
            })
            .unwrap();
        (h, ticker, exchange)
    }

    #[tokio::test]
    async fn test_keeps_session_moments_with_traded_volume() {
        let provider = Arc::new(FakeProvider::new(MARKETSTACK, |_, params| {
            Ok(intraday_body(
                param(params, "symbols"),
                &[
                    // Newest first, as the provider sends them
                    ("2024-03-04T21:30:00+0000", 185.0, 9000.0),
                    ("2024-03-04T14:40:00+0000", 181.0, 2500.0),
                    ("2024-03-04T14:35:00+0000", 180.5, 1000.0),
                    ("2024-03-04T14:30:00+0000", 180.0, 400.0),
                    ("2024-03-04T13:00:00+0000", 179.0, 100.0),
                ],
            ))
        }));
        let (h, ticker, exchange) = setup(provider.clone());

        let written = IntradayService::load_intradays(&h.state, &ticker, &exchange, monday())
            .await
            .unwrap();
        assert_eq!(written, 3);

        let moments = h.state.sqlite.get_intradays(ticker.id, monday()).unwrap();
        let prices: Vec<f64> = moments.iter().map(|m| m.last_price).collect();
        let volumes: Vec<f64> = moments.iter().map(|m| m.volume).collect();
        assert_eq!(prices, vec![180.0, 180.5, 181.0]);
        assert_eq!(volumes, vec![400.0, 600.0, 1500.0]);

        let params = provider.last_params("intraday").unwrap();
        assert!(params.contains(&("date_from".to_string(), "2024-03-04".to_string())));
        assert!(params.contains(&("interval".to_string(), "5min".to_string())));
    }

    #[tokio::test]
    async fn test_stored_day_is_not_fetched_again() {
        let provider = Arc::new(FakeProvider::new(MARKETSTACK, |_, params| {
            Ok(full_session(param(params, "symbols")))
        }));
        let (h, ticker, exchange) = setup(provider.clone());

        assert!(IntradayService::update_intradays(&h.state, &ticker, &exchange, monday())
            .await
            .unwrap());
        assert!(!IntradayService::update_intradays(&h.state, &ticker, &exchange, monday())
            .await
            .unwrap());
        assert_eq!(provider.calls_to("intraday"), 1);
        assert_eq!(h.state.sqlite.count_intradays(ticker.id, monday()).unwrap(), 79);
    }

    #[tokio::test]
    async fn test_weekends_and_future_days_are_not_needed() {
        let provider = Arc::new(FakeProvider::failing(MARKETSTACK, 500));
        let (h, ticker, _) = setup(provider);

        let saturday = NaiveDate::from_ymd_opt(2024, 3, 2).unwrap();
        let wednesday = NaiveDate::from_ymd_opt(2024, 3, 6).unwrap();
        assert!(!IntradayService::intradays_needed(&h.state, &ticker, saturday).unwrap());
        assert!(!IntradayService::intradays_needed(&h.state, &ticker, wednesday).unwrap());
        assert!(IntradayService::intradays_needed(&h.state, &ticker, monday()).unwrap());
    }

    #[tokio::test]
    async fn test_upstream_failure_is_returned() {
        let provider = Arc::new(FakeProvider::failing(MARKETSTACK, 429));
        let (h, ticker, exchange) = setup(provider);

        let err = IntradayService::update_intradays(&h.state, &ticker, &exchange, monday())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Upstream { status: 429, .. }));
        assert_eq!(h.state.sqlite.count_intradays(ticker.id, monday()).unwrap(), 0);
    }
}
