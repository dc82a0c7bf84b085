//! Movers Service
//!
//! Daily gainers, losers and most active tickers from the Morningstar
//! provider.

use crate::db::sqlite::models::{Mover, MoverType, STATUS_FAILED, STATUS_SUCCESS};
use crate::error::Result;
use crate::providers::types::{MsMover, MsMoversResponse};
use crate::providers::MSFINANCE;
use crate::services::ticker_service::TickerService;
use crate::state::AppState;
use crate::util::{sort_by_key, SortOrder};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

pub const MOVERS_ACTIVITY: &str = "movers";
pub const MOVERS_KEY: &str = "stockwatch";

/// One mover with its ticker identity resolved
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoverRow {
    pub ticker_symbol: String,
    pub exchange_acronym: String,
    pub ticker_name: String,
    pub last_price: f64,
    pub price_change: f64,
    pub price_change_pct: f64,
    pub volume: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MoversView {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    pub gainers: Vec<MoverRow>,
    pub losers: Vec<MoverRow>,
    pub actives: Vec<MoverRow>,
}

/// Movers service for business logic
pub struct MoversService;

impl MoversService {
    /// Pull today's movers and store them; returns how many rows were stored.
    ///
    /// Tickers that cannot be resolved are skipped. The outcome is written to
    /// the last-run ledger.
    pub async fn load_movers(state: &AppState) -> Result<usize> {
        let result = Self::fetch_and_store(state).await;

        let status = if result.is_ok() { STATUS_SUCCESS } else { STATUS_FAILED };
        if let Err(e) = state
            .sqlite
            .record_lastdone(MOVERS_ACTIVITY, MOVERS_KEY, status, state.clock.now())
        {
            warn!("Failed to record movers run: {}", e);
        }
        result
    }

    async fn fetch_and_store(state: &AppState) -> Result<usize> {
        info!("MoversService::load_movers");
        let provider = state.providers.require(MSFINANCE)?;
        let raw = provider.fetch("movers", &[]).await?;
        let response: MsMoversResponse = serde_json::from_str(&raw)?;

        let today = state.market.local_date(state.clock.now());
        let lists: [(MoverType, &Vec<MsMover>); 3] = [
            (MoverType::Gainer, &response.gainers),
            (MoverType::Loser, &response.losers),
            (MoverType::Active, &response.actives),
        ];

        let mut stored = 0;
        for (mover_type, movers) in lists {
            for mover in movers {
                if mover.ticker.trim().is_empty() {
                    continue;
                }
                let ticker = match TickerService::get_fresh_ticker(state, &mover.ticker, false).await {
                    Ok(ticker) => ticker,
                    Err(e) => {
                        warn!("Skipping mover {}: {}", mover.ticker, e);
                        continue;
                    }
                };

                state.sqlite.create_mover_if_new(&Mover {
                    id: 0,
                    source: MSFINANCE.to_string(),
                    ticker_id: ticker.id,
                    mover_date: today,
                    mover_type,
                    last_price: mover.last_price,
                    price_change: mover.net_change,
                    price_change_pct: mover.percent_net_change,
                    volume: mover.volume,
                })?;
                stored += 1;
            }
        }

        info!("Stored {} movers for {}", stored, today);
        Ok(stored)
    }

    /// Movers of the most recent day on record, sorted for display
    pub fn get_movers(state: &AppState) -> Result<MoversView> {
        let Some(date) = state.sqlite.get_latest_movers_date()? else {
            return Ok(MoversView::default());
        };

        let mut view = MoversView {
            date: Some(date),
            ..Default::default()
        };

        for mover in state.sqlite.get_movers_by_date(date)? {
            let ticker = state.sqlite.get_ticker_by_id(mover.ticker_id)?;
            let exchange = state.sqlite.get_exchange_by_id(ticker.exchange_id)?;
            let row = MoverRow {
                ticker_symbol: ticker.ticker_symbol,
                exchange_acronym: exchange.exchange_acronym,
                ticker_name: ticker.ticker_name,
                last_price: mover.last_price,
                price_change: mover.price_change,
                price_change_pct: mover.price_change_pct,
                volume: mover.volume,
            };
            match mover.mover_type {
                MoverType::Gainer => view.gainers.push(row),
                MoverType::Loser => view.losers.push(row),
                MoverType::Active => view.actives.push(row),
            }
        }

        sort_by_key(&mut view.gainers, SortOrder::Descending, |m| m.price_change_pct);
        sort_by_key(&mut view.losers, SortOrder::Ascending, |m| m.price_change_pct);
        sort_by_key(&mut view.actives, SortOrder::Descending, |m| m.volume as f64);
        Ok(view)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::testing::{param, FakeProvider};
    use crate::providers::YHFINANCE;
    use crate::services::ticker_service::fixtures::summary_body;
    use crate::state::testing::harness;
    use chrono::{TimeZone, Utc};
    use std::sync::Arc;

    fn movers_body() -> String {
        serde_json::json!({
            "gainers": [
                {"ticker": "AAA", "lastPrice": 10.0, "netChange": 1.0, "percentNetChange": 10.0, "volume": 500},
                {"ticker": "BBB", "lastPrice": 20.0, "netChange": 5.0, "percentNetChange": 25.0, "volume": 100}
            ],
            "losers": [
                {"ticker": "CCC", "lastPrice": 30.0, "netChange": -1.0, "percentNetChange": -3.0, "volume": 300},
                {"ticker": "DDD", "lastPrice": 40.0, "netChange": -8.0, "percentNetChange": -16.0, "volume": 200}
            ],
            "actives": [
                {"ticker": "AAA", "lastPrice": 10.0, "netChange": 1.0, "percentNetChange": 10.0, "volume": 500},
                {"ticker": "EEE", "lastPrice": 50.0, "netChange": 0.0, "percentNetChange": 0.0, "volume": 9000},
                {"ticker": "BAD", "lastPrice": 1.0, "netChange": 0.0, "percentNetChange": 0.0, "volume": 1}
            ]
        })
        .to_string()
    }

    fn providers() -> (Arc<FakeProvider>, Arc<FakeProvider>) {
        let yahoo = Arc::new(FakeProvider::new(YHFINANCE, |_, params| {
            match param(params, "symbol") {
                "BAD" => Ok("{}".to_string()),
                symbol => Ok(summary_body(symbol)),
            }
        }));
        let morningstar = Arc::new(FakeProvider::new(MSFINANCE, |_, _| Ok(movers_body())));
        (yahoo, morningstar)
    }

    fn now() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 4, 21, 30, 0).unwrap()
    }

    #[tokio::test]
    async fn test_load_and_sort_movers() {
        let (yahoo, morningstar) = providers();
        let h = harness(now(), vec![yahoo, morningstar]);

        let stored = MoversService::load_movers(&h.state).await.unwrap();
        assert_eq!(stored, 6);

        let view = MoversService::get_movers(&h.state).unwrap();
        assert_eq!(view.date.unwrap().to_string(), "2024-03-04");

        let gainers: Vec<_> = view.gainers.iter().map(|m| m.ticker_symbol.as_str()).collect();
        let losers: Vec<_> = view.losers.iter().map(|m| m.ticker_symbol.as_str()).collect();
        let actives: Vec<_> = view.actives.iter().map(|m| m.ticker_symbol.as_str()).collect();
        assert_eq!(gainers, vec!["BBB", "AAA"]);
        assert_eq!(losers, vec!["DDD", "CCC"]);
        assert_eq!(actives, vec!["EEE", "AAA"]);
        assert_eq!(view.gainers[0].exchange_acronym, "NASDAQ");

        let ledger = h.state.sqlite.get_lastdone(MOVERS_ACTIVITY, MOVERS_KEY).unwrap().unwrap();
        assert!(ledger.succeeded());
    }

    #[tokio::test]
    async fn test_reload_same_day_is_idempotent() {
        let (yahoo, morningstar) = providers();
        let h = harness(now(), vec![yahoo, morningstar]);

        MoversService::load_movers(&h.state).await.unwrap();
        MoversService::load_movers(&h.state).await.unwrap();

        let view = MoversService::get_movers(&h.state).unwrap();
        assert_eq!(view.gainers.len() + view.losers.len() + view.actives.len(), 6);
    }

    #[tokio::test]
    async fn test_failed_load_records_failure() {
        let (yahoo, _) = providers();
        let h = harness(now(), vec![yahoo, Arc::new(FakeProvider::failing(MSFINANCE, 502))]);

        assert!(MoversService::load_movers(&h.state).await.is_err());
        let ledger = h.state.sqlite.get_lastdone(MOVERS_ACTIVITY, MOVERS_KEY).unwrap().unwrap();
        assert!(!ledger.succeeded());
    }

    #[test]
    fn test_no_movers_is_empty_view() {
        let h = harness(now(), vec![]);
        assert_eq!(MoversService::get_movers(&h.state).unwrap(), MoversView::default());
    }
}
