//! News Service
//!
//! Articles come from the Yahoo Finance auto-complete endpoint, which
//! returns matching symbols and the latest stories for a query.

use crate::db::sqlite::models::{Article, Ticker, STATUS_FAILED, STATUS_SUCCESS};
use crate::error::{AppError, Result};
use crate::providers::types::{from_epoch, YhAutoCompleteResponse, YhNewsItem};
use crate::providers::YHFINANCE;
use crate::services::refresh_service::{MARKET_NEWS_ACTIVITY, MARKET_NEWS_KEY};
use crate::state::AppState;
use tracing::{info, warn};

pub struct NewsService;

impl NewsService {
    /// Store the latest stories about `ticker`; returns how many were seen
    pub async fn load_ticker_news(state: &AppState, ticker: &Ticker) -> Result<usize> {
        let response = Self::auto_complete(state, &ticker.ticker_symbol).await?;
        let stored = Self::store_articles(state, &response.news, &[ticker.id])?;
        info!("Stored {} articles for {}", stored, ticker.ticker_symbol);
        Ok(stored)
    }

    /// Store market news for `query`, linking each story to every known
    /// ticker the search matched. The outcome is written to the ledger.
    pub async fn load_market_news(state: &AppState, query: &str) -> Result<usize> {
        let query = query.trim();
        if query.is_empty() {
            return Err(AppError::Validation("News query is empty".to_string()));
        }

        let result = Self::fetch_market_news(state, query).await;
        let status = if result.is_ok() { STATUS_SUCCESS } else { STATUS_FAILED };
        if let Err(e) = state.sqlite.record_lastdone(
            MARKET_NEWS_ACTIVITY,
            MARKET_NEWS_KEY,
            status,
            state.clock.now(),
        ) {
            warn!("Failed to record market news run: {}", e);
        }
        result
    }

    async fn fetch_market_news(state: &AppState, query: &str) -> Result<usize> {
        let response = Self::auto_complete(state, query).await?;

        let mut ticker_ids = Vec::new();
        for quote in &response.quotes {
            if let Some(ticker) = state.sqlite.get_ticker_by_symbol(&quote.symbol)? {
                ticker_ids.push(ticker.id);
            }
        }

        let stored = Self::store_articles(state, &response.news, &ticker_ids)?;
        info!("Stored {} market articles for {:?}", stored, query);
        Ok(stored)
    }

    /// Raw auto-complete results for `query`
    pub(crate) async fn auto_complete(state: &AppState, query: &str) -> Result<YhAutoCompleteResponse> {
        let provider = state.providers.require(YHFINANCE)?;
        let raw = provider.fetch("autocomplete", &[("q", query)]).await?;
        Ok(serde_json::from_str(&raw)?)
    }

    fn store_articles(state: &AppState, items: &[YhNewsItem], ticker_ids: &[i64]) -> Result<usize> {
        let mut stored = 0;
        for item in items {
            if item.uuid.trim().is_empty() || item.link.trim().is_empty() {
                continue;
            }
            state.sqlite.save_article(
                &Article {
                    id: 0,
                    source: YHFINANCE.to_string(),
                    external_id: item.uuid.clone(),
                    published_datetime: from_epoch(item.provider_publish_time),
                    publisher: item.publisher.clone(),
                    title: item.title.clone(),
                    url: item.link.clone(),
                    article_type: item.news_type.clone(),
                },
                ticker_ids,
            )?;
            stored += 1;
        }
        Ok(stored)
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    /// Auto-complete payload matching `symbol` with two stories
    pub fn autocomplete_body(symbol: &str) -> String {
        serde_json::json!({
            "quotes": [{"symbol": symbol, "exchange": "NMS", "shortname": symbol, "score": 1.0}],
            "news": [
                {"uuid": format!("{}-1", symbol), "title": "Earnings beat", "publisher": "Wire",
                 "link": "https://news.example.test/1", "providerPublishTime": 1709550000, "type": "STORY"},
                {"uuid": format!("{}-2", symbol), "title": "New product", "publisher": "Wire",
                 "link": "https://news.example.test/2", "providerPublishTime": 1709560000, "type": "STORY"},
                {"uuid": "", "title": "No id", "link": "https://news.example.test/3"}
            ]
        })
        .to_string()
    }
}
