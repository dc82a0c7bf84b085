//! Search Service
//!
//! Ticker lookup by symbol or company name over the Yahoo Finance
//! auto-complete endpoint.

use crate::error::{AppError, Result};
use crate::services::news_service::NewsService;
use crate::state::AppState;
use crate::util::{normalize_symbol, sort_by_key, SortOrder};
use serde::Serialize;
use tracing::{info, warn};

#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub ticker_symbol: String,
    pub exchange_code: String,
    /// Stored acronym for the exchange code, or the code itself when unknown
    pub exchange_acronym: String,
    pub name: String,
    pub quote_type: String,
    pub score: f64,
}

pub struct SearchService;

impl SearchService {
    /// Matching tickers, best match first
    pub async fn search_tickers(state: &AppState, query: &str) -> Result<Vec<SearchResult>> {
        let query = query.trim();
        if query.is_empty() {
            return Err(AppError::Validation("Search query is empty".to_string()));
        }

        let response = NewsService::auto_complete(state, query).await?;
        let mut results: Vec<SearchResult> = response
            .quotes
            .into_iter()
            .filter(|q| !q.symbol.trim().is_empty())
            .map(|q| {
                let exchange_acronym = match state.sqlite.get_exchange_by_code(&q.exchange) {
                    Ok(Some(exchange)) => exchange.exchange_acronym,
                    Ok(None) => q.exchange.clone(),
                    Err(e) => {
                        warn!("Failed to look up exchange {}: {}", q.exchange, e);
                        q.exchange.clone()
                    }
                };
                SearchResult {
                    ticker_symbol: normalize_symbol(&q.symbol),
                    name: q.long_name.or(q.short_name).unwrap_or_default(),
                    quote_type: q.quote_type.unwrap_or_default(),
                    exchange_code: q.exchange,
                    exchange_acronym,
                    score: q.score,
                }
            })
            .collect();
        sort_by_key(&mut results, SortOrder::Descending, |r| r.score);

        info!("Ticker search for {:?} matched {}", query, results.len());
        Ok(results)
    }
}
