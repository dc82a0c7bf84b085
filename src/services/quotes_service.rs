//! Quotes Service
//!
//! Live quotes from the Yahoo Finance provider, served from a short-lived
//! cache so bursts of page loads for one symbol cost a single upstream call.

use crate::cache::quote_key;
use crate::db::sqlite::models::Ticker;
use crate::error::{AppError, Result};
use crate::providers::types::{Quote, YhQuote, YhQuoteResponse};
use crate::providers::YHFINANCE;
use crate::state::AppState;
use crate::util::normalize_symbol;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, warn};

const QUOTE_ENDPOINT: &str = "quote";

/// Quotes service for business logic
pub struct QuotesService;

impl QuotesService {
    /// Live quote for one symbol.
    ///
    /// `Ok(None)` when the provider answered without any entry for it. A
    /// body that does not decode is an error and is not cached. Callers
    /// queued behind a failed fetch get that failure without a second
    /// upstream call.
    pub async fn get_quote(state: &AppState, symbol: &str) -> Result<Option<Quote>> {
        let symbol = normalize_symbol(symbol);
        let key = quote_key(&symbol);

        if let Some(raw) = Self::cached(state, &key).await {
            debug!("Quote cache hit for {}", symbol);
            return Self::decode_first(&raw);
        }

        let mut flight = state.single_flight.acquire(&key).await;

        // Another caller may have filled the entry while we waited
        if let Some(raw) = Self::cached(state, &key).await {
            debug!("Quote cache filled while waiting for {}", symbol);
            return Self::decode_first(&raw);
        }
        if let Some(failure) = flight.shared_failure() {
            debug!("Quote fetch for {} already failed: {}", symbol, failure);
            return Err(AppError::Unavailable {
                provider: YHFINANCE.to_string(),
                message: failure.to_string(),
            });
        }

        info!("QuotesService::get_quote - fetching {}", symbol);
        match Self::fetch_one(state, &symbol).await {
            Ok((quote, raw)) => {
                Self::store(state, &key, &raw).await;
                Ok(quote)
            }
            Err(e) => {
                warn!("Quote fetch failed for {}: {}", symbol, e);
                flight.record_failure(e.to_string());
                Err(e)
            }
        }
    }

    async fn fetch_one(state: &AppState, symbol: &str) -> Result<(Option<Quote>, String)> {
        let provider = state.providers.require(YHFINANCE)?;
        let raw = provider.fetch(QUOTE_ENDPOINT, &[("symbols", symbol)]).await?;
        let quote = Self::decode_first(&raw)?;
        Ok((quote, raw))
    }

    /// Live quotes for several symbols with at most one upstream call.
    ///
    /// Cached symbols are served from the cache; the misses are fetched
    /// together and each result is cached under its own key. Symbols the
    /// provider did not return are cached as empty and are absent from the
    /// map.
    pub async fn get_quotes(state: &AppState, symbols: &[String]) -> Result<HashMap<String, Quote>> {
        let mut quotes = HashMap::new();
        let mut seen: HashSet<String> = HashSet::new();
        let mut misses: Vec<String> = Vec::new();

        for symbol in symbols.iter().map(|s| normalize_symbol(s)) {
            if symbol.is_empty() || !seen.insert(symbol.clone()) {
                continue;
            }

            let Some(raw) = Self::cached(state, &quote_key(&symbol)).await else {
                misses.push(symbol);
                continue;
            };
            match Self::decode_first(&raw) {
                Ok(Some(quote)) => {
                    quotes.insert(symbol, quote);
                }
                Ok(None) => debug!("Cached empty quote for {}", symbol),
                Err(e) => {
                    warn!("Unreadable cached quote for {}: {}", symbol, e);
                    misses.push(symbol);
                }
            }
        }

        if misses.is_empty() {
            debug!("QuotesService::get_quotes - all {} symbols cached", seen.len());
            return Ok(quotes);
        }

        let joined = misses.join(",");
        info!("QuotesService::get_quotes - fetching {}", joined);
        let provider = state.providers.require(YHFINANCE)?;
        let raw = provider
            .fetch(QUOTE_ENDPOINT, &[("symbols", joined.as_str())])
            .await
            .map_err(|e| {
                warn!("Batched quote fetch failed for {}: {}", joined, e);
                e
            })?;
        let response: YhQuoteResponse = serde_json::from_str(&raw)?;

        let mut returned: HashMap<String, YhQuote> = HashMap::new();
        for item in response.quote_response.result {
            let symbol = normalize_symbol(&item.symbol);
            if !symbol.is_empty() {
                returned.entry(symbol).or_insert(item);
            }
        }

        for symbol in misses {
            let item = returned.remove(&symbol);
            if let Some(yh) = &item {
                quotes.insert(symbol.clone(), Quote::from(yh));
            }
            match serde_json::to_string(&YhQuoteResponse::single(item)) {
                Ok(single) => Self::store(state, &quote_key(&symbol), &single).await,
                Err(e) => warn!("Failed to encode quote for {}: {}", symbol, e),
            }
        }

        Ok(quotes)
    }

    /// Record a live quote on the ticker row
    pub fn update_ticker_with_live_quote(state: &AppState, ticker: &Ticker, quote: &Quote) -> Result<()> {
        let as_of = quote.as_of.or_else(|| Some(state.clock.now()));
        state.sqlite.update_ticker_live_quote(
            ticker.id,
            quote.price,
            quote.prev_close,
            quote.volume,
            as_of,
        )
    }

    fn decode_first(raw: &str) -> Result<Option<Quote>> {
        let response: YhQuoteResponse = serde_json::from_str(raw)?;
        Ok(response.quote_response.result.first().map(Quote::from))
    }

    /// Cached payload; read failures count as a miss
    async fn cached(state: &AppState, key: &str) -> Option<String> {
        if state.config.skip_cache_checks {
            return None;
        }
        match state.cache.get(key).await {
            Ok(hit) => hit,
            Err(e) => {
                warn!("Cache read failed for {}: {}", key, e);
                None
            }
        }
    }

    async fn store(state: &AppState, key: &str, raw: &str) {
        if let Err(e) = state.cache.set(key, raw, state.config.quote_ttl()).await {
            warn!("Cache write failed for {}: {}", key, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::testing::{param, quote_body, FakeProvider};
    use crate::state::testing::harness;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn now() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 4, 15, 0, 0).unwrap()
    }

    fn quoting_provider() -> Arc<FakeProvider> {
        Arc::new(FakeProvider::new(YHFINANCE, |_, params| {
            Ok(quote_body(param(params, "symbols"), 190.0))
        }))
    }

    #[tokio::test]
    async fn test_second_call_within_ttl_is_cache_hit() {
        let provider = quoting_provider();
        let h = harness(now(), vec![provider.clone()]);

        let first = QuotesService::get_quote(&h.state, "aapl").await.unwrap().unwrap();
        h.clock.advance(chrono::Duration::seconds(19));
        let second = QuotesService::get_quote(&h.state, "AAPL").await.unwrap().unwrap();

        assert_eq!(provider.calls_to("quote"), 1);
        assert_eq!(first, second);
        assert_eq!(second.symbol, "AAPL");
    }

    #[tokio::test]
    async fn test_call_after_ttl_refetches() {
        let provider = quoting_provider();
        let h = harness(now(), vec![provider.clone()]);

        QuotesService::get_quote(&h.state, "AAPL").await.unwrap();
        h.clock.advance(chrono::Duration::seconds(21));
        QuotesService::get_quote(&h.state, "AAPL").await.unwrap();

        assert_eq!(provider.calls_to("quote"), 2);
    }

    #[tokio::test]
    async fn test_upstream_500_is_failure() {
        let h = harness(now(), vec![Arc::new(FakeProvider::failing(YHFINANCE, 500))]);
        let err = QuotesService::get_quote(&h.state, "AAPL").await.unwrap_err();
        assert!(err.is_upstream());
    }

    #[tokio::test]
    async fn test_empty_envelope_is_none() {
        let provider = Arc::new(FakeProvider::new(YHFINANCE, |_, _| {
            Ok(r#"{"quoteResponse":{"result":[],"error":null}}"#.to_string())
        }));
        let h = harness(now(), vec![provider]);
        assert!(QuotesService::get_quote(&h.state, "ZZZZ").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_malformed_body_is_surfaced() {
        let provider = Arc::new(FakeProvider::new(YHFINANCE, |_, _| Ok("<html>".to_string())));
        let h = harness(now(), vec![provider.clone()]);

        let err = QuotesService::get_quote(&h.state, "AAPL").await.unwrap_err();
        assert!(matches!(err, AppError::Serialization(_)));

        // Nothing was cached, so the next call goes upstream again
        let _ = QuotesService::get_quote(&h.state, "AAPL").await;
        assert_eq!(provider.calls_to("quote"), 2);
    }

    #[tokio::test]
    async fn test_body_without_envelope_is_not_cached() {
        let provider = Arc::new(FakeProvider::new(YHFINANCE, |_, _| {
            Ok(r#"{"message":"unexpected shape"}"#.to_string())
        }));
        let h = harness(now(), vec![provider.clone()]);

        for _ in 0..2 {
            let err = QuotesService::get_quote(&h.state, "AAPL").await.unwrap_err();
            assert!(matches!(err, AppError::Serialization(_)));
        }
        assert_eq!(provider.calls_to("quote"), 2);
    }

    #[tokio::test]
    async fn test_item_without_price_is_failure_not_zero() {
        let provider = Arc::new(FakeProvider::new(YHFINANCE, |_, _| {
            Ok(r#"{"quoteResponse":{"result":[{"symbol":"AAPL"}]}}"#.to_string())
        }));
        let h = harness(now(), vec![provider]);

        let err = QuotesService::get_quote(&h.state, "AAPL").await.unwrap_err();
        assert!(matches!(err, AppError::Serialization(_)));

        let symbols = vec!["AAPL".to_string()];
        let err = QuotesService::get_quotes(&h.state, &symbols).await.unwrap_err();
        assert!(matches!(err, AppError::Serialization(_)));
    }

    #[tokio::test]
    async fn test_bypass_flag_skips_cache() {
        let provider = quoting_provider();
        let h = harness(now(), vec![provider.clone()]);
        let mut config = h.state.config.clone();
        config.skip_cache_checks = true;
        let state = AppState::with_parts(
            config,
            h.state.clock.clone(),
            h.state.sqlite.clone(),
            h.state.providers.clone(),
            h.state.queue.clone(),
        )
        .unwrap();

        QuotesService::get_quote(&state, "AAPL").await.unwrap();
        QuotesService::get_quote(&state, "AAPL").await.unwrap();
        assert_eq!(provider.calls_to("quote"), 2);
    }

    /// Provider that yields before answering so callers overlap
    struct SlowProvider {
        calls: AtomicUsize,
        status: Option<u16>,
    }

    impl SlowProvider {
        fn state(self: &Arc<Self>) -> AppState {
            let mut registry = crate::providers::ProviderRegistry::empty();
            registry.register(self.clone());

            let h = harness(now(), vec![]);
            AppState::with_parts(
                h.state.config.clone(),
                h.state.clock.clone(),
                h.state.sqlite.clone(),
                Arc::new(registry),
                h.state.queue.clone(),
            )
            .unwrap()
        }
    }

    #[async_trait]
    impl crate::providers::Provider for SlowProvider {
        fn id(&self) -> &'static str {
            YHFINANCE
        }

        fn name(&self) -> &'static str {
            "Slow"
        }

        async fn fetch(&self, _endpoint: &str, params: &[(&str, &str)]) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            match self.status {
                Some(status) => Err(AppError::Upstream {
                    provider: YHFINANCE.to_string(),
                    status,
                }),
                None => Ok(quote_body(param(params, "symbols"), 50.0)),
            }
        }
    }

    #[tokio::test]
    async fn test_concurrent_misses_collapse_to_one_fetch() {
        let slow = Arc::new(SlowProvider {
            calls: AtomicUsize::new(0),
            status: None,
        });
        let state = slow.state();

        let results = futures_util::future::join_all(
            (0..5).map(|_| QuotesService::get_quote(&state, "MSFT")),
        )
        .await;

        assert!(results.iter().all(|r| matches!(r, Ok(Some(_)))));
        assert_eq!(slow.calls.load(Ordering::SeqCst), 1);
        assert_eq!(state.single_flight.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_misses_share_one_failure() {
        let slow = Arc::new(SlowProvider {
            calls: AtomicUsize::new(0),
            status: Some(503),
        });
        let state = slow.state();

        let results = futures_util::future::join_all(
            (0..5).map(|_| QuotesService::get_quote(&state, "MSFT")),
        )
        .await;

        assert!(results.iter().all(|r| r.as_ref().is_err_and(|e| e.is_upstream())));
        assert_eq!(slow.calls.load(Ordering::SeqCst), 1);
        assert_eq!(state.single_flight.in_flight(), 0);

        // Once the burst is over the next caller tries again
        assert!(QuotesService::get_quote(&state, "MSFT").await.is_err());
        assert_eq!(slow.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_batched_quotes_fetch_only_misses() {
        let provider = quoting_provider();
        let h = harness(now(), vec![provider.clone()]);

        QuotesService::get_quote(&h.state, "AAPL").await.unwrap();

        let symbols = vec!["AAPL".to_string(), "msft".to_string(), "NVDA".to_string(), "MSFT".to_string()];
        let quotes = QuotesService::get_quotes(&h.state, &symbols).await.unwrap();

        assert_eq!(quotes.len(), 3);
        assert_eq!(provider.calls_to("quote"), 2);
        let params = provider.last_params("quote").unwrap();
        assert_eq!(params[0].1, "MSFT,NVDA");

        // Each batched symbol was cached individually
        QuotesService::get_quote(&h.state, "NVDA").await.unwrap();
        assert_eq!(provider.calls_to("quote"), 2);
    }

    #[tokio::test]
    async fn test_batched_quotes_all_cached_skip_upstream() {
        let provider = quoting_provider();
        let h = harness(now(), vec![provider.clone()]);

        let symbols = vec!["AAPL".to_string(), "MSFT".to_string()];
        QuotesService::get_quotes(&h.state, &symbols).await.unwrap();
        QuotesService::get_quotes(&h.state, &symbols).await.unwrap();
        assert_eq!(provider.calls_to("quote"), 1);
    }

    #[tokio::test]
    async fn test_batched_quotes_honor_cached_empty_result() {
        // Symbols starting with ZZ are unknown upstream
        let provider = Arc::new(FakeProvider::new(YHFINANCE, |_, params| {
            let known: Vec<&str> = param(params, "symbols")
                .split(',')
                .filter(|s| !s.starts_with("ZZ"))
                .collect();
            Ok(quote_body(&known.join(","), 10.0))
        }));
        let h = harness(now(), vec![provider.clone()]);

        assert!(QuotesService::get_quote(&h.state, "ZZZZ").await.unwrap().is_none());

        let symbols = vec!["ZZZZ".to_string()];
        assert!(QuotesService::get_quotes(&h.state, &symbols).await.unwrap().is_empty());
        assert_eq!(provider.calls_to("quote"), 1);

        // A symbol missing from a batched answer is cached as empty too
        let symbols = vec!["AAPL".to_string(), "ZZYY".to_string(), "ZZZZ".to_string()];
        let quotes = QuotesService::get_quotes(&h.state, &symbols).await.unwrap();
        assert_eq!(quotes.len(), 1);
        assert_eq!(provider.last_params("quote").unwrap()[0].1, "AAPL,ZZYY");

        let quotes = QuotesService::get_quotes(&h.state, &symbols).await.unwrap();
        assert_eq!(quotes.len(), 1);
        assert!(QuotesService::get_quote(&h.state, "ZZYY").await.unwrap().is_none());
        assert_eq!(provider.calls_to("quote"), 2);
    }

    #[tokio::test]
    async fn test_live_quote_updates_ticker() {
        let provider = quoting_provider();
        let h = harness(now(), vec![provider]);
        let exchange = h.state.sqlite.get_or_create_exchange("NMS").unwrap();
        let ticker = h
            .state
            .sqlite
            .create_or_update_ticker(&crate::db::sqlite::models::TickerUpsert {
                ticker_symbol: "AAPL".to_string(),
                exchange_id: exchange.id,
                ..Default::default()
            })
            .unwrap();

        let quote = QuotesService::get_quote(&h.state, "AAPL").await.unwrap().unwrap();
        QuotesService::update_ticker_with_live_quote(&h.state, &ticker, &quote).unwrap();

        let stored = h.state.sqlite.get_ticker_by_id(ticker.id).unwrap();
        assert_eq!(stored.market_price, 190.0);
        assert_eq!(stored.market_prev_close, 189.0);
        assert_eq!(stored.market_volume, 1000);
        assert!(stored.market_price_datetime.is_some());
    }
}
