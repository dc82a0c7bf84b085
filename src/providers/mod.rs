//! Upstream market-data providers

pub mod marketstack;
pub mod rapidapi;
pub mod rate_limiter;
pub mod types;

use crate::config::AppConfig;
use crate::error::{AppError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

pub use marketstack::MarketstackClient;
pub use rapidapi::RapidApiClient;

/// Yahoo Finance through RapidAPI
pub const YHFINANCE: &str = "yhfinance";
/// Morningstar through RapidAPI
pub const MSFINANCE: &str = "msfinance";
/// Marketstack, for intraday prices
pub const MARKETSTACK: &str = "marketstack";

/// A third-party JSON API
#[async_trait]
pub trait Provider: Send + Sync {
    /// Provider ID (e.g., "yhfinance")
    fn id(&self) -> &'static str;

    /// Display name
    fn name(&self) -> &'static str;

    /// Call a named endpoint and return the raw response body.
    ///
    /// Fails on transport errors, non-2xx statuses and unknown endpoints.
    async fn fetch(&self, endpoint: &str, params: &[(&str, &str)]) -> Result<String>;
}

/// Registry of configured providers, keyed by ID
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn Provider>>,
}

impl ProviderRegistry {
    /// Empty registry; tests register fakes into it
    pub fn empty() -> Self {
        Self {
            providers: HashMap::new(),
        }
    }

    /// Registry with both RapidAPI providers built from config, plus
    /// Marketstack when an access key is configured
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let mut registry = Self::empty();
        registry.register(Arc::new(RapidApiClient::yhfinance(config)?));
        registry.register(Arc::new(RapidApiClient::msfinance(config)?));
        if config.marketstack_api_key.as_deref().is_some_and(|k| !k.is_empty()) {
            registry.register(Arc::new(MarketstackClient::new(config)?));
        } else {
            tracing::warn!("No Marketstack access key configured, intraday prices are disabled");
        }
        Ok(registry)
    }

    pub fn register(&mut self, provider: Arc<dyn Provider>) {
        self.providers.insert(provider.id().to_string(), provider);
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn Provider>> {
        self.providers.get(id).cloned()
    }

    /// Provider by ID, or a configuration error
    pub fn require(&self, id: &str) -> Result<Arc<dyn Provider>> {
        self.get(id)
            .ok_or_else(|| AppError::Config(format!("Provider '{}' not configured", id)))
    }

    pub fn list(&self) -> Vec<(&'static str, &'static str)> {
        self.providers.values().map(|p| (p.id(), p.name())).collect()
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::empty()
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_marketstack_needs_an_access_key() {
        let registry = ProviderRegistry::from_config(&AppConfig::for_testing()).unwrap();
        assert!(registry.get(YHFINANCE).is_some());
        assert!(registry.get(MSFINANCE).is_some());
        assert!(registry.get(MARKETSTACK).is_some());

        let config = AppConfig {
            marketstack_api_key: Some(String::new()),
            ..AppConfig::for_testing()
        };
        let registry = ProviderRegistry::from_config(&config).unwrap();
        assert!(registry.get(MARKETSTACK).is_none());
        assert!(matches!(registry.require(MARKETSTACK), Err(AppError::Config(_))));
    }
}
