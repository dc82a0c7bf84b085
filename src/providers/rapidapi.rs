//! RapidAPI-hosted market data client
//!
//! Both upstreams sit behind RapidAPI and share the same auth headers; they
//! differ only in host and endpoint table.

use crate::config::AppConfig;
use crate::error::{AppError, Result};
use crate::providers::rate_limiter::TokenBucket;
use crate::providers::{Provider, MSFINANCE, YHFINANCE};
use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::Client;
use tracing::{debug, warn};

const YHFINANCE_ENDPOINTS: &[(&str, &str)] = &[
    ("quote", "/market/v2/get-quotes"),
    ("summary", "/stock/v2/get-summary"),
    ("historical", "/stock/v3/get-historical-data"),
    ("autocomplete", "/auto-complete"),
];

const MSFINANCE_ENDPOINTS: &[(&str, &str)] = &[("movers", "/market/v2/get-movers")];

pub struct RapidApiClient {
    id: &'static str,
    name: &'static str,
    client: Client,
    base_url: String,
    headers: HeaderMap,
    endpoints: &'static [(&'static str, &'static str)],
    limiter: Mutex<TokenBucket>,
}

impl RapidApiClient {
    pub fn yhfinance(config: &AppConfig) -> Result<Self> {
        Self::new(
            YHFINANCE,
            "Yahoo Finance",
            required(&config.yhfinance_api_key, "yhfinance_api_key")?,
            required(&config.yhfinance_api_host, "yhfinance_api_host")?,
            YHFINANCE_ENDPOINTS,
            config,
        )
    }

    pub fn msfinance(config: &AppConfig) -> Result<Self> {
        Self::new(
            MSFINANCE,
            "Morningstar",
            required(&config.msfinance_api_key, "msfinance_api_key")?,
            required(&config.msfinance_api_host, "msfinance_api_host")?,
            MSFINANCE_ENDPOINTS,
            config,
        )
    }

    fn new(
        id: &'static str,
        name: &'static str,
        api_key: &str,
        api_host: &str,
        endpoints: &'static [(&'static str, &'static str)],
        config: &AppConfig,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.upstream_timeout())
            .build()
            .map_err(|e| AppError::Config(format!("Failed to create HTTP client: {}", e)))?;

        let mut headers = HeaderMap::new();
        headers.insert("X-RapidAPI-Key", header_value(api_key)?);
        headers.insert("X-RapidAPI-Host", header_value(api_host)?);

        Ok(Self {
            id,
            name,
            client,
            base_url: format!("https://{}", api_host),
            headers,
            endpoints,
            limiter: Mutex::new(TokenBucket::new(config.upstream_rate_per_sec)),
        })
    }

    fn endpoint_path(&self, endpoint: &str) -> Result<&'static str> {
        self.endpoints
            .iter()
            .find(|(name, _)| *name == endpoint)
            .map(|(_, path)| *path)
            .ok_or_else(|| {
                AppError::Validation(format!("Unknown {} endpoint: {}", self.id, endpoint))
            })
    }

    fn acquire_token(&self) -> Result<()> {
        let mut limiter = self.limiter.lock();
        if limiter.try_acquire() {
            Ok(())
        } else {
            let wait = limiter.time_until_available();
            warn!("Rate limit reached for {}, retry after {:?}", self.id, wait);
            Err(AppError::RateLimited {
                provider: self.id.to_string(),
                retry_after_ms: wait.as_millis() as u64,
            })
        }
    }
}

#[async_trait]
impl Provider for RapidApiClient {
    fn id(&self) -> &'static str {
        self.id
    }

    fn name(&self) -> &'static str {
        self.name
    }

    async fn fetch(&self, endpoint: &str, params: &[(&str, &str)]) -> Result<String> {
        let path = self.endpoint_path(endpoint)?;
        self.acquire_token()?;

        let url = format!("{}{}", self.base_url, path);
        debug!("{} GET {} {:?}", self.id, path, params);

        let response = self
            .client
            .get(&url)
            .headers(self.headers.clone())
            .query(params)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            warn!("{} {} responded with {}", self.id, endpoint, status);
            return Err(AppError::Upstream {
                provider: self.id.to_string(),
                status: status.as_u16(),
            });
        }

        Ok(response.text().await?)
    }
}

pub(crate) fn required<'a>(value: &'a Option<String>, name: &str) -> Result<&'a str> {
    value
        .as_deref()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::Config(format!("Missing required setting: {}", name)))
}

fn header_value(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|e| AppError::Config(format!("Invalid header value: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_table() {
        let client = RapidApiClient::yhfinance(&AppConfig::for_testing()).unwrap();
        assert_eq!(client.endpoint_path("quote").unwrap(), "/market/v2/get-quotes");
        assert_eq!(client.endpoint_path("autocomplete").unwrap(), "/auto-complete");
        assert!(matches!(
            client.endpoint_path("movers"),
            Err(AppError::Validation(_))
        ));

        let client = RapidApiClient::msfinance(&AppConfig::for_testing()).unwrap();
        assert_eq!(client.endpoint_path("movers").unwrap(), "/market/v2/get-movers");
        assert_eq!(client.base_url, "https://ms.example.test");
    }

    #[test]
    fn test_missing_credentials() {
        let result = RapidApiClient::yhfinance(&AppConfig::default());
        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[test]
    fn test_rate_limited_after_burst() {
        let config = AppConfig {
            upstream_rate_per_sec: 2,
            ..AppConfig::for_testing()
        };
        let client = RapidApiClient::yhfinance(&config).unwrap();
        assert!(client.acquire_token().is_ok());
        assert!(client.acquire_token().is_ok());
        assert!(matches!(
            client.acquire_token(),
            Err(AppError::RateLimited { .. })
        ));
    }
}
