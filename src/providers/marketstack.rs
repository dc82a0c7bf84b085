//! Marketstack client
//!
//! Intraday prices. Authenticates with an `access_key` query parameter
//! instead of headers.

use crate::config::AppConfig;
use crate::error::{AppError, Result};
use crate::providers::rapidapi::required;
use crate::providers::rate_limiter::TokenBucket;
use crate::providers::{Provider, MARKETSTACK};
use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::Client;
use tracing::{debug, warn};

const ENDPOINTS: &[(&str, &str)] = &[("intraday", "/intraday")];

pub struct MarketstackClient {
    client: Client,
    base_url: String,
    access_key: String,
    limiter: Mutex<TokenBucket>,
}

impl MarketstackClient {
    pub fn new(config: &AppConfig) -> Result<Self> {
        let access_key = required(&config.marketstack_api_key, "marketstack_api_key")?;
        let client = Client::builder()
            .timeout(config.upstream_timeout())
            .build()
            .map_err(|e| AppError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.marketstack_base_url.trim_end_matches('/').to_string(),
            access_key: access_key.to_string(),
            limiter: Mutex::new(TokenBucket::new(config.upstream_rate_per_sec)),
        })
    }

    fn endpoint_path(endpoint: &str) -> Result<&'static str> {
        ENDPOINTS
            .iter()
            .find(|(name, _)| *name == endpoint)
            .map(|(_, path)| *path)
            .ok_or_else(|| {
                AppError::Validation(format!("Unknown {} endpoint: {}", MARKETSTACK, endpoint))
            })
    }

    fn acquire_token(&self) -> Result<()> {
        let mut limiter = self.limiter.lock();
        if limiter.try_acquire() {
            return Ok(());
        }
        let wait = limiter.time_until_available();
        warn!("Rate limit reached for {}, retry after {:?}", MARKETSTACK, wait);
        Err(AppError::RateLimited {
            provider: MARKETSTACK.to_string(),
            retry_after_ms: wait.as_millis() as u64,
        })
    }
}

#[async_trait]
impl Provider for MarketstackClient {
    fn id(&self) -> &'static str {
        MARKETSTACK
    }

    fn name(&self) -> &'static str {
        "Marketstack"
    }

    async fn fetch(&self, endpoint: &str, params: &[(&str, &str)]) -> Result<String> {
        let path = Self::endpoint_path(endpoint)?;
        self.acquire_token()?;

        // Logged params never include the access key
        debug!("{} GET {} {:?}", MARKETSTACK, path, params);
        let response = self
            .client
            .get(format!("{}{}", self.base_url, path))
            .query(&[("access_key", self.access_key.as_str())])
            .query(params)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            warn!("{} {} responded with {}", MARKETSTACK, endpoint, status);
            return Err(AppError::Upstream {
                provider: MARKETSTACK.to_string(),
                status: status.as_u16(),
            });
        }

        Ok(response.text().await?)
    }
}
