//! Process configuration
//!
//! Every tunable the service reads lives here and is handed to `AppState`
//! once at startup. Values come from an optional JSON file named by
//! `STOCKWATCH_CONFIG`, then `STOCKWATCH_*` environment overrides.

use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const CONFIG_FILE_VAR: &str = "STOCKWATCH_CONFIG";
const ENV_PREFIX: &str = "STOCKWATCH_";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub listen_host: String,
    pub listen_port: u16,
    pub database_path: PathBuf,

    pub cookie_secret: Option<String>,
    pub session_max_age_secs: u64,

    pub yhfinance_api_key: Option<String>,
    pub yhfinance_api_host: Option<String>,
    pub msfinance_api_key: Option<String>,
    pub msfinance_api_host: Option<String>,
    /// Marketstack is optional; intraday prices are unavailable without it
    pub marketstack_api_key: Option<String>,
    pub marketstack_base_url: String,
    pub upstream_timeout_secs: u64,
    pub upstream_rate_per_sec: u32,

    pub quote_ttl_secs: u64,
    pub summary_ttl_secs: u64,
    pub ticker_news_delay_mins: i64,
    pub ticker_financials_delay_mins: i64,

    pub skip_cache_checks: bool,
    pub debugging: bool,
    pub skip_local_ticker_info: bool,

    pub queue_capacity: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            listen_host: "0.0.0.0".to_string(),
            listen_port: 3001,
            database_path: PathBuf::from("stockwatch.db"),
            cookie_secret: None,
            session_max_age_secs: 24 * 60 * 60,
            yhfinance_api_key: None,
            yhfinance_api_host: None,
            msfinance_api_key: None,
            msfinance_api_host: None,
            marketstack_api_key: None,
            marketstack_base_url: "https://api.marketstack.com/v1".to_string(),
            upstream_timeout_secs: 5,
            upstream_rate_per_sec: 5,
            quote_ttl_secs: 20,
            summary_ttl_secs: 24 * 60 * 60,
            ticker_news_delay_mins: 60 * 4,
            ticker_financials_delay_mins: 60 * 24,
            skip_cache_checks: false,
            debugging: false,
            skip_local_ticker_info: false,
            queue_capacity: 256,
        }
    }
}

impl AppConfig {
    /// Load from the optional config file and the environment, then validate
    pub fn load() -> Result<Self> {
        let mut config = match std::env::var(CONFIG_FILE_VAR) {
            Ok(path) => Self::from_file(Path::new(&path))?,
            Err(_) => Self::default(),
        };

        config.apply_overrides(|name| std::env::var(format!("{}{}", ENV_PREFIX, name)).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Read a JSON config file; absent fields keep their defaults
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("Failed to read {:?}: {}", path, e)))?;
        let config = serde_json::from_str(&raw)
            .map_err(|e| AppError::Config(format!("Invalid config file {:?}: {}", path, e)))?;
        Ok(config)
    }

    /// Apply overrides from a variable lookup (env in production, a map in tests)
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("LISTEN_HOST") {
            self.listen_host = v;
        }
        if let Some(v) = lookup("LISTEN_PORT") {
            self.listen_port = parse_var("LISTEN_PORT", &v)?;
        }
        if let Some(v) = lookup("DATABASE_PATH") {
            self.database_path = PathBuf::from(v);
        }
        if let Some(v) = lookup("COOKIE_SECRET") {
            self.cookie_secret = Some(v);
        }
        if let Some(v) = lookup("SESSION_MAX_AGE_SECS") {
            self.session_max_age_secs = parse_var("SESSION_MAX_AGE_SECS", &v)?;
        }
        if let Some(v) = lookup("YHFINANCE_API_KEY") {
            self.yhfinance_api_key = Some(v);
        }
        if let Some(v) = lookup("YHFINANCE_API_HOST") {
            self.yhfinance_api_host = Some(v);
        }
        if let Some(v) = lookup("MSFINANCE_API_KEY") {
            self.msfinance_api_key = Some(v);
        }
        if let Some(v) = lookup("MSFINANCE_API_HOST") {
            self.msfinance_api_host = Some(v);
        }
        if let Some(v) = lookup("MARKETSTACK_API_KEY") {
            self.marketstack_api_key = Some(v);
        }
        if let Some(v) = lookup("MARKETSTACK_BASE_URL") {
            self.marketstack_base_url = v;
        }
        if let Some(v) = lookup("UPSTREAM_TIMEOUT_SECS") {
            self.upstream_timeout_secs = parse_var("UPSTREAM_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = lookup("UPSTREAM_RATE_PER_SEC") {
            self.upstream_rate_per_sec = parse_var("UPSTREAM_RATE_PER_SEC", &v)?;
        }
        if let Some(v) = lookup("QUOTE_TTL_SECS") {
            self.quote_ttl_secs = parse_var("QUOTE_TTL_SECS", &v)?;
        }
        if let Some(v) = lookup("SUMMARY_TTL_SECS") {
            self.summary_ttl_secs = parse_var("SUMMARY_TTL_SECS", &v)?;
        }
        if let Some(v) = lookup("TICKER_NEWS_DELAY_MINS") {
            self.ticker_news_delay_mins = parse_var("TICKER_NEWS_DELAY_MINS", &v)?;
        }
        if let Some(v) = lookup("TICKER_FINANCIALS_DELAY_MINS") {
            self.ticker_financials_delay_mins = parse_var("TICKER_FINANCIALS_DELAY_MINS", &v)?;
        }
        if let Some(v) = lookup("SKIP_CACHE_CHECKS") {
            self.skip_cache_checks = parse_flag(&v);
        }
        if let Some(v) = lookup("DEBUGGING") {
            self.debugging = parse_flag(&v);
        }
        if let Some(v) = lookup("SKIP_LOCAL_TICKER_INFO") {
            self.skip_local_ticker_info = parse_flag(&v);
        }
        if let Some(v) = lookup("QUEUE_CAPACITY") {
            self.queue_capacity = parse_var("QUEUE_CAPACITY", &v)?;
        }
        Ok(())
    }

    /// Reject configurations the service cannot start with
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("cookie_secret", &self.cookie_secret),
            ("yhfinance_api_key", &self.yhfinance_api_key),
            ("yhfinance_api_host", &self.yhfinance_api_host),
            ("msfinance_api_key", &self.msfinance_api_key),
            ("msfinance_api_host", &self.msfinance_api_host),
        ];
        for (name, value) in required {
            if value.as_deref().map_or(true, str::is_empty) {
                return Err(AppError::Config(format!("Missing required setting: {}", name)));
            }
        }

        if self.quote_ttl_secs == 0 || self.summary_ttl_secs == 0 {
            return Err(AppError::Config("Cache TTLs must be greater than zero".to_string()));
        }
        if self.upstream_timeout_secs == 0 {
            return Err(AppError::Config("Upstream timeout must be greater than zero".to_string()));
        }
        if self.upstream_rate_per_sec == 0 {
            return Err(AppError::Config("Upstream rate must be greater than zero".to_string()));
        }
        if self.queue_capacity == 0 {
            return Err(AppError::Config("Queue capacity must be greater than zero".to_string()));
        }
        Ok(())
    }

    pub fn quote_ttl(&self) -> Duration {
        Duration::from_secs(self.quote_ttl_secs)
    }

    pub fn summary_ttl(&self) -> Duration {
        Duration::from_secs(self.summary_ttl_secs)
    }

    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream_timeout_secs)
    }

    pub fn session_max_age(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.session_max_age_secs as i64)
    }

    pub fn ticker_news_delay(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.ticker_news_delay_mins)
    }

    pub fn ticker_financials_delay(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.ticker_financials_delay_mins)
    }

    /// Config with placeholder credentials, for tests
    #[cfg(test)]
    pub fn for_testing() -> Self {
        Self {
            cookie_secret: Some("test-cookie-secret".to_string()),
            yhfinance_api_key: Some("yh-key".to_string()),
            yhfinance_api_host: Some("yh.example.test".to_string()),
            msfinance_api_key: Some("ms-key".to_string()),
            msfinance_api_host: Some("ms.example.test".to_string()),
            marketstack_api_key: Some("mk-key".to_string()),
            marketstack_base_url: "https://mk.example.test/v1".to_string(),
            ..Self::default()
        }
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| AppError::Config(format!("Invalid {}{}={:?}: {}", ENV_PREFIX, name, value, e)))
}

fn parse_flag(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}
