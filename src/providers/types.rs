//! Provider response shapes and the domain quote

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Domain
// ============================================================================

/// Point-in-time price snapshot for one symbol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub symbol: String,
    pub price: f64,
    pub prev_close: f64,
    pub bid: f64,
    pub ask: f64,
    pub bid_size: i64,
    pub ask_size: i64,
    pub change: f64,
    pub change_pct: f64,
    pub volume: i64,
    pub day_low: f64,
    pub day_high: f64,
    pub as_of: Option<DateTime<Utc>>,
}

impl Quote {
    /// `up`, `down` or `unchanged`
    pub fn daily_move(&self) -> &'static str {
        crate::util::move_direction(self.change)
    }
}

// ============================================================================
// Yahoo Finance (RapidAPI "yhfinance")
// ============================================================================

/// `market/v2/get-quotes`
///
/// The envelope, each item's symbol and its price are required: a body
/// without them is a decode error, never an empty or zero quote.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct YhQuoteResponse {
    pub quote_response: YhQuoteResult,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct YhQuoteResult {
    pub result: Vec<YhQuote>,
}

impl YhQuoteResponse {
    /// Envelope holding at most one item, as cached per symbol
    pub fn single(quote: Option<YhQuote>) -> Self {
        Self {
            quote_response: YhQuoteResult {
                result: quote.into_iter().collect(),
            },
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct YhQuote {
    pub symbol: String,
    pub short_name: Option<String>,
    pub long_name: Option<String>,
    pub exchange: Option<String>,
    pub regular_market_price: f64,
    #[serde(default)]
    pub regular_market_previous_close: f64,
    #[serde(default)]
    pub bid: f64,
    #[serde(default)]
    pub ask: f64,
    #[serde(default)]
    pub bid_size: i64,
    #[serde(default)]
    pub ask_size: i64,
    #[serde(default)]
    pub regular_market_change: f64,
    #[serde(default)]
    pub regular_market_change_percent: f64,
    #[serde(default)]
    pub regular_market_volume: i64,
    #[serde(default)]
    pub regular_market_day_low: f64,
    #[serde(default)]
    pub regular_market_day_high: f64,
    #[serde(default)]
    pub regular_market_time: i64,
}

impl From<&YhQuote> for Quote {
    fn from(q: &YhQuote) -> Self {
        Quote {
            symbol: q.symbol.clone(),
            price: q.regular_market_price,
            prev_close: q.regular_market_previous_close,
            bid: q.bid,
            ask: q.ask,
            bid_size: q.bid_size,
            ask_size: q.ask_size,
            change: q.regular_market_change,
            change_pct: q.regular_market_change_percent,
            volume: q.regular_market_volume,
            day_low: q.regular_market_day_low,
            day_high: q.regular_market_day_high,
            as_of: from_epoch(q.regular_market_time),
        }
    }
}

/// Yahoo's `{"raw": 1.2, "fmt": "1.20"}` number wrapper
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct RawFmt {
    pub raw: Option<f64>,
    pub fmt: Option<String>,
}

impl RawFmt {
    pub fn fmt_or_empty(&self) -> &str {
        self.fmt.as_deref().unwrap_or("")
    }
}

/// `stock/v2/get-summary`
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct YhSummaryResponse {
    pub price: YhSummaryPrice,
    pub quote_type: YhQuoteType,
    pub summary_profile: YhSummaryProfile,
    pub default_key_statistics: YhKeyStatistics,
    pub upgrade_downgrade_history: YhUpgradeDowngradeHistory,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct YhSummaryPrice {
    /// Yahoo exchange code, e.g. `NMS`
    pub exchange: String,
    pub exchange_name: Option<String>,
    pub regular_market_price: RawFmt,
    pub regular_market_previous_close: RawFmt,
    pub regular_market_volume: RawFmt,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct YhQuoteType {
    pub symbol: String,
    pub short_name: Option<String>,
    pub long_name: Option<String>,
    pub quote_type: Option<String>,
    pub market: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct YhSummaryProfile {
    pub address1: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip: Option<String>,
    pub country: Option<String>,
    pub website: Option<String>,
    pub phone: Option<String>,
    pub sector: Option<String>,
    pub industry: Option<String>,
    pub long_business_summary: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct YhKeyStatistics {
    pub short_ratio: RawFmt,
    pub last_split_date: RawFmt,
    pub last_dividend_date: RawFmt,
    pub shares_short: RawFmt,
    pub float_shares: RawFmt,
    pub forward_eps: RawFmt,
    pub enterprise_to_revenue: RawFmt,
    pub enterprise_to_ebitda: RawFmt,
}

impl YhKeyStatistics {
    /// (attribute name, formatted value) pairs stored as ticker attributes
    pub fn attributes(&self) -> Vec<(&'static str, &str)> {
        vec![
            ("short_ratio", self.short_ratio.fmt_or_empty()),
            ("last_split_date", self.last_split_date.fmt_or_empty()),
            ("last_dividend_date", self.last_dividend_date.fmt_or_empty()),
            ("shares_short", self.shares_short.fmt_or_empty()),
            ("float_shares", self.float_shares.fmt_or_empty()),
            ("forward_eps", self.forward_eps.fmt_or_empty()),
            ("enterprise_to_revenue", self.enterprise_to_revenue.fmt_or_empty()),
            ("enterprise_to_ebitda", self.enterprise_to_ebitda.fmt_or_empty()),
        ]
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct YhUpgradeDowngradeHistory {
    pub history: Vec<YhUpDown>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct YhUpDown {
    pub epoch_grade_date: i64,
    pub firm: String,
    pub to_grade: String,
    pub from_grade: String,
    pub action: String,
}

/// `stock/v3/get-historical-data`
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct YhHistoricalResponse {
    pub prices: Vec<YhHistoricalPrice>,
    pub events_data: Vec<YhHistoricalEvent>,
}

/// Price row; dividend rows come through the same list without prices
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct YhHistoricalPrice {
    pub date: i64,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
    pub volume: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct YhHistoricalEvent {
    pub date: i64,
    #[serde(rename = "type")]
    pub event_type: String,
    pub split_ratio: Option<String>,
}

/// `auto-complete`
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct YhAutoCompleteResponse {
    pub quotes: Vec<YhAutoCompleteQuote>,
    pub news: Vec<YhNewsItem>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct YhAutoCompleteQuote {
    pub symbol: String,
    pub exchange: String,
    #[serde(rename = "shortname")]
    pub short_name: Option<String>,
    #[serde(rename = "longname")]
    pub long_name: Option<String>,
    pub quote_type: Option<String>,
    pub score: f64,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct YhNewsItem {
    pub uuid: String,
    pub title: String,
    pub publisher: String,
    pub link: String,
    pub provider_publish_time: i64,
    #[serde(rename = "type")]
    pub news_type: String,
}

// ============================================================================
// Morningstar (RapidAPI "msfinance")
// ============================================================================

/// `market/v2/get-movers`
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct MsMoversResponse {
    pub gainers: Vec<MsMover>,
    pub losers: Vec<MsMover>,
    pub actives: Vec<MsMover>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MsMover {
    #[serde(alias = "symbol")]
    pub ticker: String,
    pub name: Option<String>,
    pub exchange: Option<String>,
    pub last_price: f64,
    pub net_change: f64,
    pub percent_net_change: f64,
    pub volume: i64,
}

// ============================================================================
// Marketstack
// ============================================================================

/// `intraday`
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MkIntradayResponse {
    pub data: Vec<MkIntraday>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MkIntraday {
    pub symbol: String,
    /// e.g. `2024-03-04T14:35:00+0000`
    pub date: String,
    pub last: Option<f64>,
    pub close: Option<f64>,
    /// Cumulative volume for the day so far
    pub volume: Option<f64>,
}

impl MkIntraday {
    pub fn at(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_str(&self.date, "%Y-%m-%dT%H:%M:%S%z")
            .ok()
            .map(|at| at.with_timezone(&Utc))
    }

    /// Last trade price, falling back to the interval close
    pub fn price(&self) -> Option<f64> {
        self.last.or(self.close).filter(|p| *p > 0.0)
    }
}

/// Unix seconds to UTC, `None` for zero or out-of-range values
pub fn from_epoch(secs: i64) -> Option<DateTime<Utc>> {
    if secs <= 0 {
        return None;
    }
    Utc.timestamp_opt(secs, 0).single()
}
