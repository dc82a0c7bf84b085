//! SQLite database models

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Exchange, keyed by the provider's exchange code
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exchange {
    pub id: i64,
    pub exchange_code: String,
    pub exchange_acronym: String,
    pub exchange_mic: String,
    pub exchange_name: String,
}

/// Ticker, unique per (symbol, exchange)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticker {
    pub id: i64,
    pub ticker_symbol: String,
    pub exchange_id: i64,
    pub ticker_type: String,
    pub ticker_market: String,
    pub ticker_name: String,
    pub company_name: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub zip: String,
    pub country: String,
    pub website: String,
    pub phone: String,
    pub sector: String,
    pub industry: String,
    pub market_price: f64,
    pub market_prev_close: f64,
    pub market_volume: i64,
    pub market_price_datetime: Option<DateTime<Utc>>,
    pub fetch_datetime: Option<DateTime<Utc>>,
}

/// Fields written by a ticker create-or-update.
///
/// Identity (`ticker_symbol`, `exchange_id`) selects the row; descriptive
/// fields are overwritten unless blank; `None` market fields leave stored
/// values alone.
#[derive(Debug, Clone, Default)]
pub struct TickerUpsert {
    pub ticker_symbol: String,
    pub exchange_id: i64,
    pub ticker_type: String,
    pub ticker_market: String,
    pub ticker_name: String,
    pub company_name: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub zip: String,
    pub country: String,
    pub website: String,
    pub phone: String,
    pub sector: String,
    pub industry: String,
    pub market_price: Option<f64>,
    pub market_prev_close: Option<f64>,
    pub market_volume: Option<i64>,
    pub fetch_datetime: Option<DateTime<Utc>>,
}

/// End-of-day prices for one ticker and date
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickerDaily {
    pub id: i64,
    pub ticker_id: i64,
    pub price_date: NaiveDate,
    /// Exchange-local time of the price, `HH:MM:SS`
    pub price_time: String,
    pub open_price: f64,
    pub high_price: f64,
    pub low_price: f64,
    pub close_price: f64,
    pub volume: f64,
}

/// One intraday price moment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickerIntraday {
    pub id: i64,
    pub ticker_id: i64,
    /// Exchange-local trading day the moment belongs to
    pub price_date: NaiveDate,
    pub price_datetime: DateTime<Utc>,
    pub last_price: f64,
    /// Shares traded since the previous moment
    pub volume: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickerDescription {
    pub id: i64,
    pub ticker_id: i64,
    pub business_summary: String,
}

/// Analyst upgrade or downgrade
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickerUpDown {
    pub id: i64,
    pub ticker_id: i64,
    pub updown_action: String,
    pub updown_from_grade: String,
    pub updown_to_grade: String,
    pub updown_date: NaiveDate,
    pub updown_firm: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickerAttribute {
    pub id: i64,
    pub ticker_id: i64,
    pub attribute_name: String,
    pub attribute_comment: String,
    pub attribute_value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickerSplit {
    pub id: i64,
    pub ticker_id: i64,
    pub split_date: NaiveDate,
    pub split_ratio: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MoverType {
    Gainer,
    Loser,
    Active,
}

impl MoverType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MoverType::Gainer => "gainer",
            MoverType::Loser => "loser",
            MoverType::Active => "active",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "gainer" => Some(MoverType::Gainer),
            "loser" => Some(MoverType::Loser),
            "active" => Some(MoverType::Active),
            _ => None,
        }
    }
}

/// Market mover, one row per ticker per day per type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mover {
    pub id: i64,
    pub source: String,
    pub ticker_id: i64,
    pub mover_date: NaiveDate,
    pub mover_type: MoverType,
    pub last_price: f64,
    pub price_change: f64,
    pub price_change_pct: f64,
    pub volume: i64,
}

/// Last-run ledger entry, keyed by (activity, unique_key)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LastDone {
    pub activity: String,
    pub unique_key: String,
    pub last_status: String,
    pub lastdone_datetime: DateTime<Utc>,
}

pub const STATUS_SUCCESS: &str = "success";
pub const STATUS_FAILED: &str = "failed";

impl LastDone {
    pub fn succeeded(&self) -> bool {
        self.last_status == STATUS_SUCCESS
    }
}

/// News article, unique per (source, external_id)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub id: i64,
    pub source: String,
    pub external_id: String,
    pub published_datetime: Option<DateTime<Utc>>,
    pub publisher: String,
    pub title: String,
    pub url: String,
    pub article_type: String,
}

/// Globally recently viewed ticker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recent {
    pub ticker_id: i64,
    pub lastseen_datetime: DateTime<Utc>,
}
