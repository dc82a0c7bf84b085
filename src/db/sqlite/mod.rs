//! SQLite database module

pub mod models;
mod migrations;
mod exchange;
mod ticker;
mod daily;
mod intraday;
mod ticker_details;
mod mover;
mod lastdone;
mod article;
mod recent;

use crate::error::{AppError, Result};
use chrono::{DateTime, NaiveDate, Utc};
use models::*;
use parking_lot::Mutex;
use rusqlite::Connection;
use std::path::Path;

/// SQLite database wrapper
pub struct SqliteDb {
    conn: Mutex<Connection>,
}

impl SqliteDb {
    /// Open (or create) the database file and bring the schema up to date
    pub fn new(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;

        // Enable WAL mode for better concurrent access
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        Self::with_connection(conn)
    }

    /// Private in-memory database, used by tests and one-off tools
    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.run_migrations()?;
        Ok(db)
    }

    fn run_migrations(&self) -> Result<()> {
        let conn = self.conn.lock();
        migrations::run_migrations(&conn)
    }

    // ========== Exchange Methods ==========

    pub fn get_exchange_by_code(&self, code: &str) -> Result<Option<Exchange>> {
        let conn = self.conn.lock();
        exchange::get_exchange_by_code(&conn, code)
    }

    pub fn get_exchange_by_id(&self, id: i64) -> Result<Exchange> {
        let conn = self.conn.lock();
        exchange::get_exchange_by_id(&conn, id)
    }

    pub fn get_or_create_exchange(&self, code: &str) -> Result<Exchange> {
        let conn = self.conn.lock();
        exchange::get_or_create_exchange(&conn, code)
    }

    // ========== Ticker Methods ==========

    pub fn get_ticker_by_symbol(&self, symbol: &str) -> Result<Option<Ticker>> {
        let conn = self.conn.lock();
        ticker::get_ticker_by_symbol(&conn, symbol)
    }

    pub fn get_ticker(&self, symbol: &str, exchange_id: i64) -> Result<Option<Ticker>> {
        let conn = self.conn.lock();
        ticker::get_ticker(&conn, symbol, exchange_id)
    }

    pub fn get_ticker_by_symbol_and_acronym(&self, symbol: &str, acronym: &str) -> Result<Option<Ticker>> {
        let conn = self.conn.lock();
        ticker::get_ticker_by_symbol_and_acronym(&conn, symbol, acronym)
    }

    pub fn get_ticker_by_id(&self, id: i64) -> Result<Ticker> {
        let conn = self.conn.lock();
        ticker::get_ticker_by_id(&conn, id)
    }

    pub fn create_or_update_ticker(&self, upsert: &TickerUpsert) -> Result<Ticker> {
        let conn = self.conn.lock();
        ticker::create_or_update_ticker(&conn, upsert)
    }

    pub fn update_ticker_live_quote(
        &self,
        ticker_id: i64,
        price: f64,
        prev_close: f64,
        volume: i64,
        as_of: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let conn = self.conn.lock();
        ticker::update_ticker_live_quote(&conn, ticker_id, price, prev_close, volume, as_of)
    }

    // ========== Daily Methods ==========

    pub fn create_or_update_daily(&self, daily: &TickerDaily) -> Result<TickerDaily> {
        let conn = self.conn.lock();
        daily::create_or_update_daily(&conn, daily)
    }

    pub fn get_last_two_dailies(&self, ticker_id: i64) -> Result<Vec<TickerDaily>> {
        let conn = self.conn.lock();
        daily::get_last_two_dailies(&conn, ticker_id)
    }

    pub fn get_last_daily_move(&self, ticker_id: i64) -> Result<String> {
        let conn = self.conn.lock();
        daily::get_last_daily_move(&conn, ticker_id)
    }

    pub fn get_dailies_since(&self, ticker_id: i64, since: NaiveDate) -> Result<Vec<TickerDaily>> {
        let conn = self.conn.lock();
        daily::get_dailies_since(&conn, ticker_id, since)
    }

    pub fn have_eod_for_date(&self, ticker_id: i64, date: NaiveDate) -> Result<bool> {
        let conn = self.conn.lock();
        daily::have_eod_for_date(&conn, ticker_id, date)
    }

    // ========== Intraday Methods ==========

    pub fn create_or_update_intraday(&self, moment: &TickerIntraday) -> Result<()> {
        let conn = self.conn.lock();
        intraday::create_or_update_intraday(&conn, moment)
    }

    pub fn count_intradays(&self, ticker_id: i64, date: NaiveDate) -> Result<usize> {
        let conn = self.conn.lock();
        intraday::count_intradays(&conn, ticker_id, date)
    }

    pub fn get_intradays(&self, ticker_id: i64, date: NaiveDate) -> Result<Vec<TickerIntraday>> {
        let conn = self.conn.lock();
        intraday::get_intradays(&conn, ticker_id, date)
    }

    // ========== Ticker Detail Methods ==========

    pub fn get_description(&self, ticker_id: i64) -> Result<Option<TickerDescription>> {
        let conn = self.conn.lock();
        ticker_details::get_description(&conn, ticker_id)
    }

    pub fn create_or_update_description(
        &self,
        ticker_id: i64,
        business_summary: &str,
    ) -> Result<TickerDescription> {
        let conn = self.conn.lock();
        ticker_details::create_or_update_description(&conn, ticker_id, business_summary)
    }

    pub fn create_updown_if_new(&self, updown: &TickerUpDown) -> Result<TickerUpDown> {
        let conn = self.conn.lock();
        ticker_details::create_updown_if_new(&conn, updown)
    }

    pub fn get_updowns_since(&self, ticker_id: i64, since: NaiveDate) -> Result<Vec<TickerUpDown>> {
        let conn = self.conn.lock();
        ticker_details::get_updowns_since(&conn, ticker_id, since)
    }

    pub fn create_or_update_attribute(
        &self,
        ticker_id: i64,
        name: &str,
        comment: &str,
        value: &str,
    ) -> Result<()> {
        let conn = self.conn.lock();
        ticker_details::create_or_update_attribute(&conn, ticker_id, name, comment, value)
    }

    pub fn get_attributes(&self, ticker_id: i64) -> Result<Vec<TickerAttribute>> {
        let conn = self.conn.lock();
        ticker_details::get_attributes(&conn, ticker_id)
    }

    pub fn create_split_if_new(
        &self,
        ticker_id: i64,
        split_date: NaiveDate,
        split_ratio: &str,
    ) -> Result<()> {
        let conn = self.conn.lock();
        ticker_details::create_split_if_new(&conn, ticker_id, split_date, split_ratio)
    }

    pub fn get_splits(&self, ticker_id: i64) -> Result<Vec<TickerSplit>> {
        let conn = self.conn.lock();
        ticker_details::get_splits(&conn, ticker_id)
    }

    // ========== Mover Methods ==========

    pub fn create_mover_if_new(&self, mover: &Mover) -> Result<Mover> {
        let conn = self.conn.lock();
        mover::create_mover_if_new(&conn, mover)
    }

    pub fn get_latest_movers_date(&self) -> Result<Option<NaiveDate>> {
        let conn = self.conn.lock();
        mover::get_latest_movers_date(&conn)
    }

    pub fn get_movers_by_date(&self, date: NaiveDate) -> Result<Vec<Mover>> {
        let conn = self.conn.lock();
        mover::get_movers_by_date(&conn, date)
    }

    // ========== Last-run Ledger Methods ==========

    pub fn get_lastdone(&self, activity: &str, unique_key: &str) -> Result<Option<LastDone>> {
        let conn = self.conn.lock();
        lastdone::get_lastdone(&conn, activity, unique_key)
    }

    pub fn record_lastdone(
        &self,
        activity: &str,
        unique_key: &str,
        status: &str,
        at: DateTime<Utc>,
    ) -> Result<()> {
        let conn = self.conn.lock();
        lastdone::record_lastdone(&conn, activity, unique_key, status, at)
    }

    // ========== Article Methods ==========

    /// Store an article (once per source/external id) and link it to tickers
    pub fn save_article(&self, article: &Article, ticker_ids: &[i64]) -> Result<Article> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let stored = article::create_article_if_new(&tx, article)?;
        for ticker_id in ticker_ids {
            article::link_article_ticker(&tx, stored.id, *ticker_id)?;
        }
        tx.commit()?;
        Ok(stored)
    }

    pub fn get_recent_articles(&self, limit: usize) -> Result<Vec<Article>> {
        let conn = self.conn.lock();
        article::get_recent_articles(&conn, limit)
    }

    pub fn get_articles_by_ticker(
        &self,
        ticker_id: i64,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Article>> {
        let conn = self.conn.lock();
        article::get_articles_by_ticker(&conn, ticker_id, since, limit)
    }

    // ========== Recent Methods ==========

    pub fn touch_recent(&self, ticker_id: i64, seen_at: DateTime<Utc>) -> Result<()> {
        let conn = self.conn.lock();
        recent::touch_recent(&conn, ticker_id, seen_at)
    }

    pub fn get_recents(&self, limit: usize) -> Result<Vec<Recent>> {
        let conn = self.conn.lock();
        recent::get_recents(&conn, limit)
    }
}

/// A freshly written row must carry a real id
pub(crate) fn require_id(table: &str, id: i64) -> Result<()> {
    if id <= 0 {
        return Err(AppError::Invariant(format!(
            "{} row has id {} after write",
            table, id
        )));
    }
    Ok(())
}

#[cfg(test)]
pub(crate) fn test_conn() -> Connection {
    let conn = Connection::open_in_memory().unwrap();
    migrations::run_migrations(&conn).unwrap();
    conn
}

#[cfg(test)]
pub(crate) fn test_ticker(conn: &Connection, symbol: &str) -> Ticker {
    let exchange = exchange::get_or_create_exchange(conn, "NMS").unwrap();
    ticker::create_or_update_ticker(
        conn,
        &TickerUpsert {
            ticker_symbol: symbol.to_string(),
            exchange_id: exchange.id,
            ticker_name: format!("{} Inc.", symbol),
            ..Default::default()
        },
    )
    .unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_id() {
        assert!(require_id("ticker", 1).is_ok());
        assert!(matches!(require_id("ticker", 0), Err(AppError::Invariant(_))));
    }

    #[test]
    fn test_file_backed_database_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stockwatch.db");

        let ticker_id = {
            let db = SqliteDb::new(&path).unwrap();
            let exchange = db.get_or_create_exchange("NMS").unwrap();
            db.create_or_update_ticker(&TickerUpsert {
                ticker_symbol: "AAPL".to_string(),
                exchange_id: exchange.id,
                ..Default::default()
            })
            .unwrap()
            .id
        };

        let db = SqliteDb::new(&path).unwrap();
        let ticker = db.get_ticker_by_symbol("AAPL").unwrap().unwrap();
        assert_eq!(ticker.id, ticker_id);
    }

    #[test]
    fn test_save_article_links_tickers() {
        let db = SqliteDb::open_in_memory().unwrap();
        let exchange = db.get_or_create_exchange("NMS").unwrap();
        let ticker = db
            .create_or_update_ticker(&TickerUpsert {
                ticker_symbol: "MSFT".to_string(),
                exchange_id: exchange.id,
                ..Default::default()
            })
            .unwrap();

        let article = Article {
            id: 0,
            source: "yhfinance".to_string(),
            external_id: "abc".to_string(),
            published_datetime: Some(Utc::now()),
            publisher: "Wire".to_string(),
            title: "Cloud growth".to_string(),
            url: "https://news.example.test/abc".to_string(),
            article_type: "STORY".to_string(),
        };
        db.save_article(&article, &[ticker.id]).unwrap();
        db.save_article(&article, &[ticker.id]).unwrap();

        let since = Utc::now() - chrono::Duration::days(1);
        let linked = db.get_articles_by_ticker(ticker.id, since, 10).unwrap();
        assert_eq!(linked.len(), 1);
    }
}
