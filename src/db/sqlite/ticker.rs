//! Tickers

use crate::db::sqlite::models::{Ticker, TickerUpsert};
use crate::db::sqlite::require_id;
use crate::error::{AppError, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

const COLUMNS: &str = "id, ticker_symbol, exchange_id, ticker_type, ticker_market, ticker_name, \
     company_name, address, city, state, zip, country, website, phone, sector, industry, \
     market_price, market_prev_close, market_volume, market_price_datetime, fetch_datetime";

fn from_row(row: &Row<'_>) -> rusqlite::Result<Ticker> {
    Ok(Ticker {
        id: row.get(0)?,
        ticker_symbol: row.get(1)?,
        exchange_id: row.get(2)?,
        ticker_type: row.get(3)?,
        ticker_market: row.get(4)?,
        ticker_name: row.get(5)?,
        company_name: row.get(6)?,
        address: row.get(7)?,
        city: row.get(8)?,
        state: row.get(9)?,
        zip: row.get(10)?,
        country: row.get(11)?,
        website: row.get(12)?,
        phone: row.get(13)?,
        sector: row.get(14)?,
        industry: row.get(15)?,
        market_price: row.get(16)?,
        market_prev_close: row.get(17)?,
        market_volume: row.get(18)?,
        market_price_datetime: row.get(19)?,
        fetch_datetime: row.get(20)?,
    })
}

/// First ticker with this symbol on any exchange
pub fn get_ticker_by_symbol(conn: &Connection, symbol: &str) -> Result<Option<Ticker>> {
    let ticker = conn
        .query_row(
            &format!(
                "SELECT {} FROM ticker WHERE ticker_symbol = ? ORDER BY id LIMIT 1",
                COLUMNS
            ),
            [symbol],
            from_row,
        )
        .optional()?;
    Ok(ticker)
}

/// Ticker by its natural key
pub fn get_ticker(conn: &Connection, symbol: &str, exchange_id: i64) -> Result<Option<Ticker>> {
    let ticker = conn
        .query_row(
            &format!(
                "SELECT {} FROM ticker WHERE ticker_symbol = ?1 AND exchange_id = ?2",
                COLUMNS
            ),
            params![symbol, exchange_id],
            from_row,
        )
        .optional()?;
    Ok(ticker)
}

/// Ticker listed under `symbol` on an exchange known by `acronym`
pub fn get_ticker_by_symbol_and_acronym(
    conn: &Connection,
    symbol: &str,
    acronym: &str,
) -> Result<Option<Ticker>> {
    let ticker = conn
        .query_row(
            &format!(
                "SELECT {} FROM ticker WHERE ticker_symbol = ?1
                 AND exchange_id IN (SELECT id FROM exchange WHERE exchange_acronym = ?2)
                 ORDER BY id LIMIT 1",
                COLUMNS
            ),
            params![symbol, acronym],
            from_row,
        )
        .optional()?;
    Ok(ticker)
}

pub fn get_ticker_by_id(conn: &Connection, id: i64) -> Result<Ticker> {
    conn.query_row(
        &format!("SELECT {} FROM ticker WHERE id = ?", COLUMNS),
        [id],
        from_row,
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => {
            AppError::NotFound(format!("Ticker not found: {}", id))
        }
        _ => e.into(),
    })
}

/// Insert or update the ticker identified by (symbol, exchange).
///
/// Never changes the row's id, symbol or exchange. Market fields given as
/// `None` and descriptive fields given blank keep their stored values.
pub fn create_or_update_ticker(conn: &Connection, t: &TickerUpsert) -> Result<Ticker> {
    if t.ticker_symbol.trim().is_empty() {
        return Err(AppError::Validation(
            "Refusing to store ticker with blank symbol".to_string(),
        ));
    }

    conn.execute(
        "INSERT INTO ticker (
            ticker_symbol, exchange_id, ticker_type, ticker_market, ticker_name, company_name,
            address, city, state, zip, country, website, phone, sector, industry,
            market_price, market_prev_close, market_volume, fetch_datetime
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15,
                   COALESCE(?16, 0), COALESCE(?17, 0), COALESCE(?18, 0), ?19)
         ON CONFLICT(ticker_symbol, exchange_id) DO UPDATE SET
            ticker_type = COALESCE(NULLIF(excluded.ticker_type, ''), ticker.ticker_type),
            ticker_market = COALESCE(NULLIF(excluded.ticker_market, ''), ticker.ticker_market),
            ticker_name = COALESCE(NULLIF(excluded.ticker_name, ''), ticker.ticker_name),
            company_name = COALESCE(NULLIF(excluded.company_name, ''), ticker.company_name),
            address = COALESCE(NULLIF(excluded.address, ''), ticker.address),
            city = COALESCE(NULLIF(excluded.city, ''), ticker.city),
            state = COALESCE(NULLIF(excluded.state, ''), ticker.state),
            zip = COALESCE(NULLIF(excluded.zip, ''), ticker.zip),
            country = COALESCE(NULLIF(excluded.country, ''), ticker.country),
            website = COALESCE(NULLIF(excluded.website, ''), ticker.website),
            phone = COALESCE(NULLIF(excluded.phone, ''), ticker.phone),
            sector = COALESCE(NULLIF(excluded.sector, ''), ticker.sector),
            industry = COALESCE(NULLIF(excluded.industry, ''), ticker.industry),
            market_price = COALESCE(?16, ticker.market_price),
            market_prev_close = COALESCE(?17, ticker.market_prev_close),
            market_volume = COALESCE(?18, ticker.market_volume),
            fetch_datetime = COALESCE(excluded.fetch_datetime, ticker.fetch_datetime),
            updated_at = datetime('now')",
        params![
            t.ticker_symbol,
            t.exchange_id,
            t.ticker_type,
            t.ticker_market,
            t.ticker_name,
            t.company_name,
            t.address,
            t.city,
            t.state,
            t.zip,
            t.country,
            t.website,
            t.phone,
            t.sector,
            t.industry,
            t.market_price,
            t.market_prev_close,
            t.market_volume,
            t.fetch_datetime,
        ],
    )?;

    let ticker = get_ticker(conn, &t.ticker_symbol, t.exchange_id)?.ok_or_else(|| {
        AppError::Invariant(format!("Ticker {} missing after upsert", t.ticker_symbol))
    })?;
    require_id("ticker", ticker.id)?;
    Ok(ticker)
}

/// Record the latest live quote on the ticker row
pub fn update_ticker_live_quote(
    conn: &Connection,
    ticker_id: i64,
    price: f64,
    prev_close: f64,
    volume: i64,
    as_of: Option<DateTime<Utc>>,
) -> Result<()> {
    let updated = conn.execute(
        "UPDATE ticker SET market_price = ?1, market_prev_close = ?2, market_volume = ?3,
            market_price_datetime = ?4, updated_at = datetime('now')
         WHERE id = ?5",
        params![price, prev_close, volume, as_of, ticker_id],
    )?;

    if updated == 0 {
        return Err(AppError::NotFound(format!("Ticker not found: {}", ticker_id)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::exchange::get_or_create_exchange;
    use crate::db::sqlite::test_conn;

    fn upsert(exchange_id: i64, name: &str, price: Option<f64>) -> TickerUpsert {
        TickerUpsert {
            ticker_symbol: "AAPL".to_string(),
            exchange_id,
            ticker_name: name.to_string(),
            market_price: price,
            ..Default::default()
        }
    }

    #[test]
    fn test_create_or_update_resolves_one_row() {
        let conn = test_conn();
        let exchange = get_or_create_exchange(&conn, "NMS").unwrap();

        let created = create_or_update_ticker(&conn, &upsert(exchange.id, "Apple", Some(180.0))).unwrap();
        let updated =
            create_or_update_ticker(&conn, &upsert(exchange.id, "Apple Inc.", None)).unwrap();

        assert_eq!(created.id, updated.id);
        assert_eq!(updated.ticker_name, "Apple Inc.");
        // None leaves the stored price alone
        assert_eq!(updated.market_price, 180.0);

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM ticker", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_blank_fields_keep_stored_values() {
        let conn = test_conn();
        let exchange = get_or_create_exchange(&conn, "NMS").unwrap();
        create_or_update_ticker(
            &conn,
            &TickerUpsert {
                sector: "Technology".to_string(),
                city: "Cupertino".to_string(),
                ..upsert(exchange.id, "Apple", None)
            },
        )
        .unwrap();

        let updated = create_or_update_ticker(
            &conn,
            &TickerUpsert {
                city: "Austin".to_string(),
                ..upsert(exchange.id, "", None)
            },
        )
        .unwrap();
        assert_eq!(updated.ticker_name, "Apple");
        assert_eq!(updated.sector, "Technology");
        assert_eq!(updated.city, "Austin");
    }

    #[test]
    fn test_same_symbol_on_two_exchanges() {
        let conn = test_conn();
        let nasdaq = get_or_create_exchange(&conn, "NMS").unwrap();
        let nyse = get_or_create_exchange(&conn, "NYQ").unwrap();

        let a = create_or_update_ticker(&conn, &upsert(nasdaq.id, "A", None)).unwrap();
        let b = create_or_update_ticker(&conn, &upsert(nyse.id, "B", None)).unwrap();
        assert_ne!(a.id, b.id);
        assert_eq!(get_ticker_by_symbol(&conn, "AAPL").unwrap().unwrap().id, a.id);
    }

    #[test]
    fn test_lookup_by_symbol_and_acronym() {
        let conn = test_conn();
        let nasdaq = get_or_create_exchange(&conn, "NMS").unwrap();
        let nyse = get_or_create_exchange(&conn, "NYQ").unwrap();
        create_or_update_ticker(&conn, &upsert(nasdaq.id, "A", None)).unwrap();
        let b = create_or_update_ticker(&conn, &upsert(nyse.id, "B", None)).unwrap();

        let found = get_ticker_by_symbol_and_acronym(&conn, "AAPL", "NYSE").unwrap().unwrap();
        assert_eq!(found.id, b.id);
        assert!(get_ticker_by_symbol_and_acronym(&conn, "AAPL", "LSE").unwrap().is_none());
    }

    #[test]
    fn test_blank_symbol_rejected() {
        let conn = test_conn();
        let result = create_or_update_ticker(&conn, &TickerUpsert::default());
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[test]
    fn test_live_quote_update() {
        let conn = test_conn();
        let exchange = get_or_create_exchange(&conn, "NMS").unwrap();
        let ticker = create_or_update_ticker(&conn, &upsert(exchange.id, "Apple", None)).unwrap();

        let as_of = chrono::Utc::now();
        update_ticker_live_quote(&conn, ticker.id, 190.0, 188.0, 5000, Some(as_of)).unwrap();

        let reloaded = get_ticker_by_id(&conn, ticker.id).unwrap();
        assert_eq!(reloaded.market_price, 190.0);
        assert_eq!(reloaded.market_prev_close, 188.0);
        assert_eq!(reloaded.market_volume, 5000);
        assert!(reloaded.market_price_datetime.is_some());

        assert!(update_ticker_live_quote(&conn, 9999, 1.0, 1.0, 1, None)
            .unwrap_err()
            .is_not_found());
    }
}
