//! End-of-day prices

use crate::db::sqlite::models::TickerDaily;
use crate::db::sqlite::require_id;
use crate::error::{AppError, Result};
use chrono::NaiveDate;
use rusqlite::{params, Connection, Row};

const COLUMNS: &str =
    "id, ticker_id, price_date, price_time, open_price, high_price, low_price, close_price, volume";

/// A daily row at this exchange-local time is a settled close
const LOCKED_OPEN_TIME: &str = "09:30:00";
const MARKET_CLOSE_TIME: &str = "16:00:00";

fn from_row(row: &Row<'_>) -> rusqlite::Result<TickerDaily> {
    Ok(TickerDaily {
        id: row.get(0)?,
        ticker_id: row.get(1)?,
        price_date: row.get(2)?,
        price_time: row.get(3)?,
        open_price: row.get(4)?,
        high_price: row.get(5)?,
        low_price: row.get(6)?,
        close_price: row.get(7)?,
        volume: row.get(8)?,
    })
}

/// Insert or update the price row for (ticker, date)
pub fn create_or_update_daily(conn: &Connection, daily: &TickerDaily) -> Result<TickerDaily> {
    conn.execute(
        "INSERT INTO ticker_daily (ticker_id, price_date, price_time, open_price, high_price,
            low_price, close_price, volume)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
         ON CONFLICT(ticker_id, price_date) DO UPDATE SET
            price_time = excluded.price_time,
            open_price = excluded.open_price,
            high_price = excluded.high_price,
            low_price = excluded.low_price,
            close_price = excluded.close_price,
            volume = excluded.volume,
            updated_at = datetime('now')",
        params![
            daily.ticker_id,
            daily.price_date,
            daily.price_time,
            daily.open_price,
            daily.high_price,
            daily.low_price,
            daily.close_price,
            daily.volume,
        ],
    )?;

    let stored = conn
        .query_row(
            &format!(
                "SELECT {} FROM ticker_daily WHERE ticker_id = ?1 AND price_date = ?2",
                COLUMNS
            ),
            params![daily.ticker_id, daily.price_date],
            from_row,
        )
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => AppError::Invariant(format!(
                "Daily {} for ticker {} missing after upsert",
                daily.price_date, daily.ticker_id
            )),
            _ => e.into(),
        })?;
    require_id("ticker_daily", stored.id)?;
    Ok(stored)
}

/// Newest two closes, newest first (fewer when history is short)
pub fn get_last_two_dailies(conn: &Connection, ticker_id: i64) -> Result<Vec<TickerDaily>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM ticker_daily WHERE ticker_id = ? ORDER BY price_date DESC LIMIT 2",
        COLUMNS
    ))?;

    let dailies = stmt
        .query_map([ticker_id], from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(dailies)
}

/// `up`, `down`, `unchanged` or `unknown` comparing the newest two closes
pub fn get_last_daily_move(conn: &Connection, ticker_id: i64) -> Result<String> {
    let dailies = get_last_two_dailies(conn, ticker_id)?;
    let direction = match dailies.as_slice() {
        [last, prior] => crate::util::move_direction(last.close_price - prior.close_price),
        _ => "unknown",
    };
    Ok(direction.to_string())
}

/// Dailies on or after `since`, oldest first
pub fn get_dailies_since(
    conn: &Connection,
    ticker_id: i64,
    since: NaiveDate,
) -> Result<Vec<TickerDaily>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM ticker_daily WHERE ticker_id = ?1 AND price_date >= ?2
         ORDER BY price_date ASC",
        COLUMNS
    ))?;

    let dailies = stmt
        .query_map(params![ticker_id, since], from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(dailies)
}

/// Whether a settled close exists for `date`.
///
/// A row written mid-session carries the fetch time; only rows stamped at
/// the open or at/after the close count as settled.
pub fn have_eod_for_date(conn: &Connection, ticker_id: i64, date: NaiveDate) -> Result<bool> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM ticker_daily
            WHERE ticker_id = ?1 AND price_date = ?2 AND (price_time = ?3 OR price_time >= ?4))",
        params![ticker_id, date, LOCKED_OPEN_TIME, MARKET_CLOSE_TIME],
        |row| row.get(0),
    )?;
    Ok(exists)
}
