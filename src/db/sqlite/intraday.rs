//! Intraday price moments

use crate::db::sqlite::models::TickerIntraday;
use crate::error::Result;
use chrono::NaiveDate;
use rusqlite::{params, Connection, Row};

const COLUMNS: &str = "id, ticker_id, price_date, price_datetime, last_price, volume";

fn from_row(row: &Row<'_>) -> rusqlite::Result<TickerIntraday> {
    Ok(TickerIntraday {
        id: row.get(0)?,
        ticker_id: row.get(1)?,
        price_date: row.get(2)?,
        price_datetime: row.get(3)?,
        last_price: row.get(4)?,
        volume: row.get(5)?,
    })
}

/// Insert or update the moment for (ticker, instant)
pub fn create_or_update_intraday(conn: &Connection, moment: &TickerIntraday) -> Result<()> {
    conn.execute(
        "INSERT INTO ticker_intraday (ticker_id, price_date, price_datetime, last_price, volume)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(ticker_id, price_datetime) DO UPDATE SET
            last_price = excluded.last_price,
            volume = excluded.volume,
            updated_at = datetime('now')",
        params![
            moment.ticker_id,
            moment.price_date,
            moment.price_datetime,
            moment.last_price,
            moment.volume,
        ],
    )?;
    Ok(())
}

pub fn count_intradays(conn: &Connection, ticker_id: i64, date: NaiveDate) -> Result<usize> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM ticker_intraday WHERE ticker_id = ?1 AND price_date = ?2",
        params![ticker_id, date],
        |row| row.get(0),
    )?;
    Ok(count.max(0) as usize)
}

/// Moments of one trading day, oldest first
pub fn get_intradays(conn: &Connection, ticker_id: i64, date: NaiveDate) -> Result<Vec<TickerIntraday>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM ticker_intraday WHERE ticker_id = ?1 AND price_date = ?2
         ORDER BY price_datetime ASC",
        COLUMNS
    ))?;

    let moments = stmt
        .query_map(params![ticker_id, date], from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(moments)
}
