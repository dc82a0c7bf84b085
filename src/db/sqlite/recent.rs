//! Global "recently viewed" tickers

use crate::db::sqlite::models::Recent;
use crate::error::Result;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

pub fn touch_recent(conn: &Connection, ticker_id: i64, seen_at: DateTime<Utc>) -> Result<()> {
    conn.execute(
        "INSERT INTO recent (ticker_id, lastseen_datetime) VALUES (?1, ?2)
         ON CONFLICT(ticker_id) DO UPDATE SET lastseen_datetime = excluded.lastseen_datetime",
        params![ticker_id, seen_at],
    )?;
    Ok(())
}

/// Most recently seen first
pub fn get_recents(conn: &Connection, limit: usize) -> Result<Vec<Recent>> {
    let mut stmt = conn.prepare(
        "SELECT ticker_id, lastseen_datetime FROM recent
         ORDER BY lastseen_datetime DESC LIMIT ?",
    )?;

    let recents = stmt
        .query_map([limit as i64], |row| {
            Ok(Recent {
                ticker_id: row.get(0)?,
                lastseen_datetime: row.get(1)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(recents)
}
