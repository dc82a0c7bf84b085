//! Last-run ledger

use crate::db::sqlite::models::LastDone;
use crate::error::Result;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

pub fn get_lastdone(conn: &Connection, activity: &str, unique_key: &str) -> Result<Option<LastDone>> {
    let lastdone = conn
        .query_row(
            "SELECT activity, unique_key, last_status, lastdone_datetime
             FROM lastdone WHERE activity = ?1 AND unique_key = ?2",
            params![activity, unique_key],
            |row| {
                Ok(LastDone {
                    activity: row.get(0)?,
                    unique_key: row.get(1)?,
                    last_status: row.get(2)?,
                    lastdone_datetime: row.get(3)?,
                })
            },
        )
        .optional()?;
    Ok(lastdone)
}

/// Record an outcome for (activity, unique_key), replacing the previous one
pub fn record_lastdone(
    conn: &Connection,
    activity: &str,
    unique_key: &str,
    status: &str,
    at: DateTime<Utc>,
) -> Result<()> {
    conn.execute(
        "INSERT INTO lastdone (activity, unique_key, last_status, lastdone_datetime)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(activity, unique_key) DO UPDATE SET
            last_status = excluded.last_status,
            lastdone_datetime = excluded.lastdone_datetime,
            updated_at = datetime('now')",
        params![activity, unique_key, status, at],
    )?;
    Ok(())
}
