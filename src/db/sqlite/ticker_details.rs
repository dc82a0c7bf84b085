//! Ticker enrichment: description, analyst up/downgrades, attributes, splits

use crate::db::sqlite::models::{TickerAttribute, TickerDescription, TickerSplit, TickerUpDown};
use crate::db::sqlite::require_id;
use crate::error::{AppError, Result};
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};

// ========== Description ==========

pub fn get_description(conn: &Connection, ticker_id: i64) -> Result<Option<TickerDescription>> {
    let description = conn
        .query_row(
            "SELECT id, ticker_id, business_summary FROM ticker_description WHERE ticker_id = ?",
            [ticker_id],
            |row| {
                Ok(TickerDescription {
                    id: row.get(0)?,
                    ticker_id: row.get(1)?,
                    business_summary: row.get(2)?,
                })
            },
        )
        .optional()?;
    Ok(description)
}

pub fn create_or_update_description(
    conn: &Connection,
    ticker_id: i64,
    business_summary: &str,
) -> Result<TickerDescription> {
    conn.execute(
        "INSERT INTO ticker_description (ticker_id, business_summary) VALUES (?1, ?2)
         ON CONFLICT(ticker_id) DO UPDATE SET
            business_summary = excluded.business_summary,
            updated_at = datetime('now')",
        params![ticker_id, business_summary],
    )?;

    let description = get_description(conn, ticker_id)?.ok_or_else(|| {
        AppError::Invariant(format!("Description for ticker {} missing after upsert", ticker_id))
    })?;
    require_id("ticker_description", description.id)?;
    Ok(description)
}

// ========== Up/Downgrades ==========

/// Insert an up/downgrade unless one exists for (ticker, date, firm)
pub fn create_updown_if_new(conn: &Connection, updown: &TickerUpDown) -> Result<TickerUpDown> {
    conn.execute(
        "INSERT INTO ticker_updown (ticker_id, updown_action, updown_from_grade,
            updown_to_grade, updown_date, updown_firm)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(ticker_id, updown_date, updown_firm) DO NOTHING",
        params![
            updown.ticker_id,
            updown.updown_action,
            updown.updown_from_grade,
            updown.updown_to_grade,
            updown.updown_date,
            updown.updown_firm,
        ],
    )?;

    let stored = conn.query_row(
        "SELECT id, ticker_id, updown_action, updown_from_grade, updown_to_grade,
            updown_date, updown_firm
         FROM ticker_updown WHERE ticker_id = ?1 AND updown_date = ?2 AND updown_firm = ?3",
        params![updown.ticker_id, updown.updown_date, updown.updown_firm],
        updown_from_row,
    )?;
    require_id("ticker_updown", stored.id)?;
    Ok(stored)
}

/// Up/downgrades on or after `since`, newest first
pub fn get_updowns_since(
    conn: &Connection,
    ticker_id: i64,
    since: NaiveDate,
) -> Result<Vec<TickerUpDown>> {
    let mut stmt = conn.prepare(
        "SELECT id, ticker_id, updown_action, updown_from_grade, updown_to_grade,
            updown_date, updown_firm
         FROM ticker_updown WHERE ticker_id = ?1 AND updown_date >= ?2
         ORDER BY updown_date DESC, updown_firm",
    )?;

    let updowns = stmt
        .query_map(params![ticker_id, since], updown_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(updowns)
}

fn updown_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<TickerUpDown> {
    Ok(TickerUpDown {
        id: row.get(0)?,
        ticker_id: row.get(1)?,
        updown_action: row.get(2)?,
        updown_from_grade: row.get(3)?,
        updown_to_grade: row.get(4)?,
        updown_date: row.get(5)?,
        updown_firm: row.get(6)?,
    })
}

// ========== Attributes ==========

pub fn create_or_update_attribute(
    conn: &Connection,
    ticker_id: i64,
    name: &str,
    comment: &str,
    value: &str,
) -> Result<()> {
    conn.execute(
        "INSERT INTO ticker_attribute (ticker_id, attribute_name, attribute_comment, attribute_value)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(ticker_id, attribute_name) DO UPDATE SET
            attribute_comment = excluded.attribute_comment,
            attribute_value = excluded.attribute_value,
            updated_at = datetime('now')",
        params![ticker_id, name, comment, value],
    )?;
    Ok(())
}

/// Attributes with a non-empty value, by name
pub fn get_attributes(conn: &Connection, ticker_id: i64) -> Result<Vec<TickerAttribute>> {
    let mut stmt = conn.prepare(
        "SELECT id, ticker_id, attribute_name, attribute_comment, attribute_value
         FROM ticker_attribute WHERE ticker_id = ? AND attribute_value != ''
         ORDER BY attribute_name",
    )?;

    let attributes = stmt
        .query_map([ticker_id], |row| {
            Ok(TickerAttribute {
                id: row.get(0)?,
                ticker_id: row.get(1)?,
                attribute_name: row.get(2)?,
                attribute_comment: row.get(3)?,
                attribute_value: row.get(4)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(attributes)
}

// ========== Splits ==========

pub fn create_split_if_new(
    conn: &Connection,
    ticker_id: i64,
    split_date: NaiveDate,
    split_ratio: &str,
) -> Result<()> {
    conn.execute(
        "INSERT INTO ticker_split (ticker_id, split_date, split_ratio) VALUES (?1, ?2, ?3)
         ON CONFLICT(ticker_id, split_date) DO NOTHING",
        params![ticker_id, split_date, split_ratio],
    )?;
    Ok(())
}

/// Splits, newest first
pub fn get_splits(conn: &Connection, ticker_id: i64) -> Result<Vec<TickerSplit>> {
    let mut stmt = conn.prepare(
        "SELECT id, ticker_id, split_date, split_ratio FROM ticker_split
         WHERE ticker_id = ? ORDER BY split_date DESC",
    )?;

    let splits = stmt
        .query_map([ticker_id], |row| {
            Ok(TickerSplit {
                id: row.get(0)?,
                ticker_id: row.get(1)?,
                split_date: row.get(2)?,
                split_ratio: row.get(3)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(splits)
}
