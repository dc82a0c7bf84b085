//! Exchanges

use crate::db::sqlite::models::Exchange;
use crate::db::sqlite::require_id;
use crate::error::{AppError, Result};
use rusqlite::{params, Connection, OptionalExtension, Row};

const COLUMNS: &str = "id, exchange_code, exchange_acronym, exchange_mic, exchange_name";

fn from_row(row: &Row<'_>) -> rusqlite::Result<Exchange> {
    Ok(Exchange {
        id: row.get(0)?,
        exchange_code: row.get(1)?,
        exchange_acronym: row.get(2)?,
        exchange_mic: row.get(3)?,
        exchange_name: row.get(4)?,
    })
}

pub fn get_exchange_by_code(conn: &Connection, code: &str) -> Result<Option<Exchange>> {
    let exchange = conn
        .query_row(
            &format!("SELECT {} FROM exchange WHERE exchange_code = ?", COLUMNS),
            [code],
            from_row,
        )
        .optional()?;
    Ok(exchange)
}

pub fn get_exchange_by_id(conn: &Connection, id: i64) -> Result<Exchange> {
    conn.query_row(
        &format!("SELECT {} FROM exchange WHERE id = ?", COLUMNS),
        [id],
        from_row,
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => {
            AppError::NotFound(format!("Exchange not found: {}", id))
        }
        _ => e.into(),
    })
}

/// Find the exchange for `code`, creating a bare row if it is new
pub fn get_or_create_exchange(conn: &Connection, code: &str) -> Result<Exchange> {
    if code.trim().is_empty() {
        return Err(AppError::Validation("Exchange code is empty".to_string()));
    }

    if let Some(exchange) = get_exchange_by_code(conn, code)? {
        return Ok(exchange);
    }

    conn.execute(
        "INSERT INTO exchange (exchange_code, exchange_acronym) VALUES (?1, ?1)
         ON CONFLICT(exchange_code) DO NOTHING",
        params![code],
    )?;
    tracing::info!("Created exchange for code {}", code);

    let exchange = get_exchange_by_code(conn, code)?
        .ok_or_else(|| AppError::Invariant(format!("Exchange {} missing after insert", code)))?;
    require_id("exchange", exchange.id)?;
    Ok(exchange)
}
