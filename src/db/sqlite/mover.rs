//! Market movers

use crate::db::sqlite::models::{Mover, MoverType};
use crate::db::sqlite::require_id;
use crate::error::Result;
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Row};

const COLUMNS: &str = "id, source, ticker_id, mover_date, mover_type, last_price, price_change, \
     price_change_pct, volume";

fn from_row(row: &Row<'_>) -> rusqlite::Result<Mover> {
    let kind: String = row.get(4)?;
    let mover_type = MoverType::parse(&kind).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            4,
            rusqlite::types::Type::Text,
            format!("unknown mover_type {:?}", kind).into(),
        )
    })?;

    Ok(Mover {
        id: row.get(0)?,
        source: row.get(1)?,
        ticker_id: row.get(2)?,
        mover_date: row.get(3)?,
        mover_type,
        last_price: row.get(5)?,
        price_change: row.get(6)?,
        price_change_pct: row.get(7)?,
        volume: row.get(8)?,
    })
}

/// Insert a mover unless one exists for (ticker, date, type)
pub fn create_mover_if_new(conn: &Connection, mover: &Mover) -> Result<Mover> {
    conn.execute(
        "INSERT INTO mover (source, ticker_id, mover_date, mover_type, last_price,
            price_change, price_change_pct, volume)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
         ON CONFLICT(ticker_id, mover_date, mover_type) DO NOTHING",
        params![
            mover.source,
            mover.ticker_id,
            mover.mover_date,
            mover.mover_type.as_str(),
            mover.last_price,
            mover.price_change,
            mover.price_change_pct,
            mover.volume,
        ],
    )?;

    let stored = conn.query_row(
        &format!(
            "SELECT {} FROM mover WHERE ticker_id = ?1 AND mover_date = ?2 AND mover_type = ?3",
            COLUMNS
        ),
        params![mover.ticker_id, mover.mover_date, mover.mover_type.as_str()],
        from_row,
    )?;
    require_id("mover", stored.id)?;
    Ok(stored)
}

pub fn get_latest_movers_date(conn: &Connection) -> Result<Option<NaiveDate>> {
    let date = conn
        .query_row("SELECT MAX(mover_date) FROM mover", [], |row| {
            row.get::<_, Option<NaiveDate>>(0)
        })
        .optional()?
        .flatten();
    Ok(date)
}

pub fn get_movers_by_date(conn: &Connection, date: NaiveDate) -> Result<Vec<Mover>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM mover WHERE mover_date = ? ORDER BY id",
        COLUMNS
    ))?;

    let movers = stmt
        .query_map([date], from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(movers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::{test_conn, test_ticker};

    fn mover(ticker_id: i64, date: &str, kind: MoverType, pct: f64) -> Mover {
        Mover {
            id: 0,
            source: "msfinance".to_string(),
            ticker_id,
            mover_date: date.parse().unwrap(),
            mover_type: kind,
            last_price: 10.0,
            price_change: 1.0,
            price_change_pct: pct,
            volume: 100,
        }
    }

    #[test]
    fn test_mover_create_if_new() {
        let conn = test_conn();
        let ticker = test_ticker(&conn, "NVDA");

        let first = create_mover_if_new(&conn, &mover(ticker.id, "2024-03-04", MoverType::Gainer, 4.0)).unwrap();
        let again = create_mover_if_new(&conn, &mover(ticker.id, "2024-03-04", MoverType::Gainer, 9.0)).unwrap();
        assert_eq!(first.id, again.id);
        assert_eq!(again.price_change_pct, 4.0);

        // Same ticker and day but another list is a separate row
        let active = create_mover_if_new(&conn, &mover(ticker.id, "2024-03-04", MoverType::Active, 4.0)).unwrap();
        assert_ne!(first.id, active.id);
    }

    #[test]
    fn test_latest_date() {
        let conn = test_conn();
        assert!(get_latest_movers_date(&conn).unwrap().is_none());

        let ticker = test_ticker(&conn, "NVDA");
        create_mover_if_new(&conn, &mover(ticker.id, "2024-03-01", MoverType::Gainer, 1.0)).unwrap();
        create_mover_if_new(&conn, &mover(ticker.id, "2024-03-04", MoverType::Loser, -1.0)).unwrap();

        let latest = get_latest_movers_date(&conn).unwrap().unwrap();
        assert_eq!(latest.to_string(), "2024-03-04");

        let movers = get_movers_by_date(&conn, latest).unwrap();
        assert_eq!(movers.len(), 1);
        assert_eq!(movers[0].mover_type, MoverType::Loser);
    }
}
