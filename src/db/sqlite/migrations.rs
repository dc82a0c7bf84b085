//! SQLite database migrations

use crate::error::Result;
use rusqlite::Connection;

/// Run all database migrations
pub fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS migrations (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
        [],
    )?;

    run_migration(conn, "001_exchange", CREATE_EXCHANGE_TABLE)?;
    run_migration(conn, "002_ticker", CREATE_TICKER_TABLE)?;
    run_migration(conn, "003_ticker_daily", CREATE_TICKER_DAILY_TABLE)?;
    run_migration(conn, "004_ticker_details", CREATE_TICKER_DETAIL_TABLES)?;
    run_migration(conn, "005_mover", CREATE_MOVER_TABLE)?;
    run_migration(conn, "006_lastdone", CREATE_LASTDONE_TABLE)?;
    run_migration(conn, "007_article", CREATE_ARTICLE_TABLES)?;
    run_migration(conn, "008_recent", CREATE_RECENT_TABLE)?;
    run_migration(conn, "009_seed_exchanges", SEED_EXCHANGES)?;
    run_migration(conn, "010_ticker_intraday", CREATE_TICKER_INTRADAY_TABLE)?;

    tracing::info!("Database migrations completed");
    Ok(())
}

fn run_migration(conn: &Connection, name: &str, sql: &str) -> Result<()> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM migrations WHERE name = ?)",
        [name],
        |row| row.get(0),
    )?;

    if !exists {
        tracing::info!("Running migration: {}", name);
        conn.execute_batch(sql)?;
        conn.execute("INSERT INTO migrations (name) VALUES (?)", [name])?;
    }

    Ok(())
}

const CREATE_EXCHANGE_TABLE: &str = r#"
CREATE TABLE exchange (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    exchange_code TEXT NOT NULL UNIQUE,
    exchange_acronym TEXT NOT NULL DEFAULT '',
    exchange_mic TEXT NOT NULL DEFAULT '',
    exchange_name TEXT NOT NULL DEFAULT '',
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;

const CREATE_TICKER_TABLE: &str = r#"
CREATE TABLE ticker (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    ticker_symbol TEXT NOT NULL,
    exchange_id INTEGER NOT NULL REFERENCES exchange(id),
    ticker_type TEXT NOT NULL DEFAULT '',
    ticker_market TEXT NOT NULL DEFAULT '',
    ticker_name TEXT NOT NULL DEFAULT '',
    company_name TEXT NOT NULL DEFAULT '',
    address TEXT NOT NULL DEFAULT '',
    city TEXT NOT NULL DEFAULT '',
    state TEXT NOT NULL DEFAULT '',
    zip TEXT NOT NULL DEFAULT '',
    country TEXT NOT NULL DEFAULT '',
    website TEXT NOT NULL DEFAULT '',
    phone TEXT NOT NULL DEFAULT '',
    sector TEXT NOT NULL DEFAULT '',
    industry TEXT NOT NULL DEFAULT '',
    market_price REAL NOT NULL DEFAULT 0,
    market_prev_close REAL NOT NULL DEFAULT 0,
    market_volume INTEGER NOT NULL DEFAULT 0,
    market_price_datetime TEXT,
    fetch_datetime TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
    UNIQUE(ticker_symbol, exchange_id)
);
CREATE INDEX IF NOT EXISTS idx_ticker_symbol ON ticker(ticker_symbol);
"#;

const CREATE_TICKER_DAILY_TABLE: &str = r#"
CREATE TABLE ticker_daily (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    ticker_id INTEGER NOT NULL REFERENCES ticker(id),
    price_date TEXT NOT NULL,
    price_time TEXT NOT NULL DEFAULT '00:00:00',
    open_price REAL NOT NULL DEFAULT 0,
    high_price REAL NOT NULL DEFAULT 0,
    low_price REAL NOT NULL DEFAULT 0,
    close_price REAL NOT NULL DEFAULT 0,
    volume REAL NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
    UNIQUE(ticker_id, price_date)
);
"#;

const CREATE_TICKER_DETAIL_TABLES: &str = r#"
CREATE TABLE ticker_description (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    ticker_id INTEGER NOT NULL UNIQUE REFERENCES ticker(id),
    business_summary TEXT NOT NULL DEFAULT '',
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE ticker_updown (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    ticker_id INTEGER NOT NULL REFERENCES ticker(id),
    updown_action TEXT NOT NULL DEFAULT '',
    updown_from_grade TEXT NOT NULL DEFAULT '',
    updown_to_grade TEXT NOT NULL DEFAULT '',
    updown_date TEXT NOT NULL,
    updown_firm TEXT NOT NULL,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    UNIQUE(ticker_id, updown_date, updown_firm)
);

CREATE TABLE ticker_attribute (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    ticker_id INTEGER NOT NULL REFERENCES ticker(id),
    attribute_name TEXT NOT NULL,
    attribute_comment TEXT NOT NULL DEFAULT '',
    attribute_value TEXT NOT NULL DEFAULT '',
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
    UNIQUE(ticker_id, attribute_name)
);

CREATE TABLE ticker_split (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    ticker_id INTEGER NOT NULL REFERENCES ticker(id),
    split_date TEXT NOT NULL,
    split_ratio TEXT NOT NULL DEFAULT '',
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    UNIQUE(ticker_id, split_date)
);
"#;

const CREATE_MOVER_TABLE: &str = r#"
CREATE TABLE mover (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    source TEXT NOT NULL,
    ticker_id INTEGER NOT NULL REFERENCES ticker(id),
    mover_date TEXT NOT NULL,
    mover_type TEXT NOT NULL CHECK (mover_type IN ('gainer', 'loser', 'active')),
    last_price REAL NOT NULL DEFAULT 0,
    price_change REAL NOT NULL DEFAULT 0,
    price_change_pct REAL NOT NULL DEFAULT 0,
    volume INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    UNIQUE(ticker_id, mover_date, mover_type)
);
CREATE INDEX IF NOT EXISTS idx_mover_date ON mover(mover_date);
"#;

const CREATE_LASTDONE_TABLE: &str = r#"
CREATE TABLE lastdone (
    activity TEXT NOT NULL,
    unique_key TEXT NOT NULL,
    last_status TEXT NOT NULL,
    lastdone_datetime TEXT NOT NULL,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (activity, unique_key)
);
"#;

const CREATE_ARTICLE_TABLES: &str = r#"
CREATE TABLE article (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    source TEXT NOT NULL,
    external_id TEXT NOT NULL,
    published_datetime TEXT,
    publisher TEXT NOT NULL DEFAULT '',
    title TEXT NOT NULL DEFAULT '',
    url TEXT NOT NULL DEFAULT '',
    article_type TEXT NOT NULL DEFAULT '',
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    UNIQUE(source, external_id)
);
CREATE INDEX IF NOT EXISTS idx_article_published ON article(published_datetime);

CREATE TABLE article_ticker (
    article_id INTEGER NOT NULL REFERENCES article(id),
    ticker_id INTEGER NOT NULL REFERENCES ticker(id),
    PRIMARY KEY (article_id, ticker_id)
);
"#;

const CREATE_RECENT_TABLE: &str = r#"
CREATE TABLE recent (
    ticker_id INTEGER PRIMARY KEY REFERENCES ticker(id),
    lastseen_datetime TEXT NOT NULL
);
"#;

const CREATE_TICKER_INTRADAY_TABLE: &str = r#"
CREATE TABLE ticker_intraday (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    ticker_id INTEGER NOT NULL REFERENCES ticker(id),
    price_date TEXT NOT NULL,
    price_datetime TEXT NOT NULL,
    last_price REAL NOT NULL,
    volume REAL NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
    UNIQUE(ticker_id, price_datetime)
);
CREATE INDEX IF NOT EXISTS idx_ticker_intraday_date ON ticker_intraday(ticker_id, price_date);
"#;

// Yahoo only reports its own exchange codes, so the well-known ones are
// mapped up front. Unknown codes are created on first sight.
const SEED_EXCHANGES: &str = r#"
INSERT OR IGNORE INTO exchange (exchange_code, exchange_acronym, exchange_mic, exchange_name) VALUES
    ('NMS', 'NASDAQ', 'XNAS', 'NASDAQ Global Select'),
    ('NGM', 'NASDAQ', 'XNAS', 'NASDAQ Global Market'),
    ('NCM', 'NASDAQ', 'XNAS', 'NASDAQ Capital Market'),
    ('NYQ', 'NYSE', 'XNYS', 'New York Stock Exchange'),
    ('ASE', 'AMEX', 'XASE', 'NYSE American'),
    ('PCX', 'ARCA', 'ARCX', 'NYSE Arca'),
    ('BTS', 'BATS', 'BATS', 'Cboe BZX');
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_are_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        run_migrations(&conn).unwrap();

        let applied: i64 = conn
            .query_row("SELECT COUNT(*) FROM migrations", [], |row| row.get(0))
            .unwrap();
        assert_eq!(applied, 10);

        let nasdaq: String = conn
            .query_row(
                "SELECT exchange_acronym FROM exchange WHERE exchange_code = 'NMS'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(nasdaq, "NASDAQ");
    }
}
