//! News articles

use crate::db::sqlite::models::Article;
use crate::db::sqlite::require_id;
use crate::error::Result;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};

const COLUMNS: &str =
    "a.id, a.source, a.external_id, a.published_datetime, a.publisher, a.title, a.url, a.article_type";

fn from_row(row: &Row<'_>) -> rusqlite::Result<Article> {
    Ok(Article {
        id: row.get(0)?,
        source: row.get(1)?,
        external_id: row.get(2)?,
        published_datetime: row.get(3)?,
        publisher: row.get(4)?,
        title: row.get(5)?,
        url: row.get(6)?,
        article_type: row.get(7)?,
    })
}

/// Insert an article unless (source, external_id) is known; returns the stored row
pub fn create_article_if_new(conn: &Connection, article: &Article) -> Result<Article> {
    conn.execute(
        "INSERT INTO article (source, external_id, published_datetime, publisher, title, url,
            article_type)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
         ON CONFLICT(source, external_id) DO NOTHING",
        params![
            article.source,
            article.external_id,
            article.published_datetime,
            article.publisher,
            article.title,
            article.url,
            article.article_type,
        ],
    )?;

    let stored = conn.query_row(
        &format!(
            "SELECT {} FROM article a WHERE a.source = ?1 AND a.external_id = ?2",
            COLUMNS
        ),
        params![article.source, article.external_id],
        from_row,
    )?;
    require_id("article", stored.id)?;
    Ok(stored)
}

pub fn link_article_ticker(conn: &Connection, article_id: i64, ticker_id: i64) -> Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO article_ticker (article_id, ticker_id) VALUES (?1, ?2)",
        params![article_id, ticker_id],
    )?;
    Ok(())
}

/// Newest articles across all tickers
pub fn get_recent_articles(conn: &Connection, limit: usize) -> Result<Vec<Article>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM article a ORDER BY a.published_datetime DESC, a.id DESC LIMIT ?",
        COLUMNS
    ))?;

    let articles = stmt
        .query_map([limit as i64], from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(articles)
}

/// Newest articles for one ticker published after `since`
pub fn get_articles_by_ticker(
    conn: &Connection,
    ticker_id: i64,
    since: DateTime<Utc>,
    limit: usize,
) -> Result<Vec<Article>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM article a
         INNER JOIN article_ticker t ON t.article_id = a.id
         WHERE t.ticker_id = ?1 AND a.published_datetime >= ?2
         ORDER BY a.published_datetime DESC, a.id DESC LIMIT ?3",
        COLUMNS
    ))?;

    let articles = stmt
        .query_map(params![ticker_id, since, limit as i64], from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(articles)
}
