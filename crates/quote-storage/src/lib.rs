//! # quote-storage
//!
//! SQLite persistence for coins, append-only quote history, users,
//! favorites and refresh control. Schema is created on startup.
//!
//! Timestamps are stored as fixed-width UTC text
//! (`2024-01-02T03:04:05.000000Z`) so lexical order equals chronological
//! order. Prices are stored as the exact decimal text received.

mod models;
mod repository;

pub use repository::{
    SqliteCoinRepository, SqliteFavoritesRepository, SqliteQuoteRepository,
    SqliteRefreshControlRepository, SqliteUserRepository,
};

use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;

use quote_core::{QuoteError, Result};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6fZ";

pub(crate) fn format_ts(at: DateTime<Utc>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

pub(crate) fn parse_ts(raw: &str) -> Result<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.fZ")
        .map(|naive| naive.and_utc())
        .map_err(|e| QuoteError::Storage(format!("bad stored timestamp {raw:?}: {e}")))
}

pub(crate) fn storage(err: sqlx::Error) -> QuoteError {
    QuoteError::Storage(err.to_string())
}

/// Open (creating if missing) the database and ensure the schema exists
pub async fn init_database(database_url: &str) -> Result<SqlitePool> {
    tracing::info!(url = %database_url, "Initializing SQLite database");

    let options = SqliteConnectOptions::from_str(database_url)
        .map_err(storage)?
        .create_if_missing(true)
        .foreign_keys(true);

    // Every connection to `:memory:` is its own database
    let max_connections = if database_url.contains(":memory:") { 1 } else { 5 };

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await
        .map_err(storage)?;

    create_tables(&pool).await?;

    tracing::info!("Database ready");
    Ok(pool)
}

async fn create_tables(pool: &SqlitePool) -> Result<()> {
    let statements = [
        "CREATE TABLE IF NOT EXISTS coins (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            symbol TEXT NOT NULL UNIQUE,
            enabled BOOLEAN NOT NULL DEFAULT 1,
            coingecko_id TEXT,
            binance_symbol TEXT
        )",
        "CREATE TABLE IF NOT EXISTS quotes (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            coin_id INTEGER NOT NULL REFERENCES coins(id),
            symbol TEXT NOT NULL,
            provider TEXT NOT NULL,
            currency TEXT NOT NULL,
            price TEXT NOT NULL,
            quoted_at TEXT NOT NULL,
            created_at TEXT NOT NULL
        )",
        "CREATE INDEX IF NOT EXISTS idx_quotes_symbol_quoted_at ON quotes (symbol, quoted_at DESC)",
        "CREATE INDEX IF NOT EXISTS idx_quotes_quoted_at ON quotes (quoted_at DESC)",
        "CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            email TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            password_hash TEXT NOT NULL,
            created_at TEXT NOT NULL
        )",
        "CREATE TABLE IF NOT EXISTS user_favorites (
            user_id INTEGER NOT NULL REFERENCES users(id),
            coin_id INTEGER NOT NULL REFERENCES coins(id),
            created_at TEXT NOT NULL,
            PRIMARY KEY (user_id, coin_id)
        )",
        "CREATE TABLE IF NOT EXISTS refresh_control (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )",
    ];

    for sql in statements {
        sqlx::query(sql).execute(pool).await.map_err(storage)?;
    }
    Ok(())
}
