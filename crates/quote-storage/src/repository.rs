//! SQLite Repositories
//!
//! One repository per table, each holding a clone of the shared pool.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqlitePool;
use sqlx::{QueryBuilder, Sqlite};

use quote_core::model::{format_rfc3339, parse_rfc3339};
use quote_core::{
    Coin, CoinRepository, FavoritesRepository, NewQuote, NewUser, Quote, QuoteError, QuoteFilter,
    QuotePage, QuoteRepository, RefreshControlRepository, Result, User, UserRepository,
};

use crate::models::{CoinRecord, QuoteRecord, UserRecord};
use crate::{format_ts, storage};

const COIN_COLUMNS: &str = "id, symbol, enabled, coingecko_id, binance_symbol";
const QUOTE_COLUMNS: &str = "id, coin_id, symbol, provider, currency, price, quoted_at, created_at";

const LAST_MANUAL_REFRESH_KEY: &str = "last_manual_refresh_at";

// ---------------------------------------------------------------------------
// Coins
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct SqliteCoinRepository {
    pool: SqlitePool,
}

impl SqliteCoinRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CoinRepository for SqliteCoinRepository {
    async fn get_enabled_by_symbol(&self, symbol: &str) -> Result<Option<Coin>> {
        let sql = format!("SELECT {COIN_COLUMNS} FROM coins WHERE symbol = ? AND enabled = 1");
        let row = sqlx::query_as::<_, CoinRecord>(&sql)
            .bind(symbol)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage)?;
        Ok(row.map(Coin::from))
    }

    async fn list_enabled(&self) -> Result<Vec<Coin>> {
        let sql = format!("SELECT {COIN_COLUMNS} FROM coins WHERE enabled = 1 ORDER BY symbol");
        let rows = sqlx::query_as::<_, CoinRecord>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(storage)?;
        Ok(rows.into_iter().map(Coin::from).collect())
    }

    async fn get_by_symbol(&self, symbol: &str) -> Result<Option<Coin>> {
        let sql = format!("SELECT {COIN_COLUMNS} FROM coins WHERE symbol = ?");
        let row = sqlx::query_as::<_, CoinRecord>(&sql)
            .bind(symbol)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage)?;
        Ok(row.map(Coin::from))
    }

    async fn upsert(&self, coin: &Coin) -> Result<Coin> {
        let sql = format!(
            "INSERT INTO coins (symbol, enabled, coingecko_id, binance_symbol)
             VALUES (?, ?, ?, ?)
             ON CONFLICT(symbol) DO UPDATE SET
                enabled = excluded.enabled,
                coingecko_id = excluded.coingecko_id,
                binance_symbol = excluded.binance_symbol
             RETURNING {COIN_COLUMNS}"
        );
        let row = sqlx::query_as::<_, CoinRecord>(&sql)
            .bind(&coin.symbol)
            .bind(coin.enabled)
            .bind(&coin.coingecko_id)
            .bind(&coin.binance_symbol)
            .fetch_one(&self.pool)
            .await
            .map_err(storage)?;

        tracing::debug!(symbol = %row.symbol, id = row.id, "Coin upserted");
        Ok(row.into())
    }
}

// ---------------------------------------------------------------------------
// Quotes
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct SqliteQuoteRepository {
    pool: SqlitePool,
}

impl SqliteQuoteRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

/// Append the WHERE clauses shared by the page query and the count query.
///
/// Price bounds are compared as REAL, but both sides go through the same
/// text-to-REAL conversion, so a bound equal to a stored price always
/// matches it. Distinct prices only tie when they agree to about 15
/// significant digits. Stored text is never rewritten.
fn push_filters(qb: &mut QueryBuilder<'_, Sqlite>, filter: &QuoteFilter) {
    qb.push(" WHERE 1 = 1");
    if let Some(symbol) = &filter.symbol {
        qb.push(" AND symbol = ").push_bind(symbol.clone());
    }
    if let Some(provider) = &filter.provider {
        qb.push(" AND provider = ").push_bind(provider.clone());
    }
    if let Some(currency) = &filter.currency {
        qb.push(" AND currency = ").push_bind(currency.clone());
    }
    if let Some(min) = filter.min_price {
        qb.push(" AND CAST(price AS REAL) >= CAST(").push_bind(min.to_string()).push(" AS REAL)");
    }
    if let Some(max) = filter.max_price {
        qb.push(" AND CAST(price AS REAL) <= CAST(").push_bind(max.to_string()).push(" AS REAL)");
    }
    if let Some(from) = filter.from {
        qb.push(" AND quoted_at >= ").push_bind(format_ts(from));
    }
    if let Some(to) = filter.to {
        qb.push(" AND quoted_at <= ").push_bind(format_ts(to));
    }
}

#[async_trait]
impl QuoteRepository for SqliteQuoteRepository {
    async fn insert(&self, quote: &NewQuote) -> Result<Quote> {
        let sql = format!(
            "INSERT INTO quotes (coin_id, symbol, provider, currency, price, quoted_at, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             RETURNING {QUOTE_COLUMNS}"
        );
        let row = sqlx::query_as::<_, QuoteRecord>(&sql)
            .bind(quote.coin_id)
            .bind(&quote.symbol)
            .bind(&quote.provider)
            .bind(&quote.currency)
            .bind(&quote.price)
            .bind(format_ts(quote.quoted_at))
            .bind(format_ts(Utc::now()))
            .fetch_one(&self.pool)
            .await
            .map_err(storage)?;
        row.into_quote()
    }

    async fn get_latest(
        &self,
        symbol: &str,
        provider: Option<&str>,
        currency: Option<&str>,
    ) -> Result<Option<Quote>> {
        let mut qb = QueryBuilder::<Sqlite>::new(format!("SELECT {QUOTE_COLUMNS} FROM quotes"));
        qb.push(" WHERE symbol = ").push_bind(symbol.to_string());
        if let Some(provider) = provider {
            qb.push(" AND provider = ").push_bind(provider.to_string());
        }
        if let Some(currency) = currency {
            qb.push(" AND currency = ").push_bind(currency.to_string());
        }
        qb.push(" ORDER BY quoted_at DESC, id DESC LIMIT 1");

        let row: Option<QuoteRecord> = qb
            .build_query_as()
            .fetch_optional(&self.pool)
            .await
            .map_err(storage)?;
        row.map(QuoteRecord::into_quote).transpose()
    }

    async fn list(&self, filter: &QuoteFilter) -> Result<QuotePage> {
        let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM quotes");
        push_filters(&mut count, filter);
        let total: i64 = count
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await
            .map_err(storage)?;

        let mut page = QueryBuilder::<Sqlite>::new(format!("SELECT {QUOTE_COLUMNS} FROM quotes"));
        push_filters(&mut page, filter);
        page.push(" ORDER BY quoted_at DESC, id DESC LIMIT ")
            .push_bind(i64::from(filter.page_size))
            .push(" OFFSET ")
            .push_bind(i64::try_from(filter.offset()).unwrap_or(i64::MAX));

        let rows: Vec<QuoteRecord> = page
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(storage)?;

        let items = rows
            .into_iter()
            .map(QuoteRecord::into_quote)
            .collect::<Result<Vec<_>>>()?;

        Ok(QuotePage {
            items,
            total: u64::try_from(total).unwrap_or(0),
        })
    }
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct SqliteUserRepository {
    pool: SqlitePool,
}

impl SqliteUserRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for SqliteUserRepository {
    async fn exists_by_email(&self, email: &str) -> Result<bool> {
        let found: Option<i64> = sqlx::query_scalar("SELECT 1 FROM users WHERE email = ?")
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage)?;
        Ok(found.is_some())
    }

    async fn create(&self, user: &NewUser) -> Result<User> {
        let row = sqlx::query_as::<_, UserRecord>(
            "INSERT INTO users (email, name, password_hash, created_at)
             VALUES (?, ?, ?, ?)
             RETURNING id, email, name, password_hash, created_at",
        )
        .bind(&user.email)
        .bind(&user.name)
        .bind(&user.password_hash)
        .bind(format_ts(user.created_at))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                QuoteError::EmailAlreadyRegistered
            }
            other => storage(other),
        })?;
        row.into_user()
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRecord>(
            "SELECT id, email, name, password_hash, created_at FROM users WHERE email = ?",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage)?;
        row.map(UserRecord::into_user).transpose()
    }
}

// ---------------------------------------------------------------------------
// Favorites
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct SqliteFavoritesRepository {
    pool: SqlitePool,
}

impl SqliteFavoritesRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl FavoritesRepository for SqliteFavoritesRepository {
    async fn add(&self, user_id: i64, coin_id: i64) -> Result<()> {
        sqlx::query("INSERT OR IGNORE INTO user_favorites (user_id, coin_id, created_at) VALUES (?, ?, ?)")
            .bind(user_id)
            .bind(coin_id)
            .bind(format_ts(Utc::now()))
            .execute(&self.pool)
            .await
            .map_err(storage)?;
        Ok(())
    }

    async fn remove(&self, user_id: i64, coin_id: i64) -> Result<()> {
        sqlx::query("DELETE FROM user_favorites WHERE user_id = ? AND coin_id = ?")
            .bind(user_id)
            .bind(coin_id)
            .execute(&self.pool)
            .await
            .map_err(storage)?;
        Ok(())
    }

    async fn list(&self, user_id: i64) -> Result<Vec<Coin>> {
        let rows = sqlx::query_as::<_, CoinRecord>(
            "SELECT c.id, c.symbol, c.enabled, c.coingecko_id, c.binance_symbol
             FROM user_favorites f
             JOIN coins c ON c.id = f.coin_id
             WHERE f.user_id = ?
             ORDER BY c.symbol",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;
        Ok(rows.into_iter().map(Coin::from).collect())
    }
}

// ---------------------------------------------------------------------------
// Refresh control
// ---------------------------------------------------------------------------

/// Key/value control table; the last manual refresh is stored as RFC 3339
#[derive(Clone)]
pub struct SqliteRefreshControlRepository {
    pool: SqlitePool,
}

impl SqliteRefreshControlRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RefreshControlRepository for SqliteRefreshControlRepository {
    async fn last_manual_refresh(&self) -> Result<Option<DateTime<Utc>>> {
        let raw: Option<String> = sqlx::query_scalar("SELECT value FROM refresh_control WHERE key = ?")
            .bind(LAST_MANUAL_REFRESH_KEY)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage)?;

        let Some(raw) = raw else {
            return Ok(None);
        };
        let parsed = parse_rfc3339(&raw);
        if parsed.is_none() {
            tracing::warn!(value = %raw, "Ignoring unparseable last manual refresh time");
        }
        Ok(parsed)
    }

    async fn set_last_manual_refresh(&self, at: DateTime<Utc>) -> Result<()> {
        sqlx::query(
            "INSERT INTO refresh_control (key, value) VALUES (?, ?)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        )
        .bind(LAST_MANUAL_REFRESH_KEY)
        .bind(format_rfc3339(at))
        .execute(&self.pool)
        .await
        .map_err(storage)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::init_database;
    use chrono::{Duration, TimeZone};
    use rust_decimal_macros::dec;

    async fn pool() -> SqlitePool {
        init_database("sqlite::memory:").await.unwrap()
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    fn new_quote(coin: &Coin, provider: &str, price: &str, at: DateTime<Utc>) -> NewQuote {
        NewQuote {
            coin_id: coin.id,
            symbol: coin.symbol.clone(),
            provider: provider.into(),
            currency: if provider == "binance" { "USDT".into() } else { "USD".into() },
            price: price.into(),
            quoted_at: at,
        }
    }

    fn filter() -> QuoteFilter {
        QuoteFilter {
            symbol: None,
            provider: None,
            currency: None,
            min_price: None,
            max_price: None,
            from: None,
            to: None,
            page: 1,
            page_size: 50,
        }
    }

    #[tokio::test]
    async fn test_coin_upsert_keeps_id() {
        let coins = SqliteCoinRepository::new(pool().await);
        let first = coins.upsert(&Coin::new("BTC").with_coingecko_id("bitcoin")).await.unwrap();
        let second = coins
            .upsert(&Coin::new("BTC").with_binance_symbol("BTCUSDT").disabled())
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert!(!second.enabled);
        assert_eq!(second.coingecko_id, None);
        assert_eq!(second.binance_symbol.as_deref(), Some("BTCUSDT"));
        assert!(coins.get_enabled_by_symbol("BTC").await.unwrap().is_none());
        assert!(coins.get_by_symbol("BTC").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_list_enabled_sorted() {
        let coins = SqliteCoinRepository::new(pool().await);
        for coin in [Coin::new("SOL"), Coin::new("BTC"), Coin::new("DOGE").disabled(), Coin::new("ETH")] {
            coins.upsert(&coin).await.unwrap();
        }
        let symbols: Vec<String> = coins.list_enabled().await.unwrap().into_iter().map(|c| c.symbol).collect();
        assert_eq!(symbols, ["BTC", "ETH", "SOL"]);
    }

    #[tokio::test]
    async fn test_price_text_round_trips_exactly() {
        let pool = pool().await;
        let btc = SqliteCoinRepository::new(pool.clone()).upsert(&Coin::new("BTC")).await.unwrap();
        let quotes = SqliteQuoteRepository::new(pool);

        let saved = quotes.insert(&new_quote(&btc, "binance", "45000.50", t0())).await.unwrap();
        assert_eq!(saved.price, "45000.50");
        assert_eq!(saved.quoted_at, t0());

        let latest = quotes.get_latest("BTC", None, None).await.unwrap().unwrap();
        assert_eq!(latest.price, "45000.50");
    }

    #[tokio::test]
    async fn test_latest_narrowed_by_provider_and_currency() {
        let pool = pool().await;
        let btc = SqliteCoinRepository::new(pool.clone()).upsert(&Coin::new("BTC")).await.unwrap();
        let quotes = SqliteQuoteRepository::new(pool);

        quotes.insert(&new_quote(&btc, "binance", "1", t0())).await.unwrap();
        quotes.insert(&new_quote(&btc, "coingecko", "2", t0() + Duration::minutes(1))).await.unwrap();
        quotes.insert(&new_quote(&btc, "binance", "3", t0() - Duration::minutes(1))).await.unwrap();

        let any = quotes.get_latest("BTC", None, None).await.unwrap().unwrap();
        assert_eq!(any.price, "2");

        let binance = quotes.get_latest("BTC", Some("binance"), None).await.unwrap().unwrap();
        assert_eq!(binance.price, "1");

        let usdt = quotes.get_latest("BTC", None, Some("USDT")).await.unwrap().unwrap();
        assert_eq!(usdt.provider, "binance");

        assert!(quotes.get_latest("BTC", Some("coingecko"), Some("USDT")).await.unwrap().is_none());
        assert!(quotes.get_latest("ETH", None, None).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_filters_and_pages() {
        let pool = pool().await;
        let coins = SqliteCoinRepository::new(pool.clone());
        let btc = coins.upsert(&Coin::new("BTC")).await.unwrap();
        let eth = coins.upsert(&Coin::new("ETH")).await.unwrap();
        let quotes = SqliteQuoteRepository::new(pool);

        for i in 0..5 {
            let at = t0() + Duration::minutes(i);
            quotes.insert(&new_quote(&btc, "binance", &format!("{}.25", 100 + i), at)).await.unwrap();
            quotes.insert(&new_quote(&eth, "coingecko", "9.5", at)).await.unwrap();
        }

        let page = quotes
            .list(&QuoteFilter { symbol: Some("BTC".into()), page_size: 2, page: 2, ..filter() })
            .await
            .unwrap();
        assert_eq!(page.total, 5);
        let prices: Vec<&str> = page.items.iter().map(|q| q.price.as_str()).collect();
        assert_eq!(prices, ["102.25", "101.25"]);

        let priced = quotes
            .list(&QuoteFilter { min_price: Some(dec!(101)), max_price: Some(dec!(103.25)), ..filter() })
            .await
            .unwrap();
        assert_eq!(priced.total, 3);

        let at_bounds = quotes
            .list(&QuoteFilter { min_price: Some(dec!(100.25)), max_price: Some(dec!(102.250)), ..filter() })
            .await
            .unwrap();
        assert_eq!(at_bounds.total, 3);

        let windowed = quotes
            .list(&QuoteFilter {
                provider: Some("coingecko".into()),
                from: Some(t0() + Duration::minutes(1)),
                to: Some(t0() + Duration::minutes(3)),
                ..filter()
            })
            .await
            .unwrap();
        assert_eq!(windowed.total, 3);
        assert!(windowed.items.iter().all(|q| q.symbol == "ETH"));
    }

    #[tokio::test]
    async fn test_duplicate_email_maps_to_conflict() {
        let users = SqliteUserRepository::new(pool().await);
        let new_user = NewUser {
            email: "alice@example.com".into(),
            name: "Alice".into(),
            password_hash: "hash".into(),
            created_at: t0(),
        };
        let created = users.create(&new_user).await.unwrap();
        assert_eq!(created.created_at, t0());
        assert!(users.exists_by_email("alice@example.com").await.unwrap());
        assert!(!users.exists_by_email("bob@example.com").await.unwrap());

        let err = users.create(&new_user).await.unwrap_err();
        assert!(matches!(err, QuoteError::EmailAlreadyRegistered));

        let found = users.find_by_email("alice@example.com").await.unwrap().unwrap();
        assert_eq!(found.id, created.id);
    }

    #[tokio::test]
    async fn test_favorites_idempotent_and_sorted() {
        let pool = pool().await;
        let coins = SqliteCoinRepository::new(pool.clone());
        let sol = coins.upsert(&Coin::new("SOL")).await.unwrap();
        let btc = coins.upsert(&Coin::new("BTC")).await.unwrap();
        let users = SqliteUserRepository::new(pool.clone());
        let user = users
            .create(&NewUser {
                email: "fav@example.com".into(),
                name: "Fav".into(),
                password_hash: "hash".into(),
                created_at: t0(),
            })
            .await
            .unwrap();
        let favorites = SqliteFavoritesRepository::new(pool);

        favorites.add(user.id, sol.id).await.unwrap();
        favorites.add(user.id, btc.id).await.unwrap();
        favorites.add(user.id, btc.id).await.unwrap();

        let symbols: Vec<String> = favorites.list(user.id).await.unwrap().into_iter().map(|c| c.symbol).collect();
        assert_eq!(symbols, ["BTC", "SOL"]);

        favorites.remove(user.id, btc.id).await.unwrap();
        favorites.remove(user.id, btc.id).await.unwrap();
        assert_eq!(favorites.list(user.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_refresh_control_round_trip() {
        let pool = pool().await;
        let control = SqliteRefreshControlRepository::new(pool.clone());
        assert!(control.last_manual_refresh().await.unwrap().is_none());

        control.set_last_manual_refresh(t0()).await.unwrap();
        control.set_last_manual_refresh(t0() + Duration::minutes(30)).await.unwrap();
        assert_eq!(control.last_manual_refresh().await.unwrap(), Some(t0() + Duration::minutes(30)));

        sqlx::query("UPDATE refresh_control SET value = 'garbage'")
            .execute(&pool)
            .await
            .unwrap();
        assert!(control.last_manual_refresh().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_price_bounds_are_inclusive_for_exact_decimals() {
        let pool = pool().await;
        let coins = SqliteCoinRepository::new(pool.clone());
        let btc = coins.upsert(&Coin::new("BTC")).await.unwrap();
        let shib = coins.upsert(&Coin::new("SHIB")).await.unwrap();
        let quotes = SqliteQuoteRepository::new(pool);

        quotes.insert(&new_quote(&btc, "binance", "45000.50", t0())).await.unwrap();
        quotes.insert(&new_quote(&btc, "binance", "45000.49", t0())).await.unwrap();
        quotes.insert(&new_quote(&shib, "coingecko", "0.00000123", t0())).await.unwrap();
        quotes.insert(&new_quote(&shib, "coingecko", "0.1", t0())).await.unwrap();

        let high = quotes
            .list(&QuoteFilter { min_price: Some(dec!(45000.50)), ..filter() })
            .await
            .unwrap();
        assert_eq!(high.total, 1);
        assert_eq!(high.items[0].price, "45000.50");

        let tiny = quotes
            .list(&QuoteFilter { max_price: Some(dec!(0.00000123)), ..filter() })
            .await
            .unwrap();
        assert_eq!(tiny.total, 1);
        assert_eq!(tiny.items[0].price, "0.00000123");

        let exact = quotes
            .list(&QuoteFilter { min_price: Some(dec!(0.1)), max_price: Some(dec!(0.1)), ..filter() })
            .await
            .unwrap();
        assert_eq!(exact.total, 1);
    }
}
