//! In-Memory Repositories
//!
//! Development and test implementations of the repository traits. Each
//! store can be told to fail so error paths can be exercised.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use tokio::sync::RwLock;

use crate::error::{QuoteError, Result};
use crate::model::{Coin, NewQuote, NewUser, Quote, QuoteFilter, QuotePage, User};
use crate::repository::{
    CoinRepository, FavoritesRepository, QuoteRepository, RefreshControlRepository,
    UserRepository,
};

fn injected(op: &str) -> QuoteError {
    QuoteError::Storage(format!("injected failure: {op}"))
}

/// In-memory coin store keyed by symbol
#[derive(Default)]
pub struct MemoryCoinRepository {
    coins: RwLock<HashMap<String, Coin>>,
    next_id: AtomicI64,
    fail: AtomicBool,
}

impl MemoryCoinRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed with coins, assigning ids in order
    pub fn with_coins(coins: impl IntoIterator<Item = Coin>) -> Self {
        let mut repo = Self::new();
        let mut map = HashMap::new();
        for mut coin in coins {
            coin.id = repo.next_id.fetch_add(1, Ordering::SeqCst) + 1;
            map.insert(coin.symbol.clone(), coin);
        }
        repo.coins = RwLock::new(map);
        repo
    }

    /// Make every subsequent call fail with a storage error
    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    fn check(&self, op: &str) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(injected(op));
        }
        Ok(())
    }

    async fn by_id(&self, id: i64) -> Option<Coin> {
        self.coins.read().await.values().find(|c| c.id == id).cloned()
    }
}

#[async_trait]
impl CoinRepository for MemoryCoinRepository {
    async fn get_enabled_by_symbol(&self, symbol: &str) -> Result<Option<Coin>> {
        self.check("get_enabled_by_symbol")?;
        let coins = self.coins.read().await;
        Ok(coins.get(symbol).filter(|c| c.enabled).cloned())
    }

    async fn list_enabled(&self) -> Result<Vec<Coin>> {
        self.check("list_enabled")?;
        let coins = self.coins.read().await;
        let mut enabled: Vec<Coin> = coins.values().filter(|c| c.enabled).cloned().collect();
        enabled.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        Ok(enabled)
    }

    async fn get_by_symbol(&self, symbol: &str) -> Result<Option<Coin>> {
        self.check("get_by_symbol")?;
        Ok(self.coins.read().await.get(symbol).cloned())
    }

    async fn upsert(&self, coin: &Coin) -> Result<Coin> {
        self.check("upsert")?;
        let mut coins = self.coins.write().await;
        let mut stored = coin.clone();
        stored.id = match coins.get(&coin.symbol) {
            Some(existing) => existing.id,
            None => self.next_id.fetch_add(1, Ordering::SeqCst) + 1,
        };
        coins.insert(stored.symbol.clone(), stored.clone());
        Ok(stored)
    }
}

/// Append-only in-memory quote history
#[derive(Default)]
pub struct MemoryQuoteRepository {
    quotes: RwLock<Vec<Quote>>,
    fail_inserts: AtomicBool,
    fail_reads: AtomicBool,
}

impl MemoryQuoteRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_inserts(&self, fail: bool) {
        self.fail_inserts.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Snapshot of everything inserted so far, in insertion order
    pub async fn all(&self) -> Vec<Quote> {
        self.quotes.read().await.clone()
    }
}

#[async_trait]
impl QuoteRepository for MemoryQuoteRepository {
    async fn insert(&self, quote: &NewQuote) -> Result<Quote> {
        if self.fail_inserts.load(Ordering::SeqCst) {
            return Err(injected("insert"));
        }
        let mut quotes = self.quotes.write().await;
        let row = Quote {
            id: i64::try_from(quotes.len()).unwrap_or(i64::MAX) + 1,
            coin_id: quote.coin_id,
            symbol: quote.symbol.clone(),
            provider: quote.provider.clone(),
            currency: quote.currency.clone(),
            price: quote.price.clone(),
            quoted_at: quote.quoted_at,
            created_at: Utc::now(),
        };
        quotes.push(row.clone());
        Ok(row)
    }

    async fn get_latest(
        &self,
        symbol: &str,
        provider: Option<&str>,
        currency: Option<&str>,
    ) -> Result<Option<Quote>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(injected("get_latest"));
        }
        let quotes = self.quotes.read().await;
        Ok(quotes
            .iter()
            .filter(|q| q.symbol == symbol)
            .filter(|q| provider.is_none_or(|p| q.provider == p))
            .filter(|q| currency.is_none_or(|c| q.currency == c))
            .max_by_key(|q| (q.quoted_at, q.id))
            .cloned())
    }

    async fn list(&self, filter: &QuoteFilter) -> Result<QuotePage> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(injected("list"));
        }
        let quotes = self.quotes.read().await;
        let mut matched: Vec<Quote> = quotes.iter().filter(|q| filter.matches(q)).cloned().collect();
        matched.sort_by(|a, b| b.quoted_at.cmp(&a.quoted_at).then(b.id.cmp(&a.id)));

        let total = matched.len() as u64;
        let skip = usize::try_from(filter.offset()).unwrap_or(usize::MAX);
        let take = usize::try_from(filter.page_size).unwrap_or(usize::MAX);
        let items = matched.into_iter().skip(skip).take(take).collect();
        Ok(QuotePage { items, total })
    }
}

/// In-memory user store keyed by email
#[derive(Default)]
pub struct MemoryUserRepository {
    users: RwLock<HashMap<String, User>>,
    next_id: AtomicI64,
}

impl MemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepository for MemoryUserRepository {
    async fn exists_by_email(&self, email: &str) -> Result<bool> {
        Ok(self.users.read().await.contains_key(email))
    }

    async fn create(&self, user: &NewUser) -> Result<User> {
        let mut users = self.users.write().await;
        if users.contains_key(&user.email) {
            return Err(QuoteError::EmailAlreadyRegistered);
        }
        let row = User {
            id: self.next_id.fetch_add(1, Ordering::SeqCst) + 1,
            email: user.email.clone(),
            name: user.name.clone(),
            password_hash: user.password_hash.clone(),
            created_at: user.created_at,
        };
        users.insert(row.email.clone(), row.clone());
        Ok(row)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        Ok(self.users.read().await.get(email).cloned())
    }
}

/// In-memory favorites, resolving coins through a shared coin store
pub struct MemoryFavoritesRepository {
    coins: Arc<MemoryCoinRepository>,
    pairs: RwLock<BTreeSet<(i64, i64)>>,
}

impl MemoryFavoritesRepository {
    pub fn new(coins: Arc<MemoryCoinRepository>) -> Self {
        Self {
            coins,
            pairs: RwLock::new(BTreeSet::new()),
        }
    }
}

#[async_trait]
impl FavoritesRepository for MemoryFavoritesRepository {
    async fn add(&self, user_id: i64, coin_id: i64) -> Result<()> {
        self.pairs.write().await.insert((user_id, coin_id));
        Ok(())
    }

    async fn remove(&self, user_id: i64, coin_id: i64) -> Result<()> {
        self.pairs.write().await.remove(&(user_id, coin_id));
        Ok(())
    }

    async fn list(&self, user_id: i64) -> Result<Vec<Coin>> {
        let coin_ids: Vec<i64> = self
            .pairs
            .read()
            .await
            .iter()
            .filter(|(u, _)| *u == user_id)
            .map(|(_, c)| *c)
            .collect();

        let mut favorites = Vec::with_capacity(coin_ids.len());
        for id in coin_ids {
            if let Some(coin) = self.coins.by_id(id).await {
                favorites.push(coin);
            }
        }
        favorites.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        Ok(favorites)
    }
}

/// In-memory refresh control holding the raw stored string
#[derive(Default)]
pub struct MemoryRefreshControlRepository {
    value: RwLock<Option<String>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl MemoryRefreshControlRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a raw value, bypassing formatting (e.g. to simulate corruption)
    pub async fn set_raw(&self, raw: impl Into<String>) {
        *self.value.write().await = Some(raw.into());
    }

    pub async fn raw(&self) -> Option<String> {
        self.value.read().await.clone()
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl RefreshControlRepository for MemoryRefreshControlRepository {
    async fn last_manual_refresh(&self) -> Result<Option<DateTime<Utc>>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(injected("last_manual_refresh"));
        }
        Ok(self
            .value
            .read()
            .await
            .as_deref()
            .and_then(crate::model::parse_rfc3339))
    }

    async fn set_last_manual_refresh(&self, at: DateTime<Utc>) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(injected("set_last_manual_refresh"));
        }
        *self.value.write().await = Some(crate::model::format_rfc3339(at));
        Ok(())
    }
}
