//! Repository Contracts
//!
//! Persistence seams. Each backing technology supplies one implementation;
//! use cases only see these traits. All implementations must be safe for
//! concurrent use.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::model::{Coin, NewQuote, NewUser, Quote, QuoteFilter, QuotePage, User};

#[async_trait]
pub trait CoinRepository: Send + Sync {
    /// Enabled coin by canonical symbol
    async fn get_enabled_by_symbol(&self, symbol: &str) -> Result<Option<Coin>>;

    /// All enabled coins, ordered by symbol
    async fn list_enabled(&self) -> Result<Vec<Coin>>;

    /// Coin by canonical symbol regardless of `enabled`
    async fn get_by_symbol(&self, symbol: &str) -> Result<Option<Coin>>;

    /// Insert or replace by symbol; returns the stored row
    async fn upsert(&self, coin: &Coin) -> Result<Coin>;
}

#[async_trait]
pub trait QuoteRepository: Send + Sync {
    /// Append one quote; rows are never updated
    async fn insert(&self, quote: &NewQuote) -> Result<Quote>;

    /// Most recent quote by `quoted_at` for the symbol, optionally narrowed
    async fn get_latest(
        &self,
        symbol: &str,
        provider: Option<&str>,
        currency: Option<&str>,
    ) -> Result<Option<Quote>>;

    /// Filtered page ordered by `quoted_at` desc, plus the unpaged total
    async fn list(&self, filter: &QuoteFilter) -> Result<QuotePage>;
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn exists_by_email(&self, email: &str) -> Result<bool>;

    /// Fails with `EmailAlreadyRegistered` on a duplicate email
    async fn create(&self, user: &NewUser) -> Result<User>;

    async fn find_by_email(&self, email: &str) -> Result<Option<User>>;
}

#[async_trait]
pub trait FavoritesRepository: Send + Sync {
    /// Idempotent
    async fn add(&self, user_id: i64, coin_id: i64) -> Result<()>;

    /// Idempotent
    async fn remove(&self, user_id: i64, coin_id: i64) -> Result<()>;

    /// Favorite coins ordered by symbol
    async fn list(&self, user_id: i64) -> Result<Vec<Coin>>;
}

#[async_trait]
pub trait RefreshControlRepository: Send + Sync {
    /// `None` when never written or when the stored value does not parse
    async fn last_manual_refresh(&self) -> Result<Option<DateTime<Utc>>>;

    async fn set_last_manual_refresh(&self, at: DateTime<Utc>) -> Result<()>;
}
