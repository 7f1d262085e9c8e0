//! Row records mapped from SQLite

use sqlx::FromRow;

use quote_core::{Coin, Quote, Result, User};

use crate::parse_ts;

#[derive(Debug, Clone, FromRow)]
pub(crate) struct CoinRecord {
    pub id: i64,
    pub symbol: String,
    pub enabled: bool,
    pub coingecko_id: Option<String>,
    pub binance_symbol: Option<String>,
}

impl From<CoinRecord> for Coin {
    fn from(r: CoinRecord) -> Self {
        Self {
            id: r.id,
            symbol: r.symbol,
            enabled: r.enabled,
            coingecko_id: r.coingecko_id,
            binance_symbol: r.binance_symbol,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub(crate) struct QuoteRecord {
    pub id: i64,
    pub coin_id: i64,
    pub symbol: String,
    pub provider: String,
    pub currency: String,
    pub price: String,
    pub quoted_at: String,
    pub created_at: String,
}

impl QuoteRecord {
    pub fn into_quote(self) -> Result<Quote> {
        Ok(Quote {
            id: self.id,
            coin_id: self.coin_id,
            symbol: self.symbol,
            provider: self.provider,
            currency: self.currency,
            price: self.price,
            quoted_at: parse_ts(&self.quoted_at)?,
            created_at: parse_ts(&self.created_at)?,
        })
    }
}

#[derive(Debug, Clone, FromRow)]
pub(crate) struct UserRecord {
    pub id: i64,
    pub email: String,
    pub name: String,
    pub password_hash: String,
    pub created_at: String,
}

impl UserRecord {
    pub fn into_user(self) -> Result<User> {
        Ok(User {
            id: self.id,
            email: self.email,
            name: self.name,
            password_hash: self.password_hash,
            created_at: parse_ts(&self.created_at)?,
        })
    }
}
