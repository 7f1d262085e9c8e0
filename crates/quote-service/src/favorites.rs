//! Favorites
//!
//! Per-user favorite coins. Add and remove are idempotent.

use serde::Serialize;
use std::sync::Arc;

use quote_core::model::normalize_symbol;
use quote_core::{Coin, CoinRepository, FavoritesRepository, QuoteError, Result};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FavoriteChange {
    pub ok: bool,
    pub action: &'static str,
    pub symbol: String,
}

pub struct Favorites {
    coins: Arc<dyn CoinRepository>,
    favorites: Arc<dyn FavoritesRepository>,
}

impl Favorites {
    pub fn new(coins: Arc<dyn CoinRepository>, favorites: Arc<dyn FavoritesRepository>) -> Self {
        Self { coins, favorites }
    }

    async fn existing_coin(&self, symbol: &str) -> Result<Coin> {
        let symbol = normalize_symbol(symbol);
        if symbol.is_empty() {
            return Err(QuoteError::BadRequest("symbol is required".into()));
        }
        self.coins
            .get_by_symbol(&symbol)
            .await?
            .ok_or(QuoteError::CoinNotFound(symbol))
    }

    pub async fn add(&self, user_id: i64, symbol: &str) -> Result<FavoriteChange> {
        let coin = self.existing_coin(symbol).await?;
        self.favorites.add(user_id, coin.id).await?;
        Ok(FavoriteChange { ok: true, action: "added", symbol: coin.symbol })
    }

    pub async fn remove(&self, user_id: i64, symbol: &str) -> Result<FavoriteChange> {
        let coin = self.existing_coin(symbol).await?;
        self.favorites.remove(user_id, coin.id).await?;
        Ok(FavoriteChange { ok: true, action: "removed", symbol: coin.symbol })
    }

    pub async fn list(&self, user_id: i64) -> Result<Vec<Coin>> {
        self.favorites.list(user_id).await
    }
}
