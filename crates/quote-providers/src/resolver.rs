//! Coin Id Resolver
//!
//! Validates user-supplied provider identifiers and discovers missing ones
//! against the live Binance and CoinGecko APIs.

use async_trait::async_trait;

use quote_core::{CoinIdResolver, Result};

use crate::{BinanceProvider, CoinGeckoProvider, HttpConfig};

pub struct HttpCoinIdResolver {
    binance: BinanceProvider,
    coingecko: CoinGeckoProvider,
}

impl HttpCoinIdResolver {
    pub fn new(binance: HttpConfig, coingecko: HttpConfig) -> Result<Self> {
        Ok(Self {
            binance: BinanceProvider::new(binance)?,
            coingecko: CoinGeckoProvider::new(coingecko)?,
        })
    }
}

#[async_trait]
impl CoinIdResolver for HttpCoinIdResolver {
    async fn binance_pair_exists(&self, pair: &str) -> Result<bool> {
        let pair = pair.trim().to_uppercase();
        Ok(self
            .binance
            .ticker(&pair)
            .await?
            .is_some_and(|t| !t.symbol.trim().is_empty()))
    }

    async fn coingecko_id_exists(&self, id: &str) -> Result<bool> {
        self.coingecko.id_exists(id).await
    }

    async fn search_coingecko_id(&self, symbol: &str) -> Result<Option<String>> {
        self.coingecko.search_id(symbol).await
    }
}
