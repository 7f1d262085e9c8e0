//! Binance Provider
//!
//! Spot price from `/api/v3/ticker/price` for the coin's trading pair.

use async_trait::async_trait;
use serde::Deserialize;

use quote_core::provider::BINANCE;
use quote_core::{Coin, PriceProvider, PriceQuote, QuoteError, Result};

use crate::{upstream, validate_price, HttpConfig};

#[derive(Debug, Deserialize)]
pub(crate) struct TickerPrice {
    pub symbol: String,
    pub price: String,
}

/// Binance spot price provider
pub struct BinanceProvider {
    client: reqwest::Client,
    config: HttpConfig,
}

impl BinanceProvider {
    pub fn new(config: HttpConfig) -> Result<Self> {
        Ok(Self { client: config.client()?, config })
    }

    /// Public API with default timeout
    pub fn public() -> Result<Self> {
        Self::new(HttpConfig::binance())
    }

    /// `None` when Binance does not list the pair
    pub(crate) async fn ticker(&self, pair: &str) -> Result<Option<TickerPrice>> {
        let resp = self
            .client
            .get(self.config.url("/api/v3/ticker/price"))
            .query(&[("symbol", pair)])
            .send()
            .await
            .map_err(|e| upstream(BINANCE, &e))?;

        if resp.status() == reqwest::StatusCode::BAD_REQUEST {
            // Unknown symbols answer 400 with code -1121
            return Ok(None);
        }
        let resp = resp.error_for_status().map_err(|e| upstream(BINANCE, &e))?;
        let ticker: TickerPrice = resp.json().await.map_err(|e| upstream(BINANCE, &e))?;
        Ok(Some(ticker))
    }
}

#[async_trait]
impl PriceProvider for BinanceProvider {
    fn name(&self) -> &str {
        BINANCE
    }

    async fn current_price(&self, coin: &Coin, currency: &str) -> Result<PriceQuote> {
        let pair = coin
            .binance_symbol
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .ok_or_else(|| QuoteError::Provider(format!("binance: no trading pair for {}", coin.symbol)))?;

        let ticker = self
            .ticker(pair)
            .await?
            .ok_or_else(|| QuoteError::Provider(format!("binance: pair {pair} not listed")))?;

        tracing::debug!(symbol = %coin.symbol, %pair, price = %ticker.price, "Binance price");
        Ok(PriceQuote {
            symbol: coin.symbol.clone(),
            currency: currency.to_string(),
            price: validate_price(BINANCE, &ticker.price)?,
            provider: BINANCE.to_string(),
            timestamp: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::serve;
    use axum::extract::Query;
    use axum::http::StatusCode;
    use axum::routing::get;
    use axum::{Json, Router};
    use std::collections::HashMap;
    use std::time::Duration;

    async fn ticker(Query(q): Query<HashMap<String, String>>) -> std::result::Result<Json<serde_json::Value>, StatusCode> {
        match q.get("symbol").map(String::as_str) {
            Some("BTCUSDT") => Ok(Json(serde_json::json!({"symbol": "BTCUSDT", "price": "45000.50000000"}))),
            Some("BADUSDT") => Ok(Json(serde_json::json!({"symbol": "BADUSDT", "price": "n/a"}))),
            _ => Err(StatusCode::BAD_REQUEST),
        }
    }

    async fn provider() -> BinanceProvider {
        let base = serve(Router::new().route("/api/v3/ticker/price", get(ticker))).await;
        BinanceProvider::new(HttpConfig::new(base, Duration::from_secs(2))).unwrap()
    }

    #[tokio::test]
    async fn test_current_price() {
        let provider = provider().await;
        let coin = Coin::new("BTC").with_binance_symbol("BTCUSDT");
        let quote = provider.current_price(&coin, "USDT").await.unwrap();
        assert_eq!(quote.price, "45000.50000000");
        assert_eq!(quote.provider, "binance");
        assert!(quote.timestamp.is_none());
    }

    #[tokio::test]
    async fn test_missing_pair_and_unlisted_pair() {
        let provider = provider().await;
        assert!(provider.current_price(&Coin::new("BTC"), "USDT").await.is_err());

        let coin = Coin::new("ZZZ").with_binance_symbol("ZZZUSDT");
        assert!(provider.current_price(&coin, "USDT").await.is_err());
    }

    #[tokio::test]
    async fn test_malformed_price_rejected() {
        let provider = provider().await;
        let coin = Coin::new("BAD").with_binance_symbol("BADUSDT");
        assert!(matches!(provider.current_price(&coin, "USDT").await, Err(QuoteError::Provider(_))));
    }
}
