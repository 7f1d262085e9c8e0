//! CoinGecko Provider
//!
//! Spot price from `/simple/price` for the coin's CoinGecko id, and asset
//! search used by the resolver.

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;

use quote_core::model::format_rfc3339;
use quote_core::provider::COINGECKO;
use quote_core::{Coin, PriceProvider, PriceQuote, QuoteError, Result};

use crate::{upstream, validate_price, HttpConfig};

/// `{"bitcoin": {"usd": 88338}}`
type SimplePrice = HashMap<String, HashMap<String, Value>>;

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    coins: Vec<SearchCoin>,
}

#[derive(Debug, Deserialize)]
struct SearchCoin {
    #[serde(default)]
    id: String,
    #[serde(default)]
    symbol: String,
}

/// CoinGecko spot price provider
pub struct CoinGeckoProvider {
    client: reqwest::Client,
    config: HttpConfig,
}

impl CoinGeckoProvider {
    pub fn new(config: HttpConfig) -> Result<Self> {
        Ok(Self { client: config.client()?, config })
    }

    /// Public API with default timeout
    pub fn public() -> Result<Self> {
        Self::new(HttpConfig::coingecko())
    }

    async fn simple_price(&self, id: &str, vs: &str) -> Result<SimplePrice> {
        self.client
            .get(self.config.url("/simple/price"))
            .query(&[("ids", id), ("vs_currencies", vs)])
            .header("accept", "application/json")
            .send()
            .await
            .map_err(|e| upstream(COINGECKO, &e))?
            .error_for_status()
            .map_err(|e| upstream(COINGECKO, &e))?
            .json()
            .await
            .map_err(|e| upstream(COINGECKO, &e))
    }

    /// Whether `/simple/price` knows the id
    pub(crate) async fn id_exists(&self, id: &str) -> Result<bool> {
        Ok(self.simple_price(id.trim(), "usd").await?.contains_key(id.trim()))
    }

    /// Search by ticker: exact symbol match first, else the first hit
    pub(crate) async fn search_id(&self, symbol: &str) -> Result<Option<String>> {
        let resp: SearchResponse = self
            .client
            .get(self.config.url("/search"))
            .query(&[("query", symbol)])
            .header("accept", "application/json")
            .send()
            .await
            .map_err(|e| upstream(COINGECKO, &e))?
            .error_for_status()
            .map_err(|e| upstream(COINGECKO, &e))?
            .json()
            .await
            .map_err(|e| upstream(COINGECKO, &e))?;

        Ok(pick_search_hit(&resp.coins, symbol))
    }
}

fn pick_search_hit(coins: &[SearchCoin], symbol: &str) -> Option<String> {
    let wanted = symbol.trim().to_lowercase();
    coins
        .iter()
        .find(|c| c.symbol.trim().to_lowercase() == wanted && !c.id.trim().is_empty())
        .or_else(|| coins.first().filter(|c| !c.id.trim().is_empty()))
        .map(|c| c.id.trim().to_string())
}

/// Numbers are rendered without exponent; strings pass through
fn price_text(value: &Value) -> Option<String> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .map(|u| u.to_string())
            .or_else(|| n.as_f64().map(|f| f.to_string())),
        Value::String(s) => Some(s.clone()),
        _ => None,
    }
}

#[async_trait]
impl PriceProvider for CoinGeckoProvider {
    fn name(&self) -> &str {
        COINGECKO
    }

    async fn current_price(&self, coin: &Coin, currency: &str) -> Result<PriceQuote> {
        let id = coin
            .coingecko_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| QuoteError::Provider(format!("coingecko: no id for {}", coin.symbol)))?;
        let vs = currency.trim().to_lowercase();
        if vs.is_empty() {
            return Err(QuoteError::Provider("coingecko: currency required".into()));
        }

        let body = self.simple_price(id, &vs).await?;
        let raw = body
            .get(id)
            .ok_or_else(|| QuoteError::Provider(format!("coingecko: missing id {id}")))?
            .get(&vs)
            .ok_or_else(|| QuoteError::Provider(format!("coingecko: missing currency {vs}")))?;
        let text = price_text(raw)
            .ok_or_else(|| QuoteError::Provider(format!("coingecko: unexpected price {raw}")))?;

        tracing::debug!(symbol = %coin.symbol, %id, price = %text, "CoinGecko price");
        Ok(PriceQuote {
            symbol: coin.symbol.clone(),
            currency: vs.to_uppercase(),
            price: validate_price(COINGECKO, &text)?,
            provider: COINGECKO.to_string(),
            timestamp: Some(format_rfc3339(Utc::now())),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::serve;
    use axum::extract::Query;
    use axum::routing::get;
    use axum::{Json, Router};
    use serde_json::json;
    use std::time::Duration;

    async fn simple(Query(q): Query<HashMap<String, String>>) -> Json<Value> {
        match q.get("ids").map(String::as_str) {
            Some("bitcoin") => Json(json!({"bitcoin": {"usd": 45000.5, "eur": 0.00000001}})),
            _ => Json(json!({})),
        }
    }

    async fn search() -> Json<Value> {
        Json(json!({"coins": [
            {"id": "bitcoin-wrapped", "symbol": "WBTC"},
            {"id": "bitcoin", "symbol": "btc"}
        ]}))
    }

    async fn provider() -> CoinGeckoProvider {
        let router = Router::new()
            .route("/simple/price", get(simple))
            .route("/search", get(search));
        let base = serve(router).await;
        CoinGeckoProvider::new(HttpConfig::new(base, Duration::from_secs(2))).unwrap()
    }

    #[tokio::test]
    async fn test_current_price() {
        let provider = provider().await;
        let coin = Coin::new("BTC").with_coingecko_id("bitcoin");

        let quote = provider.current_price(&coin, "USD").await.unwrap();
        assert_eq!(quote.price, "45000.5");
        assert_eq!(quote.currency, "USD");
        assert!(quote.timestamp.is_some());

        let tiny = provider.current_price(&coin, "eur").await.unwrap();
        assert_eq!(tiny.price, "0.00000001");
    }

    #[tokio::test]
    async fn test_unknown_id_and_currency() {
        let provider = provider().await;
        let unknown = Coin::new("ZZZ").with_coingecko_id("zzz");
        assert!(provider.current_price(&unknown, "USD").await.is_err());

        let btc = Coin::new("BTC").with_coingecko_id("bitcoin");
        assert!(provider.current_price(&btc, "JPY").await.is_err());
        assert!(provider.current_price(&Coin::new("BTC"), "USD").await.is_err());
    }

    #[tokio::test]
    async fn test_search_prefers_exact_symbol() {
        let provider = provider().await;
        assert_eq!(provider.search_id("BTC").await.unwrap().as_deref(), Some("bitcoin"));
        assert_eq!(provider.search_id("XYZ").await.unwrap().as_deref(), Some("bitcoin-wrapped"));
        assert!(provider.id_exists("bitcoin").await.unwrap());
        assert!(!provider.id_exists("nope").await.unwrap());
    }

    #[test]
    fn test_pick_search_hit_empty() {
        assert!(pick_search_hit(&[], "BTC").is_none());
    }
}
