//! Price Lookups
//!
//! Latest persisted price and live provider price for a single coin.

use std::sync::Arc;

use quote_core::model::{format_rfc3339, normalize_currency, normalize_provider, normalize_symbol};
use quote_core::{
    Clock, Coin, CoinRepository, PriceQuote, ProviderRegistry, QuoteError, QuoteRepository, Result,
};

async fn enabled_coin(coins: &dyn CoinRepository, symbol: &str) -> Result<Coin> {
    coins
        .get_enabled_by_symbol(symbol)
        .await?
        .ok_or_else(|| QuoteError::CoinNotEnabled(symbol.to_string()))
}

fn optional(raw: Option<&str>, norm: fn(&str) -> String) -> Option<String> {
    raw.map(norm).filter(|s| !s.is_empty())
}

/// Most recent persisted quote for a coin
pub struct LatestPrice {
    coins: Arc<dyn CoinRepository>,
    quotes: Arc<dyn QuoteRepository>,
}

impl LatestPrice {
    pub fn new(coins: Arc<dyn CoinRepository>, quotes: Arc<dyn QuoteRepository>) -> Self {
        Self { coins, quotes }
    }

    pub async fn execute(
        &self,
        symbol: &str,
        currency: Option<&str>,
        provider: Option<&str>,
    ) -> Result<PriceQuote> {
        let symbol = normalize_symbol(symbol);
        if symbol.is_empty() {
            return Err(QuoteError::BadRequest("symbol is required".into()));
        }
        let currency = optional(currency, normalize_currency);
        let provider = optional(provider, normalize_provider);

        enabled_coin(self.coins.as_ref(), &symbol).await?;

        let quote = self
            .quotes
            .get_latest(&symbol, provider.as_deref(), currency.as_deref())
            .await?
            .ok_or(QuoteError::QuoteNotFound(symbol))?;
        Ok(quote.to_price_quote())
    }
}

/// Price fetched straight from a provider, not persisted
pub struct LivePrice {
    coins: Arc<dyn CoinRepository>,
    registry: Arc<ProviderRegistry>,
    clock: Arc<dyn Clock>,
}

impl LivePrice {
    pub fn new(coins: Arc<dyn CoinRepository>, registry: Arc<ProviderRegistry>, clock: Arc<dyn Clock>) -> Self {
        Self { coins, registry, clock }
    }

    pub async fn execute(&self, symbol: &str, currency: &str, provider: &str) -> Result<PriceQuote> {
        let symbol = normalize_symbol(symbol);
        let currency = normalize_currency(currency);
        let provider_name = normalize_provider(provider);
        if symbol.is_empty() || currency.is_empty() || provider_name.is_empty() {
            return Err(QuoteError::BadRequest("symbol, currency and provider are required".into()));
        }

        let coin = enabled_coin(self.coins.as_ref(), &symbol).await?;
        let provider = self
            .registry
            .get(&provider_name)
            .ok_or(QuoteError::ProviderNotSupported(provider_name))?;

        let mut quote = provider.current_price(&coin, &currency).await.map_err(|e| {
            tracing::warn!(%symbol, provider = provider.name(), error = %e, "Live price fetch failed");
            QuoteError::ExternalService(e.to_string())
        })?;

        if quote.timestamp.as_deref().is_none_or(|t| t.trim().is_empty()) {
            quote.timestamp = Some(format_rfc3339(self.clock.now()));
        }
        quote.symbol = symbol;
        quote.currency = currency;
        quote.provider = provider.name().to_string();
        Ok(quote)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockPriceProvider;
    use chrono::{DateTime, Duration as TimeDelta, TimeZone, Utc};
    use quote_core::memory::{MemoryCoinRepository, MemoryQuoteRepository};
    use quote_core::{ManualClock, NewQuote, PriceProvider};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn coins() -> Arc<MemoryCoinRepository> {
        Arc::new(MemoryCoinRepository::with_coins([
            Coin::new("BTC").with_coingecko_id("bitcoin"),
            Coin::new("ETH").with_coingecko_id("ethereum").disabled(),
        ]))
    }

    async fn seed(quotes: &MemoryQuoteRepository, provider: &str, currency: &str, price: &str, at: DateTime<Utc>) {
        quotes
            .insert(&NewQuote {
                coin_id: 1,
                symbol: "BTC".into(),
                provider: provider.into(),
                currency: currency.into(),
                price: price.into(),
                quoted_at: at,
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_latest_price() {
        let quotes = Arc::new(MemoryQuoteRepository::new());
        seed(&quotes, "binance", "USDT", "45000.50", t0()).await;
        seed(&quotes, "coingecko", "USD", "45100", t0() + TimeDelta::minutes(1)).await;
        let latest = LatestPrice::new(coins(), quotes);

        let any = latest.execute("btc", None, None).await.unwrap();
        assert_eq!(any.price, "45100");

        let binance = latest.execute("BTC", Some("usdt"), Some(" Binance")).await.unwrap();
        assert_eq!(binance.price, "45000.50");
        assert_eq!(binance.timestamp.as_deref(), Some("2024-06-01T12:00:00Z"));
    }

    #[tokio::test]
    async fn test_latest_price_errors() {
        let latest = LatestPrice::new(coins(), Arc::new(MemoryQuoteRepository::new()));
        assert!(matches!(latest.execute("", None, None).await, Err(QuoteError::BadRequest(_))));
        assert!(matches!(latest.execute("ETH", None, None).await, Err(QuoteError::CoinNotEnabled(_))));
        assert!(matches!(latest.execute("BTC", None, None).await, Err(QuoteError::QuoteNotFound(_))));
    }

    fn live(provider: MockPriceProvider) -> LivePrice {
        LivePrice::new(
            coins(),
            Arc::new(ProviderRegistry::new([Arc::new(provider) as Arc<dyn PriceProvider>])),
            Arc::new(ManualClock::new(t0())),
        )
    }

    #[tokio::test]
    async fn test_live_price_fills_timestamp() {
        let quote = live(MockPriceProvider::new("coingecko")).execute("btc", "usd", "CoinGecko").await.unwrap();
        assert_eq!(quote.symbol, "BTC");
        assert_eq!(quote.currency, "USD");
        assert_eq!(quote.provider, "coingecko");
        assert_eq!(quote.timestamp.as_deref(), Some("2024-06-01T12:00:00Z"));
    }

    #[tokio::test]
    async fn test_live_price_errors() {
        let svc = live(MockPriceProvider::new("coingecko").failing_for("BTC"));
        assert!(matches!(svc.execute("BTC", "", "coingecko").await, Err(QuoteError::BadRequest(_))));
        assert!(matches!(svc.execute("ETH", "USD", "coingecko").await, Err(QuoteError::CoinNotEnabled(_))));
        assert!(matches!(svc.execute("BTC", "USD", "kraken").await, Err(QuoteError::ProviderNotSupported(_))));
        assert!(matches!(svc.execute("BTC", "USD", "coingecko").await, Err(QuoteError::ExternalService(_))));
    }
}
