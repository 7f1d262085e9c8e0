//! Price Providers
//!
//! The `PriceProvider` trait abstracts one external market-data source.
//! Providers are collected once into an immutable `ProviderRegistry` that the
//! refresh engine and live lookups share behind an `Arc`.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::Result;
use crate::model::{normalize_provider, Coin, PriceQuote};

/// Registry key of the Binance provider
pub const BINANCE: &str = "binance";

/// Registry key of the CoinGecko provider
pub const COINGECKO: &str = "coingecko";

/// Price provider trait (Strategy pattern)
///
/// Implement this for each market-data source: Binance, CoinGecko, etc.
#[async_trait]
pub trait PriceProvider: Send + Sync {
    /// Provider name, used as the registry key
    fn name(&self) -> &str;

    /// Current price of `coin` settled in `currency`
    async fn current_price(&self, coin: &Coin, currency: &str) -> Result<PriceQuote>;
}

/// Validates and discovers provider identifiers for coins
#[async_trait]
pub trait CoinIdResolver: Send + Sync {
    /// Whether the Binance trading pair exists (e.g., "BTCUSDT")
    async fn binance_pair_exists(&self, pair: &str) -> Result<bool>;

    /// Whether the CoinGecko asset id exists (e.g., "bitcoin")
    async fn coingecko_id_exists(&self, id: &str) -> Result<bool>;

    /// Search CoinGecko by ticker, preferring an exact symbol match
    async fn search_coingecko_id(&self, symbol: &str) -> Result<Option<String>>;
}

/// Immutable name → provider map
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn PriceProvider>>,
}

impl ProviderRegistry {
    /// Build from a fixed provider list; later duplicates replace earlier ones
    pub fn new(providers: impl IntoIterator<Item = Arc<dyn PriceProvider>>) -> Self {
        let mut map = HashMap::new();
        for provider in providers {
            let key = normalize_provider(provider.name());
            if key.is_empty() {
                tracing::warn!("Skipping provider with empty name");
                continue;
            }
            if map.insert(key.clone(), provider).is_some() {
                tracing::warn!(provider = %key, "Duplicate provider registration replaced");
            }
        }
        Self { providers: map }
    }

    /// Case- and whitespace-insensitive lookup
    pub fn get(&self, name: &str) -> Option<Arc<dyn PriceProvider>> {
        self.providers.get(&normalize_provider(name)).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.providers.contains_key(&normalize_provider(name))
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.providers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Number of registered providers
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.names())
            .finish()
    }
}
