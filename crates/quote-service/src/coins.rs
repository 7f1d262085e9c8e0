//! Coin Lifecycle
//!
//! Create (upsert) and update tracked coins. Creation validates supplied
//! provider identifiers and tries to discover missing ones so that every
//! stored coin is refreshable by at least one provider.

use serde::Deserialize;
use std::sync::Arc;

use quote_core::model::normalize_symbol;
use quote_core::provider::{BINANCE, COINGECKO};
use quote_core::{Coin, CoinIdResolver, CoinRepository, ProviderRegistry, QuoteError, Result};

/// Default Binance settlement currency used to build trading pairs
pub const DEFAULT_BINANCE_QUOTE_CURRENCY: &str = "USDT";

/// Trim; empty or the literal placeholder `"string"` counts as absent
pub fn sanitize_optional(raw: Option<&str>) -> Option<String> {
    let v = raw?.trim();
    if v.is_empty() || v.eq_ignore_ascii_case("string") {
        return None;
    }
    Some(v.to_string())
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct CreateCoinInput {
    #[serde(default)]
    pub symbol: String,
    pub enabled: Option<bool>,
    pub coingecko_id: Option<String>,
    pub binance_symbol: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct UpdateCoinInput {
    pub enabled: Option<bool>,
    pub coingecko_id: Option<String>,
    pub binance_symbol: Option<String>,
}

/// Coin create/update use cases
pub struct CoinManager {
    coins: Arc<dyn CoinRepository>,
    registry: Arc<ProviderRegistry>,
    resolver: Option<Arc<dyn CoinIdResolver>>,
    binance_quote_currency: String,
}

impl CoinManager {
    pub fn new(coins: Arc<dyn CoinRepository>, registry: Arc<ProviderRegistry>) -> Self {
        Self {
            coins,
            registry,
            resolver: None,
            binance_quote_currency: DEFAULT_BINANCE_QUOTE_CURRENCY.to_string(),
        }
    }

    /// Validate and discover provider identifiers through `resolver`
    pub fn with_resolver(mut self, resolver: Arc<dyn CoinIdResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Blank falls back to USDT
    pub fn with_binance_quote_currency(mut self, currency: &str) -> Self {
        let currency = currency.trim().to_uppercase();
        self.binance_quote_currency = if currency.is_empty() {
            DEFAULT_BINANCE_QUOTE_CURRENCY.to_string()
        } else {
            currency
        };
        self
    }

    /// Create or merge a coin by symbol
    pub async fn create(&self, input: CreateCoinInput) -> Result<Coin> {
        let symbol = normalize_symbol(&input.symbol);
        if symbol.is_empty() {
            return Err(QuoteError::InvalidCoinInput("symbol is required".into()));
        }

        let mut binance = sanitize_optional(input.binance_symbol.as_deref()).map(|s| s.to_uppercase());
        let mut coingecko = sanitize_optional(input.coingecko_id.as_deref());

        if let Some(resolver) = &self.resolver {
            if let Some(pair) = binance.take() {
                binance = validated(&symbol, "binance_symbol", &pair, resolver.binance_pair_exists(&pair).await);
            }
            if let Some(id) = coingecko.take() {
                coingecko = validated(&symbol, "coingecko_id", &id, resolver.coingecko_id_exists(&id).await);
            }
        }

        let existing = self.coins.get_by_symbol(&symbol).await?;
        let mut merged = Coin::new(&symbol);
        merged.enabled = input.enabled.unwrap_or(true);
        if let Some(existing) = existing {
            merged.id = existing.id;
            merged.coingecko_id = sanitize_optional(existing.coingecko_id.as_deref());
            merged.binance_symbol = sanitize_optional(existing.binance_symbol.as_deref());
        }
        if coingecko.is_some() {
            merged.coingecko_id = coingecko;
        }
        if binance.is_some() {
            merged.binance_symbol = binance;
        }

        if merged.coingecko_id.is_none() && merged.binance_symbol.is_none() {
            self.auto_resolve(&mut merged).await;
            if merged.coingecko_id.is_none() && merged.binance_symbol.is_none() {
                return Err(QuoteError::CoinNotResolvable(symbol));
            }
        }

        let stored = self.coins.upsert(&merged).await?;
        tracing::info!(
            symbol = %stored.symbol,
            enabled = stored.enabled,
            coingecko_id = ?stored.coingecko_id,
            binance_symbol = ?stored.binance_symbol,
            "Coin upserted"
        );
        Ok(stored)
    }

    /// Partially update an existing coin
    pub async fn update(&self, symbol: &str, input: UpdateCoinInput) -> Result<Coin> {
        let symbol = normalize_symbol(symbol);
        if symbol.is_empty() {
            return Err(QuoteError::InvalidCoinUpdate("symbol is required".into()));
        }

        let coingecko = sanitize_optional(input.coingecko_id.as_deref());
        let binance = sanitize_optional(input.binance_symbol.as_deref());
        if input.enabled.is_none() && coingecko.is_none() && binance.is_none() {
            return Err(QuoteError::InvalidCoinUpdate("no fields to update".into()));
        }

        let mut coin = self
            .coins
            .get_by_symbol(&symbol)
            .await?
            .ok_or_else(|| QuoteError::CoinNotFound(symbol.clone()))?;

        if let Some(enabled) = input.enabled {
            coin.enabled = enabled;
        }
        if coingecko.is_some() {
            coin.coingecko_id = coingecko;
        }
        if binance.is_some() {
            coin.binance_symbol = binance;
        }

        self.coins.upsert(&coin).await
    }

    /// Fill missing identifiers for each registered provider; failures are
    /// silent omissions.
    async fn auto_resolve(&self, coin: &mut Coin) {
        let Some(resolver) = &self.resolver else {
            return;
        };

        if coin.binance_symbol.is_none() && self.registry.contains(BINANCE) {
            let pair = format!("{}{}", coin.symbol, self.binance_quote_currency);
            match resolver.binance_pair_exists(&pair).await {
                Ok(true) => coin.binance_symbol = Some(pair),
                Ok(false) => tracing::debug!(%pair, "Binance pair not listed"),
                Err(e) => tracing::warn!(%pair, error = %e, "Binance pair lookup failed"),
            }
        }

        if coin.coingecko_id.is_none() && self.registry.contains(COINGECKO) {
            match resolver.search_coingecko_id(&coin.symbol).await {
                Ok(found) => coin.coingecko_id = found,
                Err(e) => tracing::warn!(symbol = %coin.symbol, error = %e, "CoinGecko search failed"),
            }
        }
    }
}

fn validated(symbol: &str, field: &str, value: &str, check: Result<bool>) -> Option<String> {
    match check {
        Ok(true) => Some(value.to_string()),
        Ok(false) => {
            tracing::info!(symbol, field, value, "Dropping unknown provider id");
            None
        }
        Err(e) => {
            tracing::warn!(symbol, field, value, error = %e, "Provider id validation failed, dropping");
            None
        }
    }
}
