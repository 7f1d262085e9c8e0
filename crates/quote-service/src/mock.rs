//! Mock Price Provider
//!
//! For testing and demo purposes. Returns realistic static prices.

use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use quote_core::model::normalize_symbol;
use quote_core::{Coin, PriceProvider, PriceQuote, QuoteError, Result};

/// Mock provider with static prices
pub struct MockPriceProvider {
    name: String,
    overrides: HashMap<String, String>,
    failing: HashSet<String>,
    timestamp: Option<String>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl MockPriceProvider {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            overrides: HashMap::new(),
            failing: HashSet::new(),
            timestamp: None,
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Fixed price string for a symbol, returned verbatim
    pub fn with_price(mut self, symbol: &str, price: impl Into<String>) -> Self {
        self.overrides.insert(normalize_symbol(symbol), price.into());
        self
    }

    /// Fail every call for this symbol
    pub fn failing_for(mut self, symbol: &str) -> Self {
        self.failing.insert(normalize_symbol(symbol));
        self
    }

    /// Timestamp attached to every quote (raw, may be unparseable)
    pub fn with_timestamp(mut self, timestamp: impl Into<String>) -> Self {
        self.timestamp = Some(timestamp.into());
        self
    }

    /// Sleep before answering
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of `current_price` calls so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Get base USD price for a symbol
    fn base_price(symbol: &str) -> Option<Decimal> {
        match symbol {
            "BTC" => Some(dec!(97500)),
            "ETH" => Some(dec!(3450)),
            "SOL" => Some(dec!(195)),
            "ADA" => Some(dec!(0.95)),
            "DOT" => Some(dec!(7.20)),
            "LINK" => Some(dec!(24.50)),
            "AVAX" => Some(dec!(42.00)),
            "XRP" => Some(dec!(2.35)),
            "DOGE" => Some(dec!(0.38)),
            "LTC" => Some(dec!(105)),
            _ => None,
        }
    }
}

#[async_trait]
impl PriceProvider for MockPriceProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn current_price(&self, coin: &Coin, currency: &str) -> Result<PriceQuote> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let symbol = normalize_symbol(&coin.symbol);
        if self.failing.contains(&symbol) {
            return Err(QuoteError::Provider(format!("{}: upstream unavailable for {symbol}", self.name)));
        }

        let price = match self.overrides.get(&symbol) {
            Some(price) => price.clone(),
            None => Self::base_price(&symbol)
                .ok_or_else(|| QuoteError::Provider(format!("{}: unknown symbol {symbol}", self.name)))?
                .to_string(),
        };

        Ok(PriceQuote {
            symbol,
            currency: currency.to_string(),
            price,
            provider: self.name.clone(),
            timestamp: self.timestamp.clone(),
        })
    }
}
