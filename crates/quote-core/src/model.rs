//! Domain Models
//!
//! Core data types for coins, persisted quotes, users and refresh results.
//! Prices travel as decimal strings end to end - never use f64 for money!

use chrono::{DateTime, SecondsFormat, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::provider::{BINANCE, COINGECKO};

/// Canonical symbol form: trimmed, uppercase
pub fn normalize_symbol(raw: &str) -> String {
    raw.trim().to_uppercase()
}

/// Canonical provider form: trimmed, lowercase
pub fn normalize_provider(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Canonical currency form: trimmed, uppercase
pub fn normalize_currency(raw: &str) -> String {
    raw.trim().to_uppercase()
}

/// RFC 3339 with whole seconds and a `Z` suffix
pub fn format_rfc3339(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Parse an RFC 3339 timestamp into UTC
pub fn parse_rfc3339(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// A tracked cryptocurrency
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coin {
    pub id: i64,

    /// Ticker symbol (e.g., "BTC"), unique and uppercase
    pub symbol: String,

    /// Gates refresh and price lookups
    pub enabled: bool,

    /// CoinGecko asset id (e.g., "bitcoin")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coingecko_id: Option<String>,

    /// Binance trading pair (e.g., "BTCUSDT")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub binance_symbol: Option<String>,
}

impl Coin {
    pub fn new(symbol: impl AsRef<str>) -> Self {
        Self {
            id: 0,
            symbol: normalize_symbol(symbol.as_ref()),
            enabled: true,
            coingecko_id: None,
            binance_symbol: None,
        }
    }

    pub fn with_coingecko_id(mut self, id: impl Into<String>) -> Self {
        self.coingecko_id = Some(id.into());
        self
    }

    pub fn with_binance_symbol(mut self, pair: impl Into<String>) -> Self {
        self.binance_symbol = Some(pair.into());
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Whether the coin carries the identifier `provider` needs.
    ///
    /// Providers without a known identifier requirement are always eligible.
    pub fn is_eligible_for(&self, provider: &str) -> bool {
        let present = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
        match normalize_provider(provider).as_str() {
            BINANCE => present(&self.binance_symbol),
            COINGECKO => present(&self.coingecko_id),
            _ => true,
        }
    }
}

/// A quote about to be appended to history
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewQuote {
    pub coin_id: i64,
    pub symbol: String,
    pub provider: String,
    pub currency: String,
    pub price: String,
    pub quoted_at: DateTime<Utc>,
}

/// A persisted quote row
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    pub id: i64,
    pub coin_id: i64,
    pub symbol: String,
    pub provider: String,
    pub currency: String,

    /// Decimal string, exactly as received
    pub price: String,
    pub quoted_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Quote {
    /// Project into the API price shape
    pub fn to_price_quote(&self) -> PriceQuote {
        PriceQuote {
            symbol: self.symbol.clone(),
            currency: self.currency.clone(),
            price: self.price.clone(),
            provider: self.provider.clone(),
            timestamp: Some(format_rfc3339(self.quoted_at)),
        }
    }
}

/// A single price observation as returned by a provider or lookup
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceQuote {
    pub symbol: String,
    pub currency: String,
    pub price: String,
    pub provider: String,

    /// RFC 3339; providers may leave it empty
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

/// A registered account
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub name: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewUser {
    pub email: String,
    pub name: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

/// Repository-facing quote search input
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct QuoteFilter {
    pub symbol: Option<String>,
    pub provider: Option<String>,
    pub currency: Option<String>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub page: u32,
    pub page_size: u32,
}

impl QuoteFilter {
    /// Rows to skip for the requested page
    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.page_size)
    }

    /// Whether a quote satisfies every set criterion
    pub fn matches(&self, quote: &Quote) -> bool {
        if self.symbol.as_ref().is_some_and(|s| *s != quote.symbol)
            || self.provider.as_ref().is_some_and(|p| *p != quote.provider)
            || self.currency.as_ref().is_some_and(|c| *c != quote.currency)
            || self.from.is_some_and(|from| quote.quoted_at < from)
            || self.to.is_some_and(|to| quote.quoted_at > to)
        {
            return false;
        }
        if self.min_price.is_none() && self.max_price.is_none() {
            return true;
        }
        let Ok(price) = quote.price.parse::<Decimal>() else {
            return false;
        };
        self.min_price.is_none_or(|min| price >= min) && self.max_price.is_none_or(|max| price <= max)
    }
}

/// One page of search results plus the unpaged total
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct QuotePage {
    pub items: Vec<Quote>,
    pub total: u64,
}

/// Outcome of one refresh batch
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshSummary {
    pub coins_processed: usize,
    pub quotes_saved: usize,
    pub failed: usize,
}

/// Identity carried by a verified token
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthClaims {
    pub user_id: i64,
    pub email: String,
}

/// One (provider, settlement currency) pair of the refresh configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshRoute {
    pub provider: String,
    pub currency: String,
}

impl RefreshRoute {
    pub fn new(provider: &str, currency: &str) -> Self {
        Self {
            provider: normalize_provider(provider),
            currency: normalize_currency(currency),
        }
    }

    /// Binance settles in USDT, CoinGecko in USD
    pub fn defaults() -> Vec<Self> {
        vec![Self::new(BINANCE, "USDT"), Self::new(COINGECKO, "USD")]
    }
}
