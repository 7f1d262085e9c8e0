//! Server Configuration
//!
//! Read once at startup from the process environment (after `.env` has been
//! loaded). Parsing goes through a lookup closure so it can be tested
//! without touching real environment variables.

use chrono::TimeDelta;
use std::str::FromStr;
use std::time::Duration;

use quote_core::{QuoteError, RefreshRoute, Result};
use quote_providers::HttpConfig;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
pub const DEFAULT_DATABASE_URL: &str = "sqlite://quotes.db";
pub const DEFAULT_JWT_ISSUER: &str = "crypto-quotes";

/// Upper bound for every configured duration
const MAX_DURATION_SECS: u64 = 366 * 24 * 60 * 60;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub database_url: String,
    pub jwt_secret: String,
    pub jwt_issuer: String,
    pub jwt_ttl_minutes: i64,
    pub refresh_cooldown: Duration,
    pub refresh_interval: Duration,
    pub refresh_timeout: Duration,
    pub refresh_routes: Vec<RefreshRoute>,
    pub binance: HttpConfig,
    pub coingecko: HttpConfig,
    pub binance_quote_currency: String,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| get(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let jwt_secret = var("JWT_SECRET")
            .ok_or_else(|| QuoteError::Config("JWT_SECRET must be set".into()))?;

        let refresh_routes = match var("REFRESH_ROUTES") {
            Some(raw) => parse_routes(&raw)?,
            None => RefreshRoute::defaults(),
        };

        let provider_timeout = var("PROVIDER_TIMEOUT_SECS")
            .is_some()
            .then(|| duration_or(&var, "PROVIDER_TIMEOUT_SECS", 0, 1))
            .transpose()?;

        let mut binance = HttpConfig::binance();
        if let Some(url) = var("BINANCE_BASE_URL") {
            binance = HttpConfig::new(url, binance.timeout);
        }
        let mut coingecko = HttpConfig::coingecko();
        if let Some(url) = var("COINGECKO_BASE_URL") {
            coingecko = HttpConfig::new(url, coingecko.timeout);
        }
        if let Some(timeout) = provider_timeout {
            binance.timeout = timeout;
            coingecko.timeout = timeout;
        }

        Ok(Self {
            bind_addr: var("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.into()),
            database_url: var("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.into()),
            jwt_secret,
            jwt_issuer: var("JWT_ISSUER").unwrap_or_else(|| DEFAULT_JWT_ISSUER.into()),
            jwt_ttl_minutes: ttl_minutes(&var)?,
            refresh_cooldown: duration_or(&var, "REFRESH_COOLDOWN_MINUTES", 20, 60)?,
            refresh_interval: duration_or(&var, "REFRESH_INTERVAL_SECS", 3600, 1)?,
            refresh_timeout: duration_or(&var, "REFRESH_TIMEOUT_SECS", 50, 1)?,
            refresh_routes,
            binance,
            coingecko,
            binance_quote_currency: var("BINANCE_QUOTE_CURRENCY").unwrap_or_else(|| "USDT".into()),
        })
    }
}

fn number_or<T: FromStr>(var: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T> {
    var(key).map_or(Ok(default), |raw| parse_number(key, &raw))
}

/// `key` counted in units of `unit_secs`, capped at `MAX_DURATION_SECS`
fn duration_or(
    var: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: u64,
    unit_secs: u64,
) -> Result<Duration> {
    let count: u64 = number_or(var, key, default)?;
    count
        .checked_mul(unit_secs)
        .filter(|secs| *secs <= MAX_DURATION_SECS)
        .map(Duration::from_secs)
        .ok_or_else(|| QuoteError::Config(format!("{key}: out of range: {count}")))
}

fn ttl_minutes(var: &impl Fn(&str) -> Option<String>) -> Result<i64> {
    let minutes: i64 = number_or(var, "JWT_TTL_MINUTES", 60)?;
    TimeDelta::try_minutes(minutes)
        .filter(|ttl| *ttl > TimeDelta::zero() && ttl.num_seconds().unsigned_abs() <= MAX_DURATION_SECS)
        .map(|_| minutes)
        .ok_or_else(|| QuoteError::Config(format!("JWT_TTL_MINUTES: out of range: {minutes}")))
}

fn parse_number<T: FromStr>(key: &str, raw: &str) -> Result<T> {
    raw.parse()
        .map_err(|_| QuoteError::Config(format!("{key}: not a valid number: {raw:?}")))
}

/// Parse `provider=CURRENCY` pairs separated by commas
pub fn parse_routes(raw: &str) -> Result<Vec<RefreshRoute>> {
    let mut routes = Vec::new();
    for pair in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (provider, currency) = pair
            .split_once('=')
            .ok_or_else(|| QuoteError::Config(format!("REFRESH_ROUTES: expected provider=CURRENCY, got {pair:?}")))?;
        let route = RefreshRoute::new(provider, currency);
        if route.provider.is_empty() || route.currency.is_empty() {
            return Err(QuoteError::Config(format!("REFRESH_ROUTES: empty side in {pair:?}")));
        }
        routes.push(route);
    }
    if routes.is_empty() {
        return Err(QuoteError::Config("REFRESH_ROUTES: no routes configured".into()));
    }
    Ok(routes)
}
