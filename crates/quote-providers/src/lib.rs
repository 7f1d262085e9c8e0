//! # quote-providers
//!
//! HTTP market-data providers implementing `quote_core::PriceProvider`, plus
//! the resolver that validates and discovers coin identifiers.
//!
//! | Provider    | Endpoint                    | Identifier        |
//! |-------------|-----------------------------|-------------------|
//! | `binance`   | `/api/v3/ticker/price`      | `binance_symbol`  |
//! | `coingecko` | `/simple/price`, `/search`  | `coingecko_id`    |

mod binance;
mod coingecko;
mod resolver;

pub use binance::BinanceProvider;
pub use coingecko::CoinGeckoProvider;
pub use resolver::HttpCoinIdResolver;

use rust_decimal::Decimal;
use std::str::FromStr;
use std::time::Duration;

use quote_core::{QuoteError, Result};

pub const BINANCE_BASE_URL: &str = "https://api.binance.com";
pub const COINGECKO_BASE_URL: &str = "https://api.coingecko.com/api/v3";

/// Connection settings for one upstream API
#[derive(Clone, Debug)]
pub struct HttpConfig {
    /// Base URL without trailing slash
    pub base_url: String,

    /// Whole-request timeout
    pub timeout: Duration,
}

impl HttpConfig {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
        }
    }

    pub fn binance() -> Self {
        Self::new(BINANCE_BASE_URL, Duration::from_secs(5))
    }

    pub fn coingecko() -> Self {
        Self::new(COINGECKO_BASE_URL, Duration::from_secs(10))
    }

    fn client(&self) -> Result<reqwest::Client> {
        reqwest::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| QuoteError::Config(format!("http client: {e}")))
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

fn upstream(provider: &str, err: &reqwest::Error) -> QuoteError {
    QuoteError::Provider(format!("{provider}: {err}"))
}

/// Reject anything that is not a plain decimal number
fn validate_price(provider: &str, raw: &str) -> Result<String> {
    let price = raw.trim();
    match Decimal::from_str(price) {
        Ok(d) if d >= Decimal::ZERO => Ok(price.to_string()),
        _ => Err(QuoteError::Provider(format!("{provider}: invalid price {raw:?}"))),
    }
}

#[cfg(test)]
pub(crate) mod testing {
    /// Serve `router` on an ephemeral local port, returning its base URL
    pub async fn serve(router: axum::Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, router).await.unwrap() });
        format!("http://{addr}")
    }
}
