//! Quote Search
//!
//! Paginated, filtered search over persisted quote history.

use chrono::{DateTime, Duration as TimeDelta, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;

use quote_core::model::{normalize_currency, normalize_provider, normalize_symbol, parse_rfc3339};
use quote_core::{Quote, QuoteError, QuoteFilter, QuoteRepository, Result};

pub const DEFAULT_PAGE_SIZE: u32 = 50;
pub const MAX_PAGE_SIZE: u32 = 100;
pub const MAX_PAGE: u32 = 10;

/// Which end of a time range a bound is parsed for
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Bound {
    Lower,
    Upper,
}

/// Parse a time bound: RFC 3339, or `YYYY-MM-DD` expanded to the start or
/// the last microsecond of that day.
pub fn parse_time_bound(raw: &str, bound: Bound) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Some(at) = parse_rfc3339(raw) {
        return Some(at);
    }
    let day = NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()?;
    let start = day.and_hms_opt(0, 0, 0)?.and_utc();
    match bound {
        Bound::Lower => Some(start),
        Bound::Upper => Some(start + TimeDelta::days(1) - TimeDelta::microseconds(1)),
    }
}

/// Typed search request; empty strings mean "no filter"
#[derive(Clone, Debug, Default)]
pub struct QuoteSearchInput {
    pub symbol: Option<String>,
    pub provider: Option<String>,
    pub currency: Option<String>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SearchSummary {
    pub total_items: u64,
    pub total_pages: u64,
    pub page: u32,
    pub page_size: u32,
}

#[derive(Clone, Debug, Serialize)]
pub struct QuoteSearchOutput {
    pub items: Vec<Quote>,
    pub summary: SearchSummary,
}

/// Quote search use case
pub struct QuoteSearch {
    quotes: Arc<dyn QuoteRepository>,
}

impl QuoteSearch {
    pub fn new(quotes: Arc<dyn QuoteRepository>) -> Self {
        Self { quotes }
    }

    /// Normalize the input into a repository filter
    pub fn build_filter(input: &QuoteSearchInput) -> Result<QuoteFilter> {
        let page = match input.page {
            None => 1,
            Some(p) if p <= 0 => 1,
            Some(p) => u32::try_from(p).unwrap_or(u32::MAX),
        };
        if page > MAX_PAGE {
            return Err(QuoteError::InvalidFilters(format!("page must be <= {MAX_PAGE}")));
        }

        let page_size = match input.page_size {
            None => DEFAULT_PAGE_SIZE,
            Some(s) if s <= 0 => DEFAULT_PAGE_SIZE,
            Some(s) => u32::try_from(s).unwrap_or(u32::MAX).min(MAX_PAGE_SIZE),
        };

        let non_empty = |v: &Option<String>, norm: fn(&str) -> String| {
            v.as_deref().map(norm).filter(|s| !s.is_empty())
        };

        Ok(QuoteFilter {
            symbol: non_empty(&input.symbol, normalize_symbol),
            provider: non_empty(&input.provider, normalize_provider),
            currency: non_empty(&input.currency, normalize_currency),
            min_price: input.min_price,
            max_price: input.max_price,
            from: input.from,
            to: input.to,
            page,
            page_size,
        })
    }

    pub async fn execute(&self, input: &QuoteSearchInput) -> Result<QuoteSearchOutput> {
        let filter = Self::build_filter(input)?;
        let page = self.quotes.list(&filter).await?;

        let size = u64::from(filter.page_size);
        let total_pages = page.total.div_ceil(size).min(u64::from(MAX_PAGE));

        Ok(QuoteSearchOutput {
            items: page.items,
            summary: SearchSummary {
                total_items: page.total,
                total_pages,
                page: filter.page,
                page_size: filter.page_size,
            },
        })
    }
}
