//! Refresh Engine
//!
//! Fans out over every enabled coin × configured route, fetching a price
//! from the route's provider and appending it to quote history. Each cell
//! fails independently; a batch only errors when the coin list itself
//! cannot be loaded.

use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::time::{timeout_at, Instant};

use quote_core::model::parse_rfc3339;
use quote_core::{
    Clock, Coin, CoinRepository, NewQuote, ProviderRegistry, QuoteError, QuoteRepository,
    RefreshRoute, RefreshSummary, Result,
};

/// Default number of cells fetched concurrently
pub const DEFAULT_MAX_CONCURRENCY: usize = 4;

/// Process-wide mutual exclusion between refresh batches.
///
/// Created once by the composition root and cloned into every component
/// that runs the engine.
#[derive(Clone, Debug, Default)]
pub struct RefreshLock(Arc<Mutex<()>>);

impl RefreshLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access
    pub async fn acquire(&self) -> OwnedMutexGuard<()> {
        Arc::clone(&self.0).lock_owned().await
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum CellOutcome {
    Saved,
    Failed,
    Skipped,
}

/// Refresh engine shared by the scheduler and the cooldown gate
pub struct RefreshEngine {
    coins: Arc<dyn CoinRepository>,
    quotes: Arc<dyn QuoteRepository>,
    registry: Arc<ProviderRegistry>,
    routes: Vec<RefreshRoute>,
    clock: Arc<dyn Clock>,
    max_concurrency: usize,
}

impl RefreshEngine {
    pub fn new(
        coins: Arc<dyn CoinRepository>,
        quotes: Arc<dyn QuoteRepository>,
        registry: Arc<ProviderRegistry>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            coins,
            quotes,
            registry,
            routes: RefreshRoute::defaults(),
            clock,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
        }
    }

    /// Replace the provider → currency routes
    pub fn with_routes(mut self, routes: Vec<RefreshRoute>) -> Self {
        self.routes = routes;
        self
    }

    /// Bound the fan-out; zero is treated as one
    pub fn with_max_concurrency(mut self, max: usize) -> Self {
        self.max_concurrency = max.max(1);
        self
    }

    pub fn routes(&self) -> &[RefreshRoute] {
        &self.routes
    }

    /// Run one batch. Every call inside is bounded by `deadline`.
    pub async fn execute(&self, deadline: Instant) -> Result<RefreshSummary> {
        let coins = timeout_at(deadline, self.coins.list_enabled())
            .await
            .map_err(|_| QuoteError::DeadlineExceeded("loading enabled coins".into()))??;

        let cells: Vec<(&Coin, &RefreshRoute)> = coins
            .iter()
            .flat_map(|coin| self.routes.iter().map(move |route| (coin, route)))
            .collect();

        let cell_futures: Vec<_> = cells
            .into_iter()
            .map(|(coin, route)| self.refresh_cell(coin, route, deadline))
            .collect();

        let outcomes: Vec<CellOutcome> = stream::iter(cell_futures)
            .buffer_unordered(self.max_concurrency)
            .collect()
            .await;

        let summary = outcomes.iter().fold(
            RefreshSummary {
                coins_processed: coins.len(),
                ..RefreshSummary::default()
            },
            |mut acc, outcome| {
                match outcome {
                    CellOutcome::Saved => acc.quotes_saved += 1,
                    CellOutcome::Failed => acc.failed += 1,
                    CellOutcome::Skipped => {}
                }
                acc
            },
        );

        tracing::info!(
            coins = summary.coins_processed,
            saved = summary.quotes_saved,
            failed = summary.failed,
            "Refresh batch finished"
        );
        Ok(summary)
    }

    async fn refresh_cell(&self, coin: &Coin, route: &RefreshRoute, deadline: Instant) -> CellOutcome {
        if !coin.is_eligible_for(&route.provider) {
            tracing::debug!(symbol = %coin.symbol, provider = %route.provider, "No provider id, skipping");
            return CellOutcome::Skipped;
        }

        let Some(provider) = self.registry.get(&route.provider) else {
            tracing::warn!(provider = %route.provider, "Route names an unregistered provider");
            return CellOutcome::Failed;
        };

        let quote = match timeout_at(deadline, provider.current_price(coin, &route.currency)).await {
            Ok(Ok(quote)) => quote,
            Ok(Err(e)) => {
                tracing::warn!(
                    symbol = %coin.symbol,
                    provider = %route.provider,
                    retryable = e.is_retryable(),
                    error = %e,
                    "Price fetch failed"
                );
                return CellOutcome::Failed;
            }
            Err(_) => {
                tracing::warn!(symbol = %coin.symbol, provider = %route.provider, "Price fetch hit the deadline");
                return CellOutcome::Failed;
            }
        };

        let quoted_at = quote
            .timestamp
            .as_deref()
            .and_then(parse_rfc3339)
            .unwrap_or_else(|| self.clock.now());

        let row = NewQuote {
            coin_id: coin.id,
            symbol: coin.symbol.clone(),
            provider: route.provider.clone(),
            currency: route.currency.clone(),
            price: quote.price,
            quoted_at,
        };

        match timeout_at(deadline, self.quotes.insert(&row)).await {
            Ok(Ok(_)) => CellOutcome::Saved,
            Ok(Err(e)) => {
                tracing::warn!(symbol = %coin.symbol, provider = %route.provider, error = %e, "Quote insert failed");
                CellOutcome::Failed
            }
            Err(_) => {
                tracing::warn!(symbol = %coin.symbol, provider = %route.provider, "Quote insert hit the deadline");
                CellOutcome::Failed
            }
        }
    }
}
