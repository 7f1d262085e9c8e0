//! Refresh Scheduler
//!
//! Background task that runs a refresh batch at startup and then on a fixed
//! interval, serialized with manual refreshes through the shared lock.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, Instant, MissedTickBehavior};

use quote_core::{RefreshSummary, Result};

use crate::refresh::{RefreshEngine, RefreshLock};

/// Default spacing between scheduled batches
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Default time limit for one scheduled batch
pub const DEFAULT_CYCLE_TIMEOUT: Duration = Duration::from_secs(50);

/// Periodic refresh driver
pub struct RefreshScheduler {
    engine: Arc<RefreshEngine>,
    lock: RefreshLock,
    interval: Duration,
    cycle_timeout: Duration,
}

impl RefreshScheduler {
    pub fn new(engine: Arc<RefreshEngine>, lock: RefreshLock) -> Self {
        Self {
            engine,
            lock,
            interval: DEFAULT_INTERVAL,
            cycle_timeout: DEFAULT_CYCLE_TIMEOUT,
        }
    }

    /// Zero falls back to the default
    pub fn with_interval(mut self, every: Duration) -> Self {
        self.interval = if every.is_zero() { DEFAULT_INTERVAL } else { every };
        self
    }

    pub fn with_cycle_timeout(mut self, timeout: Duration) -> Self {
        self.cycle_timeout = timeout;
        self
    }

    /// One batch under the refresh lock
    pub async fn run_once(&self) -> Result<RefreshSummary> {
        let _guard = self.lock.acquire().await;
        let deadline = Instant::now() + self.cycle_timeout;
        self.engine.execute(deadline).await
    }

    /// Start the background loop. The first tick fires immediately.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            tracing::info!(interval_secs = self.interval.as_secs(), "Refresh scheduler started");

            let mut ticker = interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                match self.run_once().await {
                    Ok(summary) => tracing::info!(
                        coins = summary.coins_processed,
                        saved = summary.quotes_saved,
                        failed = summary.failed,
                        "Scheduled refresh complete"
                    ),
                    Err(e) => tracing::error!(error = %e, "Scheduled refresh failed"),
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cooldown::CooldownGate;
    use crate::mock::MockPriceProvider;
    use async_trait::async_trait;
    use chrono::Utc;
    use quote_core::memory::{
        MemoryCoinRepository, MemoryQuoteRepository, MemoryRefreshControlRepository,
    };
    use quote_core::{Coin, ManualClock, PriceProvider, PriceQuote, ProviderRegistry};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;

    /// Provider whose first call parks until released
    struct GatedProvider {
        calls: AtomicUsize,
        entered: Notify,
        release: Notify,
    }

    impl GatedProvider {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                entered: Notify::new(),
                release: Notify::new(),
            }
        }
    }

    #[async_trait]
    impl PriceProvider for GatedProvider {
        fn name(&self) -> &str {
            "coingecko"
        }

        async fn current_price(&self, coin: &Coin, currency: &str) -> Result<PriceQuote> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                self.entered.notify_one();
                self.release.notified().await;
            }
            Ok(PriceQuote {
                symbol: coin.symbol.clone(),
                currency: currency.to_string(),
                price: "1.00".into(),
                provider: "coingecko".into(),
                timestamp: None,
            })
        }
    }

    fn engine_with(provider: Arc<dyn PriceProvider>) -> (Arc<RefreshEngine>, Arc<MemoryQuoteRepository>) {
        let quotes = Arc::new(MemoryQuoteRepository::new());
        let engine = RefreshEngine::new(
            Arc::new(MemoryCoinRepository::with_coins([Coin::new("BTC").with_coingecko_id("bitcoin")])),
            quotes.clone(),
            Arc::new(ProviderRegistry::new([provider])),
            Arc::new(ManualClock::new(Utc::now())),
        );
        (Arc::new(engine), quotes)
    }

    #[tokio::test]
    async fn test_run_once() {
        let (engine, quotes) = engine_with(Arc::new(MockPriceProvider::new("coingecko")));
        let scheduler = RefreshScheduler::new(engine, RefreshLock::new());

        let summary = scheduler.run_once().await.unwrap();
        assert_eq!(summary.quotes_saved, 1);
        assert_eq!(quotes.all().await.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_spawn_runs_immediately_then_every_interval() {
        let provider = Arc::new(MockPriceProvider::new("coingecko"));
        let (engine, _) = engine_with(provider.clone());
        let handle = RefreshScheduler::new(engine, RefreshLock::new())
            .with_interval(Duration::from_secs(10))
            .spawn();

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(provider.calls(), 1);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(provider.calls(), 2);

        handle.abort();
    }

    #[tokio::test]
    async fn test_manual_refresh_waits_for_scheduled_batch() {
        let provider = Arc::new(GatedProvider::new());
        let (engine, quotes) = engine_with(provider.clone());
        let lock = RefreshLock::new();

        let scheduler = RefreshScheduler::new(engine.clone(), lock.clone());
        let gate = CooldownGate::new(
            engine,
            Arc::new(MemoryRefreshControlRepository::new()),
            lock,
            Arc::new(ManualClock::new(Utc::now())),
        );

        let scheduled = tokio::spawn(async move { scheduler.run_once().await });
        provider.entered.notified().await;

        let manual = tokio::spawn(async move { gate.execute().await });
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!manual.is_finished());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);

        provider.release.notify_one();
        let scheduled = scheduled.await.unwrap().unwrap();
        let manual = manual.await.unwrap().unwrap();

        assert_eq!(scheduled.quotes_saved, 1);
        assert_eq!(manual.quotes_saved, 1);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
        assert_eq!(quotes.all().await.len(), 2);
    }
}
