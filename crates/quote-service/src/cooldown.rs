//! Cooldown Gate
//!
//! Rate-limits manually triggered refreshes. The last successful manual run
//! is persisted, so the cooldown survives restarts.

use chrono::{DateTime, Duration as TimeDelta, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use quote_core::{Clock, QuoteError, RefreshControlRepository, RefreshSummary, Result};

use crate::refresh::{RefreshEngine, RefreshLock};

/// Default minimum spacing between manual refreshes
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(20 * 60);

/// Default time limit for one manual batch
pub const DEFAULT_RUN_TIMEOUT: Duration = Duration::from_secs(50);

/// Manual refresh with cooldown
pub struct CooldownGate {
    engine: Arc<RefreshEngine>,
    control: Arc<dyn RefreshControlRepository>,
    lock: RefreshLock,
    clock: Arc<dyn Clock>,
    cooldown: TimeDelta,
    run_timeout: Duration,
}

impl CooldownGate {
    pub fn new(
        engine: Arc<RefreshEngine>,
        control: Arc<dyn RefreshControlRepository>,
        lock: RefreshLock,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            engine,
            control,
            lock,
            clock,
            cooldown: to_delta(DEFAULT_COOLDOWN),
            run_timeout: DEFAULT_RUN_TIMEOUT,
        }
    }

    /// Override the cooldown; zero falls back to the default
    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        let cooldown = if cooldown.is_zero() { DEFAULT_COOLDOWN } else { cooldown };
        self.cooldown = to_delta(cooldown);
        self
    }

    pub fn with_run_timeout(mut self, timeout: Duration) -> Self {
        self.run_timeout = timeout;
        self
    }

    /// Whole seconds until the next manual refresh is allowed; 0 once expired.
    ///
    /// Rounded up, and never below 1 while the cooldown is active.
    pub fn retry_after(&self, last: DateTime<Utc>, now: DateTime<Utc>) -> u64 {
        let Some(until) = last.checked_add_signed(self.cooldown) else {
            return u64::MAX;
        };
        let remaining = until - now;
        if remaining <= TimeDelta::zero() {
            return 0;
        }
        let whole = remaining.num_seconds();
        let secs = if remaining > TimeDelta::seconds(whole) { whole + 1 } else { whole };
        u64::try_from(secs).unwrap_or(u64::MAX).max(1)
    }

    /// Check the cooldown, run a batch and record the run, all under the
    /// refresh lock.
    pub async fn execute(&self) -> Result<RefreshSummary> {
        let _guard = self.lock.acquire().await;
        let now = self.clock.now();

        if let Some(last) = self.control.last_manual_refresh().await? {
            let retry_after_seconds = self.retry_after(last, now);
            if retry_after_seconds > 0 {
                tracing::info!(retry_after_seconds, "Manual refresh rejected, cooldown active");
                return Err(QuoteError::CooldownActive { retry_after_seconds });
            }
        }

        let deadline = Instant::now() + self.run_timeout;
        let summary = self.engine.execute(deadline).await?;

        if let Err(e) = self.control.set_last_manual_refresh(now).await {
            tracing::warn!(error = %e, "Failed to record manual refresh time");
        }

        Ok(summary)
    }
}

fn to_delta(d: Duration) -> TimeDelta {
    TimeDelta::from_std(d).unwrap_or(TimeDelta::MAX)
}
