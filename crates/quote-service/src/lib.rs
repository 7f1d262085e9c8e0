//! # quote-service
//!
//! Use cases of the crypto quote service, written against the `quote-core`
//! contracts only.
//!
//! ```text
//!   RefreshScheduler ──┐
//!                      ├── RefreshLock ── RefreshEngine ── ProviderRegistry
//!   CooldownGate ──────┘                       │
//!                                         QuoteRepository
//! ```
//!
//! A manual refresh that arrives while a scheduled batch is running waits
//! for it, then runs; batches never interleave.

pub mod auth;
pub mod coins;
pub mod cooldown;
pub mod favorites;
pub mod mock;
pub mod prices;
pub mod refresh;
pub mod scheduler;
pub mod search;

pub use auth::{LoginInput, LoginOutput, Login, RegisterInput, RegisteredUser, Registration};
pub use coins::{CoinManager, CreateCoinInput, UpdateCoinInput};
pub use cooldown::CooldownGate;
pub use favorites::{FavoriteChange, Favorites};
pub use mock::MockPriceProvider;
pub use prices::{LatestPrice, LivePrice};
pub use refresh::{RefreshEngine, RefreshLock};
pub use scheduler::RefreshScheduler;
pub use search::{QuoteSearch, QuoteSearchInput, QuoteSearchOutput, SearchSummary};
