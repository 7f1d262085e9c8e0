//! # quote-core
//!
//! Domain model, error taxonomy and the contracts every other crate in the
//! quote service is written against.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      quote-service                          │
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────────────┐  │
//! │  │  Refresh    │  │  Provider   │  │   Repositories      │  │
//! │  │  Engine     │──│  Registry   │──│   (Strategy)        │  │
//! │  └─────────────┘  └─────────────┘  └─────────────────────┘  │
//! └─────────────────────────────────────────────────────────────┘
//!         │                  │                     │
//!    quote-server     quote-providers        quote-storage
//! ```
//!
//! The `PriceProvider` and repository traits let the HTTP providers and the
//! SQLite store be swapped for in-memory fakes without touching use cases.

pub mod clock;
pub mod error;
pub mod memory;
pub mod model;
pub mod provider;
pub mod repository;
pub mod security;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{ErrorKind, QuoteError, Result};
pub use model::{
    AuthClaims, Coin, NewQuote, NewUser, PriceQuote, Quote, QuoteFilter, QuotePage,
    RefreshRoute, RefreshSummary, User,
};
pub use provider::{CoinIdResolver, PriceProvider, ProviderRegistry};
pub use repository::{
    CoinRepository, FavoritesRepository, QuoteRepository, RefreshControlRepository,
    UserRepository,
};
pub use security::{PasswordHasher, TokenService};
