//! Application State

use std::sync::Arc;
use std::time::Duration;

use quote_core::{
    Clock, CoinIdResolver, CoinRepository, FavoritesRepository, PasswordHasher, ProviderRegistry,
    QuoteRepository, RefreshControlRepository, TokenService, UserRepository,
};
use quote_service::{
    CoinManager, CooldownGate, Favorites, LatestPrice, LivePrice, Login, QuoteSearch, RefreshEngine,
    RefreshLock, Registration,
};

/// Repository handles, one per table
#[derive(Clone)]
pub struct Stores {
    pub coins: Arc<dyn CoinRepository>,
    pub quotes: Arc<dyn QuoteRepository>,
    pub users: Arc<dyn UserRepository>,
    pub favorites: Arc<dyn FavoritesRepository>,
    pub control: Arc<dyn RefreshControlRepository>,
}

/// Everything the composition root hands over to build the state
pub struct Wiring {
    pub stores: Stores,
    pub registry: Arc<ProviderRegistry>,
    pub resolver: Option<Arc<dyn CoinIdResolver>>,
    pub hasher: Arc<dyn PasswordHasher>,
    pub tokens: Arc<dyn TokenService>,
    pub clock: Arc<dyn Clock>,
    pub engine: Arc<RefreshEngine>,
    pub lock: RefreshLock,
    pub token_ttl_minutes: i64,
    pub cooldown: Duration,
    pub run_timeout: Duration,
    pub binance_quote_currency: String,
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Registered price providers (also reported by `/health`)
    pub registry: Arc<ProviderRegistry>,

    /// Bearer token verification for protected routes
    pub tokens: Arc<dyn TokenService>,

    pub registration: Arc<Registration>,
    pub login: Arc<Login>,
    pub latest_price: Arc<LatestPrice>,
    pub live_price: Arc<LivePrice>,
    pub search: Arc<QuoteSearch>,
    pub refresh: Arc<CooldownGate>,
    pub coins: Arc<CoinManager>,
    pub favorites: Arc<Favorites>,
}

impl AppState {
    pub fn from_wiring(w: Wiring) -> Self {
        let Stores { coins, quotes, users, favorites, control } = w.stores;

        let mut coin_manager = CoinManager::new(coins.clone(), w.registry.clone())
            .with_binance_quote_currency(&w.binance_quote_currency);
        if let Some(resolver) = w.resolver {
            coin_manager = coin_manager.with_resolver(resolver);
        }

        Self {
            registration: Arc::new(Registration::new(users.clone(), w.hasher.clone(), w.clock.clone())),
            login: Arc::new(
                Login::new(users, w.hasher, w.tokens.clone(), w.clock.clone())
                    .with_ttl_minutes(w.token_ttl_minutes),
            ),
            latest_price: Arc::new(LatestPrice::new(coins.clone(), quotes.clone())),
            live_price: Arc::new(LivePrice::new(coins.clone(), w.registry.clone(), w.clock.clone())),
            search: Arc::new(QuoteSearch::new(quotes)),
            refresh: Arc::new(
                CooldownGate::new(w.engine, control, w.lock, w.clock)
                    .with_cooldown(w.cooldown)
                    .with_run_timeout(w.run_timeout),
            ),
            coins: Arc::new(coin_manager),
            favorites: Arc::new(Favorites::new(coins, favorites)),
            registry: w.registry,
            tokens: w.tokens,
        }
    }
}
