//! Crypto Quote HTTP Server
//!
//! Axum-based server exposing price lookups, quote history search, coin
//! management, favorites and manual refresh, with a background scheduler
//! refreshing quotes on a fixed interval.

mod auth;
mod config;
mod error;
mod extract;
mod handlers;
mod routes;
mod state;

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use quote_core::{CoinIdResolver, PriceProvider, ProviderRegistry, SystemClock};
use quote_providers::{BinanceProvider, CoinGeckoProvider, HttpCoinIdResolver};
use quote_security::{Argon2Hasher, JwtTokenService};
use quote_service::{RefreshEngine, RefreshLock, RefreshScheduler};
use quote_storage::{
    SqliteCoinRepository, SqliteFavoritesRepository, SqliteQuoteRepository,
    SqliteRefreshControlRepository, SqliteUserRepository, init_database,
};

use crate::config::ServerConfig;
use crate::state::{AppState, Stores, Wiring};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env()?;

    // Storage
    let pool = init_database(&config.database_url).await?;
    let stores = Stores {
        coins: Arc::new(SqliteCoinRepository::new(pool.clone())),
        quotes: Arc::new(SqliteQuoteRepository::new(pool.clone())),
        users: Arc::new(SqliteUserRepository::new(pool.clone())),
        favorites: Arc::new(SqliteFavoritesRepository::new(pool.clone())),
        control: Arc::new(SqliteRefreshControlRepository::new(pool)),
    };

    // Providers
    let registry = Arc::new(ProviderRegistry::new([
        Arc::new(BinanceProvider::new(config.binance.clone())?) as Arc<dyn PriceProvider>,
        Arc::new(CoinGeckoProvider::new(config.coingecko.clone())?),
    ]));
    let resolver: Arc<dyn CoinIdResolver> =
        Arc::new(HttpCoinIdResolver::new(config.binance.clone(), config.coingecko.clone())?);

    tracing::info!("Registered {} providers:", registry.len());
    for name in registry.names() {
        tracing::info!("  • {}", name);
    }
    for route in &config.refresh_routes {
        if !registry.contains(&route.provider) {
            tracing::warn!(provider = %route.provider, "Refresh route names an unregistered provider");
        }
    }

    // Refresh engine shared by the scheduler and manual refreshes
    let clock = Arc::new(SystemClock);
    let lock = RefreshLock::new();
    let engine = Arc::new(
        RefreshEngine::new(stores.coins.clone(), stores.quotes.clone(), registry.clone(), clock.clone())
            .with_routes(config.refresh_routes.clone()),
    );

    let scheduler = RefreshScheduler::new(engine.clone(), lock.clone())
        .with_interval(config.refresh_interval)
        .with_cycle_timeout(config.refresh_timeout)
        .spawn();

    let state = AppState::from_wiring(Wiring {
        stores,
        registry,
        resolver: Some(resolver),
        hasher: Arc::new(Argon2Hasher::new()),
        tokens: Arc::new(JwtTokenService::new(config.jwt_secret.as_bytes(), config.jwt_issuer.clone())?),
        clock,
        engine,
        lock,
        token_ttl_minutes: config.jwt_ttl_minutes,
        cooldown: config.refresh_cooldown,
        run_timeout: config.refresh_timeout,
        binance_quote_currency: config.binance_quote_currency.clone(),
    });

    let app = routes::router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;

    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("crypto quote server running on http://{}", config.bind_addr);
    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("");
    tracing::info!("Endpoints:");
    tracing::info!("  GET    /health                        - Health check");
    tracing::info!("  POST   /api/v1/auth/register          - Create account");
    tracing::info!("  POST   /api/v1/auth/login             - Get bearer token");
    tracing::info!("  GET    /api/v1/crypto/price           - Latest stored price");
    tracing::info!("  GET    /api/v1/crypto/price/live      - Live provider price");
    tracing::info!("  GET    /api/v1/quotes                 - Search quote history");
    tracing::info!("  POST   /api/v1/job/refresh            - Manual refresh (auth)");
    tracing::info!("  POST   /api/v1/coins                  - Create coin (auth)");
    tracing::info!("  PUT    /api/v1/coins/{{symbol}}         - Update coin (auth)");
    tracing::info!("  GET    /api/v1/users/me/favorites     - List favorites (auth)");
    tracing::info!("  GET    /api/v1/me                     - Current identity (auth)");
    tracing::info!("");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    scheduler.abort();
    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
