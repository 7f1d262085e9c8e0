//! Router

use axum::{
    Router, middleware,
    routing::{get, post, put},
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::auth::require_auth;
use crate::handlers::{
    add_favorite, create_coin, health_check, latest_price, list_favorites, live_price, login, me,
    refresh_quotes, register, remove_favorite, search_quotes, update_coin,
};
use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    let public = Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/crypto/price", get(latest_price))
        .route("/crypto/price/live", get(live_price))
        .route("/quotes", get(search_quotes));

    let protected = Router::new()
        .route("/job/refresh", post(refresh_quotes))
        .route("/coins", post(create_coin))
        .route("/coins/{symbol}", put(update_coin))
        .route("/users/me/favorites", get(list_favorites))
        .route("/users/me/favorites/{symbol}", post(add_favorite).delete(remove_favorite))
        .route("/me", get(me))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        .nest("/api/v1", public.merge(protected))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
