//! HTTP Handlers

use axum::{Extension, Json, extract::State, http::StatusCode};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use quote_core::{AuthClaims, Coin, PriceQuote, RefreshSummary};
use quote_service::search::{Bound, parse_time_bound};
use quote_service::{
    CreateCoinInput, FavoriteChange, LoginInput, LoginOutput, QuoteSearchInput, QuoteSearchOutput,
    RegisterInput, RegisteredUser, UpdateCoinInput,
};

use crate::error::{ApiError, ApiResult};
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::state::AppState;

// ============================================================================
// Request / Response Types
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub providers: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PriceQuery {
    pub symbol: Option<String>,
    pub currency: Option<String>,
    pub provider: Option<String>,
}

/// Raw quote search parameters, parsed one by one so each bad value gets
/// its own error code
#[derive(Debug, Default, Deserialize)]
pub struct QuotesQuery {
    pub symbol: Option<String>,
    pub provider: Option<String>,
    pub currency: Option<String>,
    pub min_price: Option<String>,
    pub max_price: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub page: Option<String>,
    pub page_size: Option<String>,
}

fn present(raw: Option<&String>) -> Option<&str> {
    raw.map(|s| s.trim()).filter(|s| !s.is_empty())
}

fn parse_price(raw: Option<&String>, code: &'static str) -> ApiResult<Option<Decimal>> {
    present(raw)
        .map(|v| {
            Decimal::from_str(v)
                .or_else(|_| Decimal::from_scientific(v))
                .map_err(|_| ApiError::InvalidParam(code))
        })
        .transpose()
}

fn parse_int(raw: Option<&String>, code: &'static str) -> ApiResult<Option<i64>> {
    present(raw)
        .map(|v| v.parse::<i64>().map_err(|_| ApiError::InvalidParam(code)))
        .transpose()
}

impl QuotesQuery {
    pub fn into_input(self) -> ApiResult<QuoteSearchInput> {
        let time = |raw: Option<&String>, bound, code| {
            present(raw)
                .map(|v| parse_time_bound(v, bound).ok_or(ApiError::InvalidParam(code)))
                .transpose()
        };

        Ok(QuoteSearchInput {
            min_price: parse_price(self.min_price.as_ref(), "invalid_min_price")?,
            max_price: parse_price(self.max_price.as_ref(), "invalid_max_price")?,
            from: time(self.from.as_ref(), Bound::Lower, "invalid_from")?,
            to: time(self.to.as_ref(), Bound::Upper, "invalid_to")?,
            page: parse_int(self.page.as_ref(), "invalid_page")?,
            page_size: parse_int(self.page_size.as_ref(), "invalid_page_size")?,
            symbol: self.symbol,
            provider: self.provider,
            currency: self.currency,
        })
    }
}

// ============================================================================
// Public Handlers
// ============================================================================

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        providers: state.registry.names().into_iter().map(str::to_string).collect(),
    })
}

pub async fn register(
    State(state): State<AppState>,
    ApiJson(input): ApiJson<RegisterInput>,
) -> ApiResult<(StatusCode, Json<RegisteredUser>)> {
    let user = state.registration.execute(input).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn login(
    State(state): State<AppState>,
    ApiJson(input): ApiJson<LoginInput>,
) -> ApiResult<Json<LoginOutput>> {
    Ok(Json(state.login.execute(input).await?))
}

/// Most recent persisted price
pub async fn latest_price(
    State(state): State<AppState>,
    ApiQuery(q): ApiQuery<PriceQuery>,
) -> ApiResult<Json<PriceQuote>> {
    let quote = state
        .latest_price
        .execute(
            q.symbol.as_deref().unwrap_or_default(),
            q.currency.as_deref(),
            q.provider.as_deref(),
        )
        .await?;
    Ok(Json(quote))
}

/// Price fetched from the provider on demand
pub async fn live_price(
    State(state): State<AppState>,
    ApiQuery(q): ApiQuery<PriceQuery>,
) -> ApiResult<Json<PriceQuote>> {
    let quote = state
        .live_price
        .execute(
            q.symbol.as_deref().unwrap_or_default(),
            q.currency.as_deref().unwrap_or_default(),
            q.provider.as_deref().unwrap_or_default(),
        )
        .await?;
    Ok(Json(quote))
}

pub async fn search_quotes(
    State(state): State<AppState>,
    ApiQuery(q): ApiQuery<QuotesQuery>,
) -> ApiResult<Json<QuoteSearchOutput>> {
    let input = q.into_input()?;
    Ok(Json(state.search.execute(&input).await?))
}

// ============================================================================
// Protected Handlers
// ============================================================================

/// Manual refresh, subject to the cooldown
pub async fn refresh_quotes(State(state): State<AppState>) -> ApiResult<Json<RefreshSummary>> {
    let summary = state.refresh.execute().await?;
    tracing::info!(
        coins = summary.coins_processed,
        saved = summary.quotes_saved,
        failed = summary.failed,
        "Manual refresh complete"
    );
    Ok(Json(summary))
}

pub async fn create_coin(
    State(state): State<AppState>,
    ApiJson(input): ApiJson<CreateCoinInput>,
) -> ApiResult<Json<Coin>> {
    Ok(Json(state.coins.create(input).await?))
}

pub async fn update_coin(
    State(state): State<AppState>,
    ApiPath(symbol): ApiPath<String>,
    ApiJson(input): ApiJson<UpdateCoinInput>,
) -> ApiResult<Json<Coin>> {
    Ok(Json(state.coins.update(&symbol, input).await?))
}

pub async fn list_favorites(
    State(state): State<AppState>,
    Extension(claims): Extension<AuthClaims>,
) -> ApiResult<Json<Vec<Coin>>> {
    Ok(Json(state.favorites.list(claims.user_id).await?))
}

pub async fn add_favorite(
    State(state): State<AppState>,
    Extension(claims): Extension<AuthClaims>,
    ApiPath(symbol): ApiPath<String>,
) -> ApiResult<Json<FavoriteChange>> {
    Ok(Json(state.favorites.add(claims.user_id, &symbol).await?))
}

pub async fn remove_favorite(
    State(state): State<AppState>,
    Extension(claims): Extension<AuthClaims>,
    ApiPath(symbol): ApiPath<String>,
) -> ApiResult<Json<FavoriteChange>> {
    Ok(Json(state.favorites.remove(claims.user_id, &symbol).await?))
}

/// Identity carried by the bearer token
pub async fn me(Extension(claims): Extension<AuthClaims>) -> Json<AuthClaims> {
    Json(claims)
}
