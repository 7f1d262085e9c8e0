//! API Error Mapping
//!
//! Every failure leaves the server as `{"error": code}` with a status picked
//! from the error's kind. Unavailable-class details are logged, never sent.

use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use quote_core::{ErrorKind, QuoteError};

#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Domain(#[from] QuoteError),

    /// A query parameter failed to parse; carries the response code
    #[error("invalid query parameter: {0}")]
    InvalidParam(&'static str),

    #[error("invalid request body: {0}")]
    InvalidBody(String),

    #[error("missing bearer token")]
    MissingToken,

    #[error("invalid bearer token")]
    InvalidToken,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidParam(_) | Self::InvalidBody(_) => StatusCode::BAD_REQUEST,
            Self::MissingToken | Self::InvalidToken => StatusCode::UNAUTHORIZED,
            Self::Domain(e) => match e.kind() {
                ErrorKind::Validation => StatusCode::BAD_REQUEST,
                ErrorKind::NotFound => StatusCode::NOT_FOUND,
                ErrorKind::Conflict => StatusCode::CONFLICT,
                ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
                ErrorKind::RateLimited => StatusCode::TOO_MANY_REQUESTS,
                ErrorKind::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            },
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Domain(e) => e.code(),
            Self::InvalidParam(code) => code,
            Self::InvalidBody(_) => "invalid_body",
            Self::MissingToken => "missing_token",
            Self::InvalidToken => "invalid_token",
        }
    }

    /// Whether the client may get a different answer by retrying as is
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Domain(e) if e.is_retryable())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::InvalidBody(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::Domain(QuoteError::BadRequest(rejection.body_text()))
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self::Domain(QuoteError::BadRequest(rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status == StatusCode::SERVICE_UNAVAILABLE {
            if self.is_transient() {
                tracing::warn!(error = %self, "Request failed, upstream or storage unavailable");
            } else {
                tracing::error!(error = %self, "Request failed");
            }
        } else {
            tracing::debug!(status = status.as_u16(), error = %self, "Request rejected");
        }

        let retry_after = match &self {
            Self::Domain(e) => e.retry_after_seconds(),
            _ => None,
        };

        let mut body = json!({ "error": self.code() });
        if let Some(secs) = retry_after {
            body["retry_after_seconds"] = json!(secs);
        }

        let mut response = (status, Json(body)).into_response();
        if let Some(secs) = retry_after {
            if let Ok(value) = HeaderValue::from_str(&secs.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
