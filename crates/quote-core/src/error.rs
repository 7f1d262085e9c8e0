//! Error Types

use thiserror::Error;

/// Result type alias for quote service operations
pub type Result<T> = std::result::Result<T, QuoteError>;

/// Coarse classification used by transports to pick a status code
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad input shape or range
    Validation,
    /// Missing or disabled resource
    NotFound,
    /// Uniqueness violation
    Conflict,
    /// Missing or rejected credentials
    Unauthorized,
    /// Cooldown still running
    RateLimited,
    /// Upstream or storage failure, opaque to callers
    Unavailable,
}

/// Quote service error types
#[derive(Error, Debug)]
pub enum QuoteError {
    /// Required input missing or malformed
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Search filters out of range
    #[error("Invalid filters: {0}")]
    InvalidFilters(String),

    /// Coin unknown or disabled
    #[error("Coin not enabled: {0}")]
    CoinNotEnabled(String),

    /// Coin does not exist at all
    #[error("Coin not found: {0}")]
    CoinNotFound(String),

    /// No persisted quote matches
    #[error("Quote not found: {0}")]
    QuoteNotFound(String),

    /// Provider name not in the registry
    #[error("Provider not supported: {0}")]
    ProviderNotSupported(String),

    /// A live provider call failed on behalf of a user request
    #[error("External service error: {0}")]
    ExternalService(String),

    #[error("Invalid email")]
    InvalidEmail,

    #[error("Invalid password")]
    InvalidPassword,

    #[error("Invalid name")]
    InvalidName,

    #[error("Email already registered")]
    EmailAlreadyRegistered,

    /// Unknown email or wrong password, deliberately indistinguishable
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Invalid coin input: {0}")]
    InvalidCoinInput(String),

    /// Neither provider identifier could be found for the coin
    #[error("Coin not resolvable: {0}")]
    CoinNotResolvable(String),

    #[error("Invalid coin update: {0}")]
    InvalidCoinUpdate(String),

    /// Manual refresh requested before the cooldown expired
    #[error("Cooldown active, retry after {retry_after_seconds}s")]
    CooldownActive { retry_after_seconds: u64 },

    /// Missing or invalid bearer token
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Raw price provider failure
    #[error("Provider error: {0}")]
    Provider(String),

    /// Persistence layer failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// The caller-supplied deadline elapsed
    #[error("Deadline exceeded: {0}")]
    DeadlineExceeded(String),

    /// Token signing or hashing failure
    #[error("Security error: {0}")]
    Security(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl QuoteError {
    /// Machine-readable code surfaced in API error bodies
    pub fn code(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "bad_request",
            Self::InvalidFilters(_) => "invalid_filters",
            Self::CoinNotEnabled(_) => "coin_not_enabled",
            Self::CoinNotFound(_) => "coin_not_found",
            Self::QuoteNotFound(_) => "quote_not_found",
            Self::ProviderNotSupported(_) => "provider_not_supported",
            Self::ExternalService(_) => "external_service_error",
            Self::InvalidEmail => "invalid_email",
            Self::InvalidPassword => "invalid_password",
            Self::InvalidName => "invalid_name",
            Self::EmailAlreadyRegistered => "email_already_registered",
            Self::InvalidCredentials => "invalid_credentials",
            Self::InvalidCoinInput(_) => "invalid_coin_input",
            Self::CoinNotResolvable(_) => "coin_not_resolvable",
            Self::InvalidCoinUpdate(_) => "invalid_coin_update",
            Self::CooldownActive { .. } => "cooldown_active",
            Self::Unauthorized(_) => "unauthorized",
            Self::Provider(_)
            | Self::Storage(_)
            | Self::DeadlineExceeded(_)
            | Self::Security(_)
            | Self::Config(_) => "internal_error",
        }
    }

    /// Classify for transport mapping
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::BadRequest(_)
            | Self::InvalidFilters(_)
            | Self::ProviderNotSupported(_)
            | Self::InvalidEmail
            | Self::InvalidPassword
            | Self::InvalidName
            | Self::InvalidCoinInput(_)
            | Self::CoinNotResolvable(_)
            | Self::InvalidCoinUpdate(_) => ErrorKind::Validation,
            Self::CoinNotEnabled(_) | Self::CoinNotFound(_) | Self::QuoteNotFound(_) => {
                ErrorKind::NotFound
            }
            Self::EmailAlreadyRegistered => ErrorKind::Conflict,
            Self::InvalidCredentials | Self::Unauthorized(_) => ErrorKind::Unauthorized,
            Self::CooldownActive { .. } => ErrorKind::RateLimited,
            _ => ErrorKind::Unavailable,
        }
    }

    /// Transient failure: the same request may succeed later
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Provider(_)
                | Self::Storage(_)
                | Self::DeadlineExceeded(_)
                | Self::ExternalService(_)
                | Self::CooldownActive { .. }
        )
    }

    /// Seconds the caller should wait before retrying, if known
    pub fn retry_after_seconds(&self) -> Option<u64> {
        match self {
            Self::CooldownActive { retry_after_seconds } => Some(*retry_after_seconds),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opaque_failures_share_internal_code() {
        assert_eq!(QuoteError::Storage("disk".into()).code(), "internal_error");
        assert_eq!(QuoteError::Provider("503".into()).code(), "internal_error");
        assert_eq!(QuoteError::Storage("disk".into()).kind(), ErrorKind::Unavailable);
    }

    #[test]
    fn test_cooldown_carries_retry_after() {
        let err = QuoteError::CooldownActive { retry_after_seconds: 42 };
        assert_eq!(err.code(), "cooldown_active");
        assert_eq!(err.kind(), ErrorKind::RateLimited);
        assert_eq!(err.retry_after_seconds(), Some(42));
        assert!(QuoteError::InvalidEmail.retry_after_seconds().is_none());
    }

    #[test]
    fn test_retryable_only_for_transient_failures() {
        assert!(QuoteError::Provider("timeout".into()).is_retryable());
        assert!(QuoteError::Storage("locked".into()).is_retryable());
        assert!(QuoteError::ExternalService("502".into()).is_retryable());
        assert!(!QuoteError::Config("JWT_SECRET".into()).is_retryable());
        assert!(!QuoteError::Security("bad hash".into()).is_retryable());
        assert!(!QuoteError::InvalidEmail.is_retryable());
    }

    #[test]
    fn test_credentials_errors_are_unauthorized() {
        assert_eq!(QuoteError::InvalidCredentials.kind(), ErrorKind::Unauthorized);
        assert_eq!(QuoteError::EmailAlreadyRegistered.kind(), ErrorKind::Conflict);
        assert_eq!(QuoteError::CoinNotEnabled("BTC".into()).kind(), ErrorKind::NotFound);
    }
}
