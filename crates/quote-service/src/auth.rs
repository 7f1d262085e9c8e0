//! Auth Use Cases
//!
//! Account registration and password login issuing bearer tokens.

use chrono::{DateTime, Duration as TimeDelta, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use quote_core::{Clock, NewUser, PasswordHasher, QuoteError, Result, TokenService, UserRepository};

/// Default access token lifetime
pub const DEFAULT_TOKEN_TTL_MINUTES: i64 = 60;

const MIN_EMAIL_LEN: usize = 5;
const MIN_PASSWORD_LEN: usize = 8;

fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

fn validate_email(email: &str) -> Result<()> {
    if email.len() < MIN_EMAIL_LEN || !email.contains('@') {
        return Err(QuoteError::InvalidEmail);
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(QuoteError::InvalidPassword);
    }
    Ok(())
}

#[derive(Clone, Deserialize)]
pub struct RegisterInput {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RegisteredUser {
    pub id: i64,
    pub email: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// Registration use case
pub struct Registration {
    users: Arc<dyn UserRepository>,
    hasher: Arc<dyn PasswordHasher>,
    clock: Arc<dyn Clock>,
}

impl Registration {
    pub fn new(users: Arc<dyn UserRepository>, hasher: Arc<dyn PasswordHasher>, clock: Arc<dyn Clock>) -> Self {
        Self { users, hasher, clock }
    }

    pub async fn execute(&self, input: RegisterInput) -> Result<RegisteredUser> {
        let email = normalize_email(&input.email);
        let name = input.name.trim().to_string();

        validate_email(&email)?;
        validate_password(&input.password)?;
        if name.is_empty() {
            return Err(QuoteError::InvalidName);
        }

        if self.users.exists_by_email(&email).await? {
            return Err(QuoteError::EmailAlreadyRegistered);
        }

        let password_hash = self.hasher.hash(&input.password)?;
        let now = self.clock.now();
        let created_at = now.with_nanosecond(0).unwrap_or(now);

        let user = self
            .users
            .create(&NewUser { email, name, password_hash, created_at })
            .await?;

        tracing::info!(user_id = user.id, email = %user.email, "User registered");
        Ok(RegisteredUser {
            id: user.id,
            email: user.email,
            name: user.name,
            created_at: user.created_at,
        })
    }
}

#[derive(Clone, Deserialize)]
pub struct LoginInput {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LoginOutput {
    pub access_token: String,
    pub token_type: String,
    pub expires_at: DateTime<Utc>,
}

/// Login use case
pub struct Login {
    users: Arc<dyn UserRepository>,
    hasher: Arc<dyn PasswordHasher>,
    tokens: Arc<dyn TokenService>,
    clock: Arc<dyn Clock>,
    ttl: TimeDelta,
}

impl Login {
    pub fn new(
        users: Arc<dyn UserRepository>,
        hasher: Arc<dyn PasswordHasher>,
        tokens: Arc<dyn TokenService>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            users,
            hasher,
            tokens,
            clock,
            ttl: TimeDelta::minutes(DEFAULT_TOKEN_TTL_MINUTES),
        }
    }

    /// Non-positive or unrepresentable values fall back to the default
    pub fn with_ttl_minutes(mut self, minutes: i64) -> Self {
        if let Some(ttl) = TimeDelta::try_minutes(minutes).filter(|ttl| *ttl > TimeDelta::zero()) {
            self.ttl = ttl;
        }
        self
    }

    pub async fn execute(&self, input: LoginInput) -> Result<LoginOutput> {
        let email = normalize_email(&input.email);
        if email.is_empty() || input.password.is_empty() {
            return Err(QuoteError::BadRequest("email and password are required".into()));
        }
        validate_email(&email)?;
        validate_password(&input.password)?;

        let user = self
            .users
            .find_by_email(&email)
            .await?
            .ok_or(QuoteError::InvalidCredentials)?;

        match self.hasher.verify(&input.password, &user.password_hash) {
            Ok(true) => {}
            Ok(false) => return Err(QuoteError::InvalidCredentials),
            Err(e) => {
                tracing::error!(user_id = user.id, error = %e, "Stored password hash unusable");
                return Err(e);
            }
        }

        let issued_at = self.clock.now();
        let expires_at = issued_at
            .checked_add_signed(self.ttl)
            .ok_or_else(|| QuoteError::Config("token expiry out of range".into()))?;
        let access_token = self.tokens.generate(user.id, &user.email, issued_at, expires_at)?;

        tracing::info!(user_id = user.id, "Login succeeded");
        Ok(LoginOutput {
            access_token,
            token_type: "Bearer".into(),
            expires_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use quote_core::memory::MemoryUserRepository;
    use quote_core::{AuthClaims, ManualClock};

    /// Reversible hasher for tests
    struct PlainHasher;

    impl PasswordHasher for PlainHasher {
        fn hash(&self, password: &str) -> Result<String> {
            Ok(format!("plain:{password}"))
        }

        fn verify(&self, password: &str, hash: &str) -> Result<bool> {
            hash.strip_prefix("plain:")
                .map(|stored| stored == password)
                .ok_or_else(|| QuoteError::Security("bad hash".into()))
        }
    }

    /// Token service that encodes claims in clear text
    struct PlainTokens;

    impl TokenService for PlainTokens {
        fn generate(&self, user_id: i64, email: &str, _: DateTime<Utc>, expires_at: DateTime<Utc>) -> Result<String> {
            Ok(format!("{user_id}|{email}|{}", expires_at.timestamp()))
        }

        fn verify(&self, token: &str) -> Result<AuthClaims> {
            let mut parts = token.split('|');
            let user_id = parts.next().and_then(|p| p.parse().ok());
            let email = parts.next();
            match (user_id, email) {
                (Some(user_id), Some(email)) => Ok(AuthClaims { user_id, email: email.into() }),
                _ => Err(QuoteError::Unauthorized("invalid_token".into())),
            }
        }
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap() + TimeDelta::milliseconds(750)
    }

    fn setup() -> (Registration, Login) {
        let users = Arc::new(MemoryUserRepository::new());
        let clock = Arc::new(ManualClock::new(t0()));
        let registration = Registration::new(users.clone(), Arc::new(PlainHasher), clock.clone());
        let login = Login::new(users, Arc::new(PlainHasher), Arc::new(PlainTokens), clock);
        (registration, login)
    }

    fn register_input(email: &str, password: &str, name: &str) -> RegisterInput {
        RegisterInput { email: email.into(), password: password.into(), name: name.into() }
    }

    #[tokio::test]
    async fn test_register_normalizes_and_truncates() {
        let (registration, _) = setup();
        let user = registration
            .execute(register_input("  Alice@Example.COM ", "password123", " Alice "))
            .await
            .unwrap();
        assert_eq!(user.email, "alice@example.com");
        assert_eq!(user.name, "Alice");
        assert_eq!(user.created_at, Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap());
    }

    #[tokio::test]
    async fn test_register_validation() {
        let (registration, _) = setup();
        let cases = [
            (register_input("a@b", "password123", "A"), "invalid_email"),
            (register_input("alice.example.com", "password123", "A"), "invalid_email"),
            (register_input("alice@example.com", "short", "A"), "invalid_password"),
            (register_input("alice@example.com", "password123", "   "), "invalid_name"),
        ];
        for (input, code) in cases {
            assert_eq!(registration.execute(input).await.unwrap_err().code(), code);
        }
    }

    #[tokio::test]
    async fn test_register_duplicate_email() {
        let (registration, _) = setup();
        registration.execute(register_input("bob@example.com", "password123", "Bob")).await.unwrap();
        let err = registration
            .execute(register_input("BOB@example.com", "password456", "Bob"))
            .await
            .unwrap_err();
        assert!(matches!(err, QuoteError::EmailAlreadyRegistered));
    }

    #[tokio::test]
    async fn test_login_issues_bearer_token() {
        let (registration, login) = setup();
        let user = registration.execute(register_input("carol@example.com", "password123", "Carol")).await.unwrap();

        let out = login
            .execute(LoginInput { email: "Carol@example.com".into(), password: "password123".into() })
            .await
            .unwrap();
        assert_eq!(out.token_type, "Bearer");
        assert_eq!(out.expires_at, t0() + TimeDelta::minutes(60));

        let claims = PlainTokens.verify(&out.access_token).unwrap();
        assert_eq!(claims, AuthClaims { user_id: user.id, email: "carol@example.com".into() });
    }

    #[tokio::test]
    async fn test_login_failures_are_indistinguishable() {
        let (registration, login) = setup();
        registration.execute(register_input("dave@example.com", "password123", "Dave")).await.unwrap();

        let wrong = login
            .execute(LoginInput { email: "dave@example.com".into(), password: "password999".into() })
            .await
            .unwrap_err();
        let unknown = login
            .execute(LoginInput { email: "nobody@example.com".into(), password: "password123".into() })
            .await
            .unwrap_err();
        assert_eq!(wrong.code(), "invalid_credentials");
        assert_eq!(unknown.code(), "invalid_credentials");
    }

    #[tokio::test]
    async fn test_login_requires_fields() {
        let (_, login) = setup();
        let err = login
            .execute(LoginInput { email: String::new(), password: "password123".into() })
            .await
            .unwrap_err();
        assert!(matches!(err, QuoteError::BadRequest(_)));
    }

    #[tokio::test]
    async fn test_custom_ttl() {
        let (registration, login) = setup();
        registration.execute(register_input("erin@example.com", "password123", "Erin")).await.unwrap();
        let login = login.with_ttl_minutes(5);
        let out = login
            .execute(LoginInput { email: "erin@example.com".into(), password: "password123".into() })
            .await
            .unwrap();
        assert_eq!(out.expires_at, t0() + TimeDelta::minutes(5));
    }

    #[tokio::test]
    async fn test_unreadable_stored_hash_is_internal() {
        let users = Arc::new(MemoryUserRepository::new());
        users
            .create(&NewUser {
                email: "frank@example.com".into(),
                name: "Frank".into(),
                password_hash: "$argon2id$garbage".into(),
                created_at: t0(),
            })
            .await
            .unwrap();
        let login = Login::new(users, Arc::new(PlainHasher), Arc::new(PlainTokens), Arc::new(ManualClock::new(t0())));

        let err = login
            .execute(LoginInput { email: "frank@example.com".into(), password: "password123".into() })
            .await
            .unwrap_err();
        assert!(matches!(err, QuoteError::Security(_)));
        assert_eq!(err.code(), "internal_error");
    }

    #[tokio::test]
    async fn test_unrepresentable_ttl_keeps_default() {
        let (registration, login) = setup();
        registration.execute(register_input("gina@example.com", "password123", "Gina")).await.unwrap();
        let login = login.with_ttl_minutes(i64::MAX);
        let out = login
            .execute(LoginInput { email: "gina@example.com".into(), password: "password123".into() })
            .await
            .unwrap();
        assert_eq!(out.expires_at, t0() + TimeDelta::minutes(DEFAULT_TOKEN_TTL_MINUTES));
    }
}
