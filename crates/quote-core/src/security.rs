//! Security Contracts
//!
//! Password hashing and bearer token primitives consumed by the auth use
//! cases. Implementations live in `quote-security`.

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::model::AuthClaims;

pub trait PasswordHasher: Send + Sync {
    /// Hash a plaintext password into a self-describing string
    fn hash(&self, password: &str) -> Result<String>;

    /// `Ok(false)` on mismatch; `Err` only when the stored hash is unusable
    fn verify(&self, password: &str, hash: &str) -> Result<bool>;
}

pub trait TokenService: Send + Sync {
    /// Sign a token for the user valid until `expires_at`
    fn generate(
        &self,
        user_id: i64,
        email: &str,
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<String>;

    /// Validate signature, issuer and expiry
    fn verify(&self, token: &str) -> Result<AuthClaims>;
}
