//! # quote-security
//!
//! Implementations of the `quote_core` security contracts:
//!
//! - [`Argon2Hasher`] - salted Argon2id password hashes in PHC string format
//! - [`JwtTokenService`] - HS256 bearer tokens carrying `sub`, `email`,
//!   `iss`, `iat`, `exp` and a random `jti`

mod password;
mod token;

pub use password::Argon2Hasher;
pub use token::JwtTokenService;
