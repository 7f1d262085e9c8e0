//! JWT Token Service

use chrono::{DateTime, Utc};
use jsonwebtoken::errors::ErrorKind as JwtErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use quote_core::{AuthClaims, QuoteError, Result, TokenService};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Claims {
    sub: String,
    email: String,
    iss: String,
    iat: i64,
    exp: i64,
    jti: String,
}

/// HS256 signer/verifier bound to one secret and issuer
pub struct JwtTokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    issuer: String,
}

impl JwtTokenService {
    pub fn new(secret: &[u8], issuer: impl Into<String>) -> Result<Self> {
        if secret.is_empty() {
            return Err(QuoteError::Config("JWT secret must not be empty".into()));
        }
        let issuer = issuer.into();

        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 0;
        validation.set_issuer(&[issuer.as_str()]);
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
            issuer,
        })
    }
}

impl TokenService for JwtTokenService {
    fn generate(
        &self,
        user_id: i64,
        email: &str,
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<String> {
        let claims = Claims {
            sub: user_id.to_string(),
            email: email.to_string(),
            iss: self.issuer.clone(),
            iat: issued_at.timestamp(),
            exp: expires_at.timestamp(),
            jti: uuid::Uuid::new_v4().to_string(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| QuoteError::Security(format!("sign token: {e}")))
    }

    fn verify(&self, token: &str) -> Result<AuthClaims> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation).map_err(|err| {
            match err.kind() {
                JwtErrorKind::ExpiredSignature => tracing::debug!("Rejected expired token"),
                JwtErrorKind::InvalidIssuer => tracing::debug!("Rejected token from foreign issuer"),
                other => tracing::debug!(error = ?other, "Rejected token"),
            }
            QuoteError::Unauthorized("invalid_token".into())
        })?;

        let user_id = data
            .claims
            .sub
            .parse::<i64>()
            .map_err(|_| QuoteError::Unauthorized("invalid_token".into()))?;

        Ok(AuthClaims {
            user_id,
            email: data.claims.email,
        })
    }
}
