// JWT access token issuing and validation (HS256)

use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::app_config::config;
use crate::models::User;

#[derive(Error, Debug)]
pub enum JwtError {
    #[error("Token expired")]
    TokenExpired,

    #[error("Invalid token")]
    InvalidToken,

    #[error("JWT encoding error: {0}")]
    EncodingError(String),
}

impl From<jsonwebtoken::errors::Error> for JwtError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;
        match err.kind() {
            ErrorKind::ExpiredSignature => JwtError::TokenExpired,
            ErrorKind::InvalidToken | ErrorKind::InvalidSignature => JwtError::InvalidToken,
            _ => JwtError::EncodingError(err.to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessTokenClaims {
    pub sub: Uuid,
    pub email: String,
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
}

/// Issue an access token for a user
pub fn issue_token(user: &User) -> Result<String, JwtError> {
    let cfg = config();
    let now = Utc::now().timestamp();
    let claims = AccessTokenClaims {
        sub: user.id,
        email: user.email.clone(),
        iss: cfg.jwt_issuer.clone(),
        iat: now,
        exp: now + cfg.jwt_expiry_seconds as i64,
    };

    let token = encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(cfg.jwt_secret.as_bytes()),
    )?;
    Ok(token)
}

/// Validate a token and return its claims
pub fn verify_token(token: &str) -> Result<AccessTokenClaims, JwtError> {
    let cfg = config();
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[cfg.jwt_issuer.as_str()]);

    let data = decode::<AccessTokenClaims>(
        token,
        &DecodingKey::from_secret(cfg.jwt_secret.as_bytes()),
        &validation,
    )?;
    Ok(data.claims)
}
