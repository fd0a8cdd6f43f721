use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use secrecy::{ExposeSecret, Secret};

use crate::errors::AppError;

use super::models::{TokenClaims, User};

/// Access token lifetime
pub const ACCESS_TOKEN_EXPIRY_HOURS: i64 = 24;

/// Create a new JWT access token for a user
pub fn create_access_token(user: &User, jwt_secret: &Secret<String>) -> Result<String, AppError> {
    let now = Utc::now();
    let expires_at = now + Duration::hours(ACCESS_TOKEN_EXPIRY_HOURS);

    let claims = TokenClaims {
        sub: user.id,
        email: user.email.clone(),
        name: user.full_name.clone(),
        iat: now.timestamp() as usize,
        exp: expires_at.timestamp() as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(jwt_secret.expose_secret().as_bytes()),
    )
    .map_err(|e| AppError::InternalError(format!("Failed to create access token: {e}")))
}

/// Decode and validate a JWT access token
pub fn decode_token(token: &str, jwt_secret: &Secret<String>) -> Result<TokenClaims, AppError> {
    decode::<TokenClaims>(
        token,
        &DecodingKey::from_secret(jwt_secret.expose_secret().as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| AppError::Unauthorized(format!("Invalid token: {e}")))
}
