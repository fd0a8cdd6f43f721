use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::{Validate, ValidationError};

// ============================================================================
// User Models
// ============================================================================

#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub is_verified: bool,
    pub verification_token_hash: Option<String>,
    pub verification_expires_at: Option<DateTime<Utc>>,
    pub reset_token_hash: Option<String>,
    pub reset_expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Validate password complexity: at least one uppercase, one lowercase, and one digit
fn validate_password_complexity(password: &str) -> Result<(), ValidationError> {
    let has_lowercase = password.chars().any(|c| c.is_ascii_lowercase());
    let has_uppercase = password.chars().any(|c| c.is_ascii_uppercase());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());

    if has_lowercase && has_uppercase && has_digit {
        Ok(())
    } else {
        Err(ValidationError::new("password_complexity"))
    }
}

/// Request body for user registration
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserDto {
    /// User's email address
    #[validate(email)]
    #[schema(example = "user@example.com")]
    pub email: String,
    /// Password (min 8 chars, must include uppercase, lowercase, and digit)
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    #[validate(custom(
        function = "validate_password_complexity",
        message = "Password must contain at least one uppercase letter, one lowercase letter, and one number"
    ))]
    #[schema(example = "Password123")]
    pub password: String,
    /// Optional full name
    #[validate(length(max = 100, message = "Full name must be at most 100 characters"))]
    #[schema(example = "John Doe")]
    pub full_name: Option<String>,
    /// Optional phone number
    #[validate(length(max = 30, message = "Phone must be at most 30 characters"))]
    #[schema(example = "+1 555 0100")]
    pub phone: Option<String>,
}

/// User information returned in responses
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserResponseDto {
    /// Unique user identifier
    pub id: Uuid,
    /// User's email address
    #[schema(example = "user@example.com")]
    pub email: String,
    /// User's full name
    #[schema(example = "John Doe")]
    pub full_name: Option<String>,
    /// User's phone number
    pub phone: Option<String>,
    /// Whether the email address has been verified
    pub is_verified: bool,
    /// Account creation timestamp
    pub created_at: DateTime<Utc>,
}

impl UserResponseDto {
    pub fn from_user(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            full_name: user.full_name.clone(),
            phone: user.phone.clone(),
            is_verified: user.is_verified,
            created_at: user.created_at,
        }
    }
}

/// Request body for user login
#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginDto {
    /// User's email address
    #[schema(example = "user@example.com")]
    pub email: String,
    /// User's password
    #[schema(example = "Password123")]
    pub password: String,
}

/// Query parameters for email verification
#[derive(Debug, Deserialize, IntoParams)]
pub struct VerifyQuery {
    /// Raw verification token from the email link
    pub token: String,
}

/// Request body to start a password reset
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ForgotPasswordDto {
    /// Email of the account to reset
    #[validate(email)]
    #[schema(example = "user@example.com")]
    pub email: String,
}

/// Request body to complete a password reset
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordDto {
    /// Raw reset token from the email link
    pub token: String,
    /// New password (same complexity rules as registration)
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    #[validate(custom(
        function = "validate_password_complexity",
        message = "Password must contain at least one uppercase letter, one lowercase letter, and one number"
    ))]
    #[schema(example = "NewPassword123")]
    pub new_password: String,
}

// ============================================================================
// Token Models
// ============================================================================

/// JWT access token claims
#[derive(Debug, Serialize, Deserialize)]
pub struct TokenClaims {
    pub sub: Uuid,            // User ID
    pub email: String,        // User email
    pub name: Option<String>, // User display name
    pub iat: usize,           // Issued at
    pub exp: usize,           // Expiration
}

/// Response containing the access token and user profile
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuthTokenResponse {
    /// JWT access token
    #[schema(example = "eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9...")]
    pub token: String,
    /// Token type (always "Bearer")
    #[schema(example = "Bearer")]
    pub token_type: &'static str,
    /// Access token expiry time in seconds
    #[schema(example = 86400)]
    pub expires_in: u64,
    /// User information
    pub user: UserResponseDto,
}

impl AuthTokenResponse {
    pub fn new(token: String, user: &User) -> Self {
        Self {
            token,
            token_type: "Bearer",
            expires_in: 24 * 60 * 60,
            user: UserResponseDto::from_user(user),
        }
    }
}

/// Simple acknowledgement payload for token-flow endpoints
#[derive(Debug, Serialize, ToSchema)]
pub struct MessageResponse {
    /// Human-readable outcome
    #[schema(example = "Email verified successfully")]
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_complexity_accepts_mixed() {
        assert!(validate_password_complexity("Password123").is_ok());
    }

    #[test]
    fn test_password_complexity_rejects_missing_classes() {
        assert!(validate_password_complexity("alllowercase1").is_err());
        assert!(validate_password_complexity("ALLUPPERCASE1").is_err());
        assert!(validate_password_complexity("NoDigitsHere").is_err());
    }
}
