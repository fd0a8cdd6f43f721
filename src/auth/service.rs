use chrono::{Duration, Utc};
use secrecy::Secret;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::notification::NotificationIntent;

use super::jwt::create_access_token;
use super::models::{AuthTokenResponse, CreateUserDto, User};
use super::password::{hash_password, verify_password};
use super::tokens::{
    generate_one_time_token, hash_token, RESET_TOKEN_EXPIRY_MINUTES,
    VERIFICATION_TOKEN_EXPIRY_HOURS,
};

/// Authentication service: registration, verification, login, password reset.
/// Side-effectful email delivery is expressed as returned notification
/// intents, never performed here.
pub struct AuthService;

impl AuthService {
    /// Register a new user. The account starts unverified; the returned
    /// intent carries the raw verification token for delivery.
    pub async fn register(
        pool: &PgPool,
        dto: &CreateUserDto,
    ) -> Result<(User, NotificationIntent), AppError> {
        let existing = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users WHERE email = $1")
            .bind(&dto.email)
            .fetch_one(pool)
            .await
            .map_err(|e| AppError::InternalError(e.to_string()))?;

        if existing > 0 {
            return Err(AppError::Conflict("Email already exists".to_string()));
        }

        let password_hash = hash_password(&dto.password)?;

        let raw_token = generate_one_time_token();
        let token_hash = hash_token(&raw_token);
        let expires_at = Utc::now() + Duration::hours(VERIFICATION_TOKEN_EXPIRY_HOURS);

        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (email, password_hash, full_name, phone,
                               verification_token_hash, verification_expires_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, email, password_hash, full_name, phone, is_verified,
                      verification_token_hash, verification_expires_at,
                      reset_token_hash, reset_expires_at, created_at, updated_at
            "#,
        )
        .bind(&dto.email)
        .bind(&password_hash)
        .bind(&dto.full_name)
        .bind(&dto.phone)
        .bind(&token_hash)
        .bind(expires_at)
        .fetch_one(pool)
        .await
        .map_err(|e| AppError::InternalError(e.to_string()))?;

        info!("Registered user {} ({})", user.id, user.email);

        let intent =
            NotificationIntent::verify_email(&user.email, user.full_name.as_deref(), &raw_token);

        Ok((user, intent))
    }

    /// Consume an email-verification token.
    pub async fn verify_email(pool: &PgPool, raw_token: &str) -> Result<(), AppError> {
        let token_hash = hash_token(raw_token);

        let result = sqlx::query(
            r#"
            UPDATE users
            SET is_verified = TRUE, verification_token_hash = NULL,
                verification_expires_at = NULL, updated_at = NOW()
            WHERE verification_token_hash = $1
              AND verification_expires_at > NOW()
            "#,
        )
        .bind(&token_hash)
        .execute(pool)
        .await
        .map_err(|e| AppError::InternalError(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(AppError::ValidationError(
                "The provided token is invalid or expired".to_string(),
            ));
        }

        info!("Email verified via token");
        Ok(())
    }

    /// Authenticate by email and password. Unverified accounts cannot log in.
    pub async fn login(
        pool: &PgPool,
        jwt_secret: &Secret<String>,
        email: &str,
        password: &str,
    ) -> Result<AuthTokenResponse, AppError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, password_hash, full_name, phone, is_verified,
                   verification_token_hash, verification_expires_at,
                   reset_token_hash, reset_expires_at, created_at, updated_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(pool)
        .await
        .map_err(|e| AppError::InternalError(e.to_string()))?
        .ok_or_else(|| AppError::Unauthorized("Invalid email or password".to_string()))?;

        if !user.is_verified {
            return Err(AppError::Unauthorized(
                "Email is not verified. Please check your inbox.".to_string(),
            ));
        }

        let is_valid = verify_password(password, &user.password_hash)?;
        if !is_valid {
            return Err(AppError::Unauthorized(
                "Invalid email or password".to_string(),
            ));
        }

        let token = create_access_token(&user, jwt_secret)?;

        info!("User {} logged in", user.id);
        Ok(AuthTokenResponse::new(token, &user))
    }

    /// Start a password reset: store a short-lived token hash and return the
    /// intent carrying the raw token.
    pub async fn forgot_password(
        pool: &PgPool,
        email: &str,
    ) -> Result<NotificationIntent, AppError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, password_hash, full_name, phone, is_verified,
                   verification_token_hash, verification_expires_at,
                   reset_token_hash, reset_expires_at, created_at, updated_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(pool)
        .await
        .map_err(|e| AppError::InternalError(e.to_string()))?
        .ok_or_else(|| AppError::NotFound(format!("User not found with email: {email}")))?;

        let raw_token = generate_one_time_token();
        let token_hash = hash_token(&raw_token);
        let expires_at = Utc::now() + Duration::minutes(RESET_TOKEN_EXPIRY_MINUTES);

        sqlx::query(
            r#"
            UPDATE users
            SET reset_token_hash = $1, reset_expires_at = $2, updated_at = NOW()
            WHERE id = $3
            "#,
        )
        .bind(&token_hash)
        .bind(expires_at)
        .bind(user.id)
        .execute(pool)
        .await
        .map_err(|e| AppError::InternalError(e.to_string()))?;

        info!("Password reset requested for user {}", user.id);

        Ok(NotificationIntent::password_reset(
            &user.email,
            user.full_name.as_deref(),
            &raw_token,
        ))
    }

    /// Complete a password reset with a live token.
    pub async fn reset_password(
        pool: &PgPool,
        raw_token: &str,
        new_password: &str,
    ) -> Result<(), AppError> {
        let token_hash = hash_token(raw_token);
        let password_hash = hash_password(new_password)?;

        let result = sqlx::query(
            r#"
            UPDATE users
            SET password_hash = $1, reset_token_hash = NULL, reset_expires_at = NULL,
                updated_at = NOW()
            WHERE reset_token_hash = $2
              AND reset_expires_at > NOW()
            "#,
        )
        .bind(&password_hash)
        .bind(&token_hash)
        .execute(pool)
        .await
        .map_err(|e| AppError::InternalError(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(AppError::ValidationError(
                "The provided token is invalid or expired".to_string(),
            ));
        }

        info!("Password reset completed");
        Ok(())
    }

    /// Get user by ID
    pub async fn get_user_by_id(pool: &PgPool, user_id: Uuid) -> Result<User, AppError> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, password_hash, full_name, phone, is_verified,
                   verification_token_hash, verification_expires_at,
                   reset_token_hash, reset_expires_at, created_at, updated_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(pool)
        .await
        .map_err(|e| AppError::InternalError(e.to_string()))?
        .ok_or_else(|| AppError::Unauthorized("User not found".to_string()))
    }
}
