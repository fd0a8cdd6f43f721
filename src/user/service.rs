use chrono::{Duration, Utc};
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::auth::models::User;
use crate::auth::password::hash_password;
use crate::auth::service::AuthService;
use crate::auth::tokens::{
    generate_one_time_token, hash_token, VERIFICATION_TOKEN_EXPIRY_HOURS,
};
use crate::errors::AppError;
use crate::notification::NotificationIntent;

use super::models::UpdateProfileDto;

/// Service layer for profile maintenance and account housekeeping.
pub struct UserService;

impl UserService {
    /// Update the authenticated user's profile. An email change re-enters
    /// the unverified state; the returned intent (if any) carries the new
    /// verification token for the new address.
    pub async fn update_profile(
        pool: &PgPool,
        user_id: Uuid,
        dto: &UpdateProfileDto,
    ) -> Result<(User, Option<NotificationIntent>), AppError> {
        let user = AuthService::get_user_by_id(pool, user_id).await?;

        let full_name = dto.full_name.clone().or(user.full_name.clone());
        let phone = dto.phone.clone().or(user.phone.clone());

        let password_hash = match dto.password.as_deref() {
            Some(p) if !p.is_empty() => hash_password(p)?,
            _ => user.password_hash.clone(),
        };

        // Email change: uniqueness check, back to unverified, fresh token
        let email_change = match dto.email.as_deref() {
            Some(new_email) if new_email != user.email => {
                let taken =
                    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users WHERE email = $1")
                        .bind(new_email)
                        .fetch_one(pool)
                        .await
                        .map_err(|e| AppError::InternalError(e.to_string()))?;

                if taken > 0 {
                    return Err(AppError::Conflict("Email already exists".to_string()));
                }

                Some(new_email.to_string())
            }
            _ => None,
        };

        let (updated, intent) = if let Some(new_email) = email_change {
            let raw_token = generate_one_time_token();
            let token_hash = hash_token(&raw_token);
            let expires_at = Utc::now() + Duration::hours(VERIFICATION_TOKEN_EXPIRY_HOURS);

            let updated = sqlx::query_as::<_, User>(
                r#"
                UPDATE users
                SET email = $2, full_name = $3, phone = $4, password_hash = $5,
                    is_verified = FALSE, verification_token_hash = $6,
                    verification_expires_at = $7, updated_at = NOW()
                WHERE id = $1
                RETURNING id, email, password_hash, full_name, phone, is_verified,
                          verification_token_hash, verification_expires_at,
                          reset_token_hash, reset_expires_at, created_at, updated_at
                "#,
            )
            .bind(user_id)
            .bind(&new_email)
            .bind(&full_name)
            .bind(&phone)
            .bind(&password_hash)
            .bind(&token_hash)
            .bind(expires_at)
            .fetch_one(pool)
            .await
            .map_err(|e| AppError::InternalError(e.to_string()))?;

            let intent = NotificationIntent::email_change_verify(
                &new_email,
                &user.email,
                full_name.as_deref(),
                &raw_token,
            );

            info!(
                "User {} changed email from {} to {}",
                user_id, user.email, new_email
            );
            (updated, Some(intent))
        } else {
            let updated = sqlx::query_as::<_, User>(
                r#"
                UPDATE users
                SET full_name = $2, phone = $3, password_hash = $4, updated_at = NOW()
                WHERE id = $1
                RETURNING id, email, password_hash, full_name, phone, is_verified,
                          verification_token_hash, verification_expires_at,
                          reset_token_hash, reset_expires_at, created_at, updated_at
                "#,
            )
            .bind(user_id)
            .bind(&full_name)
            .bind(&phone)
            .bind(&password_hash)
            .fetch_one(pool)
            .await
            .map_err(|e| AppError::InternalError(e.to_string()))?;

            info!("User {} updated profile", user_id);
            (updated, None)
        };

        Ok((updated, intent))
    }

    /// Remove accounts that never verified their email within the grace
    /// period. Cascades take their categories, budgets, and transactions.
    pub async fn purge_unverified(pool: &PgPool, grace_days: i64) -> Result<u64, AppError> {
        let cutoff = Utc::now() - Duration::days(grace_days);

        let result =
            sqlx::query("DELETE FROM users WHERE is_verified = FALSE AND created_at < $1")
                .bind(cutoff)
                .execute(pool)
                .await
                .map_err(|e| AppError::InternalError(e.to_string()))?;

        let removed = result.rows_affected();
        if removed > 0 {
            info!(
                "Cleanup removed {} unverified accounts older than {} days",
                removed, grace_days
            );
        }

        Ok(removed)
    }
}
