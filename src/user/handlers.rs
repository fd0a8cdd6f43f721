use std::sync::Arc;

use actix_web::{put, web, HttpResponse};
use sqlx::PgPool;
use validator::Validate;

use crate::auth::models::UserResponseDto;
use crate::errors::{AppError, ErrorResponse};
use crate::extractors::AuthenticatedUser;
use crate::notification::NotificationDispatcher;

use super::models::UpdateProfileDto;
use super::service::UserService;

/// PUT /users/me - Update the authenticated user's profile
#[utoipa::path(
    put,
    path = "/users/me",
    tag = "Users",
    request_body = UpdateProfileDto,
    responses(
        (status = 200, description = "Profile updated", body = UserResponseDto),
        (status = 400, description = "Validation error", body = ErrorResponse),
        (status = 409, description = "Email already exists", body = ErrorResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[put("/users/me")]
pub async fn update_me(
    pool: web::Data<PgPool>,
    auth: AuthenticatedUser,
    dispatcher: web::Data<Arc<dyn NotificationDispatcher>>,
    body: web::Json<UpdateProfileDto>,
) -> Result<HttpResponse, AppError> {
    body.validate()
        .map_err(|e| AppError::ValidationError(e.to_string()))?;

    let (user, intent) =
        UserService::update_profile(pool.get_ref(), auth.user_id, &body).await?;

    if let Some(intent) = intent {
        dispatcher.dispatch(intent);
    }

    Ok(HttpResponse::Ok().json(UserResponseDto::from_user(&user)))
}
