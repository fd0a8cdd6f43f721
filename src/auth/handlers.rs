use std::sync::Arc;

use actix_web::{get, post, web, HttpResponse};
use secrecy::Secret;
use sqlx::PgPool;
use validator::Validate;

use crate::errors::{AppError, ErrorResponse};
use crate::extractors::AuthenticatedUser;
use crate::notification::NotificationDispatcher;

use super::models::{
    AuthTokenResponse, CreateUserDto, ForgotPasswordDto, LoginDto, MessageResponse,
    ResetPasswordDto, UserResponseDto, VerifyQuery,
};
use super::service::AuthService;

/// POST /auth/register - Register a new user and emit a verification intent
#[utoipa::path(
    post,
    path = "/auth/register",
    tag = "Auth",
    request_body = CreateUserDto,
    responses(
        (status = 201, description = "User registered, verification email queued", body = UserResponseDto),
        (status = 400, description = "Validation error", body = ErrorResponse),
        (status = 409, description = "Email already exists", body = ErrorResponse)
    )
)]
#[post("/auth/register")]
pub async fn register(
    pool: web::Data<PgPool>,
    dispatcher: web::Data<Arc<dyn NotificationDispatcher>>,
    body: web::Json<CreateUserDto>,
) -> Result<HttpResponse, AppError> {
    body.validate()
        .map_err(|e| AppError::ValidationError(e.to_string()))?;

    let (user, intent) = AuthService::register(pool.get_ref(), &body).await?;

    dispatcher.dispatch(intent);

    Ok(HttpResponse::Created().json(UserResponseDto::from_user(&user)))
}

/// GET /auth/verify - Verify an email address with a one-time token
#[utoipa::path(
    get,
    path = "/auth/verify",
    tag = "Auth",
    params(VerifyQuery),
    responses(
        (status = 200, description = "Email verified", body = MessageResponse),
        (status = 400, description = "Invalid or expired token", body = ErrorResponse)
    )
)]
#[get("/auth/verify")]
pub async fn verify_email(
    pool: web::Data<PgPool>,
    query: web::Query<VerifyQuery>,
) -> Result<HttpResponse, AppError> {
    AuthService::verify_email(pool.get_ref(), &query.token).await?;

    Ok(HttpResponse::Ok().json(MessageResponse {
        message: "Email verified successfully".to_string(),
    }))
}

/// POST /auth/login - Authenticate and get an access token
#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "Auth",
    request_body = LoginDto,
    responses(
        (status = 200, description = "Authenticated", body = AuthTokenResponse),
        (status = 401, description = "Bad credentials or unverified email", body = ErrorResponse)
    )
)]
#[post("/auth/login")]
pub async fn login(
    pool: web::Data<PgPool>,
    jwt_secret: web::Data<Secret<String>>,
    body: web::Json<LoginDto>,
) -> Result<HttpResponse, AppError> {
    let response = AuthService::login(
        pool.get_ref(),
        jwt_secret.get_ref(),
        &body.email,
        &body.password,
    )
    .await?;

    Ok(HttpResponse::Ok().json(response))
}

/// POST /auth/forgot-password - Request a password reset token
#[utoipa::path(
    post,
    path = "/auth/forgot-password",
    tag = "Auth",
    request_body = ForgotPasswordDto,
    responses(
        (status = 202, description = "Reset email queued", body = MessageResponse),
        (status = 404, description = "No account for that email", body = ErrorResponse)
    )
)]
#[post("/auth/forgot-password")]
pub async fn forgot_password(
    pool: web::Data<PgPool>,
    dispatcher: web::Data<Arc<dyn NotificationDispatcher>>,
    body: web::Json<ForgotPasswordDto>,
) -> Result<HttpResponse, AppError> {
    body.validate()
        .map_err(|e| AppError::ValidationError(e.to_string()))?;

    let intent = AuthService::forgot_password(pool.get_ref(), &body.email).await?;

    dispatcher.dispatch(intent);

    Ok(HttpResponse::Accepted().json(MessageResponse {
        message: "Password reset email queued".to_string(),
    }))
}

/// POST /auth/reset-password - Complete a password reset
#[utoipa::path(
    post,
    path = "/auth/reset-password",
    tag = "Auth",
    request_body = ResetPasswordDto,
    responses(
        (status = 200, description = "Password updated", body = MessageResponse),
        (status = 400, description = "Invalid or expired token", body = ErrorResponse)
    )
)]
#[post("/auth/reset-password")]
pub async fn reset_password(
    pool: web::Data<PgPool>,
    body: web::Json<ResetPasswordDto>,
) -> Result<HttpResponse, AppError> {
    body.validate()
        .map_err(|e| AppError::ValidationError(e.to_string()))?;

    AuthService::reset_password(pool.get_ref(), &body.token, &body.new_password).await?;

    Ok(HttpResponse::Ok().json(MessageResponse {
        message: "Password reset successfully".to_string(),
    }))
}

/// GET /auth/me - Current authenticated user
#[utoipa::path(
    get,
    path = "/auth/me",
    tag = "Auth",
    responses(
        (status = 200, description = "Current user", body = UserResponseDto),
        (status = 401, description = "Unauthorized", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[get("/auth/me")]
pub async fn me(
    pool: web::Data<PgPool>,
    auth: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    let user = AuthService::get_user_by_id(pool.get_ref(), auth.user_id).await?;

    Ok(HttpResponse::Ok().json(UserResponseDto::from_user(&user)))
}
