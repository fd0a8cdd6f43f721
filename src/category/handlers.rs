use actix_web::{delete, get, post, put, web, HttpResponse};
use sqlx::PgPool;
use validator::Validate;

use crate::errors::{AppError, ErrorResponse};
use crate::extractors::AuthenticatedUser;

use super::models::{CategoryDto, CategoryFilters, CategoryIdPath, CategoryResponse};
use super::service::CategoryService;

/// GET /categories - List default + own categories with optional filters
#[utoipa::path(
    get,
    path = "/categories",
    tag = "Categories",
    params(CategoryFilters),
    responses(
        (status = 200, description = "List of categories", body = Vec<CategoryResponse>),
        (status = 401, description = "Unauthorized", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[get("/categories")]
pub async fn list_categories(
    pool: web::Data<PgPool>,
    auth: AuthenticatedUser,
    query: web::Query<CategoryFilters>,
) -> Result<HttpResponse, AppError> {
    query
        .validate()
        .map_err(|e| AppError::ValidationError(e.to_string()))?;

    let categories = CategoryService::list(pool.get_ref(), auth.user_id, &query).await?;

    let response: Vec<CategoryResponse> = categories.into_iter().map(Into::into).collect();

    Ok(HttpResponse::Ok().json(response))
}

/// GET /categories/{id} - Get a specific category
#[utoipa::path(
    get,
    path = "/categories/{id}",
    tag = "Categories",
    params(CategoryIdPath),
    responses(
        (status = 200, description = "Category details", body = CategoryResponse),
        (status = 404, description = "Category not found", body = ErrorResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[get("/categories/{id}")]
pub async fn get_category(
    pool: web::Data<PgPool>,
    auth: AuthenticatedUser,
    path: web::Path<CategoryIdPath>,
) -> Result<HttpResponse, AppError> {
    let category = CategoryService::get_by_id(pool.get_ref(), path.id, auth.user_id).await?;

    Ok(HttpResponse::Ok().json(CategoryResponse::from(category)))
}

/// POST /categories - Create a custom category
#[utoipa::path(
    post,
    path = "/categories",
    tag = "Categories",
    request_body = CategoryDto,
    responses(
        (status = 201, description = "Category created", body = CategoryResponse),
        (status = 400, description = "Validation error", body = ErrorResponse),
        (status = 409, description = "Duplicate name", body = ErrorResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[post("/categories")]
pub async fn create_category(
    pool: web::Data<PgPool>,
    auth: AuthenticatedUser,
    body: web::Json<CategoryDto>,
) -> Result<HttpResponse, AppError> {
    body.validate()
        .map_err(|e| AppError::ValidationError(e.to_string()))?;

    let category = CategoryService::create(pool.get_ref(), auth.user_id, &body).await?;

    Ok(HttpResponse::Created().json(CategoryResponse::from(category)))
}

/// PUT /categories/{id} - Update a custom category
#[utoipa::path(
    put,
    path = "/categories/{id}",
    tag = "Categories",
    params(CategoryIdPath),
    request_body = CategoryDto,
    responses(
        (status = 200, description = "Category updated", body = CategoryResponse),
        (status = 400, description = "Validation error or default category", body = ErrorResponse),
        (status = 404, description = "Category not found", body = ErrorResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[put("/categories/{id}")]
pub async fn update_category(
    pool: web::Data<PgPool>,
    auth: AuthenticatedUser,
    path: web::Path<CategoryIdPath>,
    body: web::Json<CategoryDto>,
) -> Result<HttpResponse, AppError> {
    body.validate()
        .map_err(|e| AppError::ValidationError(e.to_string()))?;

    let category =
        CategoryService::update(pool.get_ref(), path.id, auth.user_id, &body).await?;

    Ok(HttpResponse::Ok().json(CategoryResponse::from(category)))
}

/// DELETE /categories/{id} - Delete a custom category
#[utoipa::path(
    delete,
    path = "/categories/{id}",
    tag = "Categories",
    params(CategoryIdPath),
    responses(
        (status = 204, description = "Category deleted"),
        (status = 400, description = "Default category", body = ErrorResponse),
        (status = 404, description = "Category not found", body = ErrorResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[delete("/categories/{id}")]
pub async fn delete_category(
    pool: web::Data<PgPool>,
    auth: AuthenticatedUser,
    path: web::Path<CategoryIdPath>,
) -> Result<HttpResponse, AppError> {
    CategoryService::delete(pool.get_ref(), path.id, auth.user_id).await?;

    Ok(HttpResponse::NoContent().finish())
}
