use actix_web::{delete, get, post, put, web, HttpResponse};
use sqlx::PgPool;
use validator::Validate;

use crate::errors::{AppError, ErrorResponse};
use crate::extractors::AuthenticatedUser;

use super::models::{BudgetDto, BudgetFilters, BudgetIdPath, BudgetResponse};
use super::service::BudgetService;

/// GET /budgets - List budgets with optional filters
#[utoipa::path(
    get,
    path = "/budgets",
    tag = "Budgets",
    params(BudgetFilters),
    responses(
        (status = 200, description = "List of budgets with derived utilization", body = Vec<BudgetResponse>),
        (status = 401, description = "Unauthorized", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[get("/budgets")]
pub async fn list_budgets(
    pool: web::Data<PgPool>,
    auth: AuthenticatedUser,
    query: web::Query<BudgetFilters>,
) -> Result<HttpResponse, AppError> {
    query
        .validate()
        .map_err(|e| AppError::ValidationError(e.to_string()))?;

    let budgets = BudgetService::list(pool.get_ref(), auth.user_id, &query).await?;

    let response: Vec<BudgetResponse> = budgets.into_iter().map(Into::into).collect();

    Ok(HttpResponse::Ok().json(response))
}

/// GET /budgets/{id} - Get a budget with derived percent-used and status
#[utoipa::path(
    get,
    path = "/budgets/{id}",
    tag = "Budgets",
    params(BudgetIdPath),
    responses(
        (status = 200, description = "Budget details", body = BudgetResponse),
        (status = 404, description = "Budget not found", body = ErrorResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[get("/budgets/{id}")]
pub async fn get_budget(
    pool: web::Data<PgPool>,
    auth: AuthenticatedUser,
    path: web::Path<BudgetIdPath>,
) -> Result<HttpResponse, AppError> {
    let budget = BudgetService::get_by_id(pool.get_ref(), path.id, auth.user_id).await?;

    Ok(HttpResponse::Ok().json(BudgetResponse::from(budget)))
}

/// POST /budgets - Create a new budget
#[utoipa::path(
    post,
    path = "/budgets",
    tag = "Budgets",
    request_body = BudgetDto,
    responses(
        (status = 201, description = "Budget created", body = BudgetResponse),
        (status = 400, description = "Validation error or INCOME category", body = ErrorResponse),
        (status = 404, description = "Category not found", body = ErrorResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[post("/budgets")]
pub async fn create_budget(
    pool: web::Data<PgPool>,
    auth: AuthenticatedUser,
    body: web::Json<BudgetDto>,
) -> Result<HttpResponse, AppError> {
    body.validate()
        .map_err(|e| AppError::ValidationError(e.to_string()))?;

    let budget = BudgetService::create(pool.get_ref(), auth.user_id, &body).await?;

    Ok(HttpResponse::Created().json(BudgetResponse::from(budget)))
}

/// PUT /budgets/{id} - Update a budget (spend accumulator is never touched here)
#[utoipa::path(
    put,
    path = "/budgets/{id}",
    tag = "Budgets",
    params(BudgetIdPath),
    request_body = BudgetDto,
    responses(
        (status = 200, description = "Budget updated", body = BudgetResponse),
        (status = 400, description = "Validation error or INCOME category", body = ErrorResponse),
        (status = 404, description = "Budget not found", body = ErrorResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[put("/budgets/{id}")]
pub async fn update_budget(
    pool: web::Data<PgPool>,
    auth: AuthenticatedUser,
    path: web::Path<BudgetIdPath>,
    body: web::Json<BudgetDto>,
) -> Result<HttpResponse, AppError> {
    body.validate()
        .map_err(|e| AppError::ValidationError(e.to_string()))?;

    let budget = BudgetService::update(pool.get_ref(), path.id, auth.user_id, &body).await?;

    Ok(HttpResponse::Ok().json(BudgetResponse::from(budget)))
}

/// DELETE /budgets/{id} - Delete a budget
#[utoipa::path(
    delete,
    path = "/budgets/{id}",
    tag = "Budgets",
    params(BudgetIdPath),
    responses(
        (status = 204, description = "Budget deleted"),
        (status = 404, description = "Budget not found", body = ErrorResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[delete("/budgets/{id}")]
pub async fn delete_budget(
    pool: web::Data<PgPool>,
    auth: AuthenticatedUser,
    path: web::Path<BudgetIdPath>,
) -> Result<HttpResponse, AppError> {
    BudgetService::delete(pool.get_ref(), path.id, auth.user_id).await?;

    Ok(HttpResponse::NoContent().finish())
}
