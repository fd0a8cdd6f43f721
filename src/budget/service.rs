use rust_decimal::Decimal;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use super::models::{Budget, BudgetDto, BudgetFilters};
use crate::category::models::CategoryType;
use crate::category::service::CategoryService;
use crate::errors::AppError;

/// Service layer for budget business logic. Spend mutation lives in the
/// ledger; this service only handles the budget records themselves.
pub struct BudgetService;

impl BudgetService {
    /// A budget may only track an EXPENSE category.
    async fn check_category_assignable(
        pool: &PgPool,
        category_id: Uuid,
    ) -> Result<(), AppError> {
        let category_type = CategoryService::classify(pool, category_id)
            .await
            .map_err(|e| match e {
                AppError::NotFound(_) => {
                    AppError::NotFound("Invalid category for budget".to_string())
                }
                other => other,
            })?;

        if category_type == CategoryType::Income {
            return Err(AppError::ValidationError(
                "Budgets can only be assigned to EXPENSE categories".to_string(),
            ));
        }

        Ok(())
    }

    /// Create a budget. Spend always starts at zero.
    pub async fn create(
        pool: &PgPool,
        user_id: Uuid,
        dto: &BudgetDto,
    ) -> Result<Budget, AppError> {
        if dto.end_date < dto.start_date {
            return Err(AppError::ValidationError(
                "End date cannot be before start date".to_string(),
            ));
        }

        if let Some(category_id) = dto.category_id {
            Self::check_category_assignable(pool, category_id).await?;
        }

        let budget = sqlx::query_as::<_, Budget>(
            r#"
            INSERT INTO budgets (owner_id, category_id, budget_amount, spend_amount, start_date, end_date, note)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, owner_id, category_id, budget_amount, spend_amount,
                      start_date, end_date, note, created_at, updated_at
            "#,
        )
        .bind(user_id)
        .bind(dto.category_id)
        .bind(dto.budget_amount)
        .bind(Decimal::ZERO)
        .bind(dto.start_date)
        .bind(dto.end_date)
        .bind(&dto.note)
        .fetch_one(pool)
        .await
        .map_err(|e| AppError::InternalError(e.to_string()))?;

        info!("Created budget {} for user {}", budget.id, user_id);
        Ok(budget)
    }

    /// Update a budget's own fields. The spend accumulator is deliberately
    /// untouched here.
    pub async fn update(
        pool: &PgPool,
        budget_id: Uuid,
        user_id: Uuid,
        dto: &BudgetDto,
    ) -> Result<Budget, AppError> {
        let existing = Self::load(pool, budget_id).await?;

        if existing.owner_id != user_id {
            return Err(AppError::Unauthorized(
                "You cannot update this budget".to_string(),
            ));
        }

        if dto.end_date < dto.start_date {
            return Err(AppError::ValidationError(
                "End date cannot be before start date".to_string(),
            ));
        }

        if let Some(category_id) = dto.category_id {
            Self::check_category_assignable(pool, category_id).await?;
        }

        let budget = sqlx::query_as::<_, Budget>(
            r#"
            UPDATE budgets
            SET category_id = $2, budget_amount = $3, start_date = $4, end_date = $5,
                note = $6, updated_at = NOW()
            WHERE id = $1
            RETURNING id, owner_id, category_id, budget_amount, spend_amount,
                      start_date, end_date, note, created_at, updated_at
            "#,
        )
        .bind(budget_id)
        .bind(dto.category_id)
        .bind(dto.budget_amount)
        .bind(dto.start_date)
        .bind(dto.end_date)
        .bind(&dto.note)
        .fetch_one(pool)
        .await
        .map_err(|e| AppError::InternalError(e.to_string()))?;

        info!("Updated budget {} for user {}", budget_id, user_id);
        Ok(budget)
    }

    /// Delete a budget owned by the user.
    pub async fn delete(pool: &PgPool, budget_id: Uuid, user_id: Uuid) -> Result<(), AppError> {
        let existing = Self::load(pool, budget_id).await?;

        if existing.owner_id != user_id {
            return Err(AppError::Unauthorized(
                "You cannot delete this budget".to_string(),
            ));
        }

        sqlx::query("DELETE FROM budgets WHERE id = $1")
            .bind(budget_id)
            .execute(pool)
            .await
            .map_err(|e| AppError::InternalError(e.to_string()))?;

        info!("Deleted budget {} for user {}", budget_id, user_id);
        Ok(())
    }

    /// Get a budget by ID, verifying ownership.
    pub async fn get_by_id(
        pool: &PgPool,
        budget_id: Uuid,
        user_id: Uuid,
    ) -> Result<Budget, AppError> {
        let budget = Self::load(pool, budget_id).await?;

        if budget.owner_id != user_id {
            return Err(AppError::Unauthorized(
                "You cannot view this budget".to_string(),
            ));
        }

        Ok(budget)
    }

    /// List the user's budgets with optional filters.
    pub async fn list(
        pool: &PgPool,
        user_id: Uuid,
        filters: &BudgetFilters,
    ) -> Result<Vec<Budget>, AppError> {
        let limit = filters.limit.min(100);
        let note_pattern = filters.note.as_ref().map(|n| format!("%{}%", n.trim()));

        sqlx::query_as::<_, Budget>(
            r#"
            SELECT id, owner_id, category_id, budget_amount, spend_amount,
                   start_date, end_date, note, created_at, updated_at
            FROM budgets
            WHERE owner_id = $1
              AND ($2::uuid IS NULL OR category_id = $2)
              AND ($3::numeric IS NULL OR budget_amount >= $3)
              AND ($4::numeric IS NULL OR budget_amount <= $4)
              AND ($5::date IS NULL OR start_date >= $5)
              AND ($6::date IS NULL OR end_date <= $6)
              AND ($7::text IS NULL OR note ILIKE $7)
            ORDER BY start_date DESC, created_at DESC
            LIMIT $8 OFFSET $9
            "#,
        )
        .bind(user_id)
        .bind(filters.category_id)
        .bind(filters.min_amount)
        .bind(filters.max_amount)
        .bind(filters.start_date)
        .bind(filters.end_date)
        .bind(note_pattern)
        .bind(limit)
        .bind(filters.offset)
        .fetch_all(pool)
        .await
        .map_err(|e| AppError::InternalError(e.to_string()))
    }

    async fn load(pool: &PgPool, budget_id: Uuid) -> Result<Budget, AppError> {
        sqlx::query_as::<_, Budget>(
            r#"
            SELECT id, owner_id, category_id, budget_amount, spend_amount,
                   start_date, end_date, note, created_at, updated_at
            FROM budgets
            WHERE id = $1
            "#,
        )
        .bind(budget_id)
        .fetch_optional(pool)
        .await
        .map_err(|e| AppError::InternalError(e.to_string()))?
        .ok_or_else(|| AppError::NotFound("Budget not found".to_string()))
    }
}
