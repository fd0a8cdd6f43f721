use sqlx::{PgPool, Postgres, Transaction as PgTransaction};
use tracing::info;
use uuid::Uuid;

use super::models::{Transaction, TransactionDto, TransactionFilters};
use crate::budget::ledger::{BudgetLedger, SpendSide};
use crate::category::models::CategoryType;
use crate::category::service::CategoryService;
use crate::errors::AppError;

/// Service layer for the transaction lifecycle. Every write runs inside one
/// database transaction spanning the transaction row and the budget ledger,
/// so a ledger failure rolls the whole operation back.
pub struct TransactionService;

impl TransactionService {
    /// Create a transaction. INCOME transactions never reference a budget;
    /// EXPENSE transactions must reference an existing one.
    pub async fn create(
        pool: &PgPool,
        user_id: Uuid,
        dto: &TransactionDto,
    ) -> Result<Transaction, AppError> {
        let mut tx = pool
            .begin()
            .await
            .map_err(|e| AppError::InternalError(e.to_string()))?;

        let category_type = CategoryService::classify(&mut *tx, dto.category_id)
            .await
            .map_err(|e| match e {
                AppError::NotFound(_) => {
                    AppError::NotFound("Invalid category for transaction".to_string())
                }
                other => other,
            })?;

        // INCOME transaction: no budget, no ledger call
        if category_type == CategoryType::Income {
            let transaction = Self::insert(&mut tx, user_id, dto, None).await?;

            tx.commit()
                .await
                .map_err(|e| AppError::InternalError(e.to_string()))?;

            info!(
                "Created INCOME transaction {} for user {}",
                transaction.id, user_id
            );
            return Ok(transaction);
        }

        // EXPENSE transaction: budget required, checked before any persistence
        let budget_id = dto.budget_id.ok_or_else(|| {
            AppError::ValidationError(
                "Budget id is mandatory for EXPENSE transactions".to_string(),
            )
        })?;

        Self::check_budget_exists(&mut tx, budget_id).await?;

        let transaction = Self::insert(&mut tx, user_id, dto, Some(budget_id)).await?;

        BudgetLedger::reconcile(
            &mut tx,
            user_id,
            SpendSide::none(),
            SpendSide::new(
                Some(budget_id),
                transaction.amount,
                Some(CategoryType::Expense),
            ),
        )
        .await?;

        tx.commit()
            .await
            .map_err(|e| AppError::InternalError(e.to_string()))?;

        info!(
            "Created EXPENSE transaction {} for user {}",
            transaction.id, user_id
        );
        Ok(transaction)
    }

    /// Update a transaction. The category type set at creation is fixed: any
    /// INCOME<->EXPENSE flip is rejected before a single field is touched.
    pub async fn update(
        pool: &PgPool,
        transaction_id: Uuid,
        user_id: Uuid,
        dto: &TransactionDto,
    ) -> Result<Transaction, AppError> {
        let mut tx = pool
            .begin()
            .await
            .map_err(|e| AppError::InternalError(e.to_string()))?;

        let old = Self::load_locked(&mut tx, transaction_id).await?;

        if old.owner_id != user_id {
            return Err(AppError::Unauthorized(
                "You cannot update this transaction".to_string(),
            ));
        }

        let new_type = CategoryService::classify(&mut *tx, dto.category_id)
            .await
            .map_err(|e| match e {
                AppError::NotFound(_) => AppError::NotFound("Category not found".to_string()),
                other => other,
            })?;

        // Budgets only ever attach to EXPENSE transactions
        if new_type == CategoryType::Income && dto.budget_id.is_some() {
            return Err(AppError::ValidationError(
                "INCOME transactions cannot have a budget assigned".to_string(),
            ));
        }

        if new_type == CategoryType::Expense {
            if let Some(budget_id) = dto.budget_id {
                Self::check_budget_exists(&mut tx, budget_id).await?;
            }
        }

        // Classify the old category (if still resolvable) to detect type flips
        let old_type = CategoryService::classify_if_resolvable(&mut *tx, old.category_id).await?;

        if let Some(old_type) = old_type {
            if old_type != new_type {
                return Err(AppError::ValidationError(format!(
                    "Cannot change transaction type from {} to {}",
                    old_type.as_str(),
                    new_type.as_str()
                )));
            }
        }

        let new_budget_id = match new_type {
            CategoryType::Expense => dto.budget_id,
            CategoryType::Income => None,
        };

        let updated = sqlx::query_as::<_, Transaction>(
            r#"
            UPDATE transactions
            SET category_id = $2, budget_id = $3, description = $4, amount = $5,
                transaction_date = $6, updated_at = NOW()
            WHERE id = $1
            RETURNING id, owner_id, category_id, budget_id, description, amount,
                      transaction_date, created_at, updated_at
            "#,
        )
        .bind(transaction_id)
        .bind(dto.category_id)
        .bind(new_budget_id)
        .bind(&dto.description)
        .bind(dto.amount)
        .bind(dto.transaction_date)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::InternalError(e.to_string()))?;

        BudgetLedger::reconcile(
            &mut tx,
            user_id,
            SpendSide::new(old.budget_id, old.amount, old_type),
            SpendSide::new(new_budget_id, updated.amount, Some(new_type)),
        )
        .await?;

        tx.commit()
            .await
            .map_err(|e| AppError::InternalError(e.to_string()))?;

        info!("Updated transaction {} for user {}", transaction_id, user_id);
        Ok(updated)
    }

    /// Delete a transaction, reversing its budget contribution.
    pub async fn delete(
        pool: &PgPool,
        transaction_id: Uuid,
        user_id: Uuid,
    ) -> Result<(), AppError> {
        let mut tx = pool
            .begin()
            .await
            .map_err(|e| AppError::InternalError(e.to_string()))?;

        let old = Self::load_locked(&mut tx, transaction_id).await?;

        if old.owner_id != user_id {
            return Err(AppError::Unauthorized(
                "You are not allowed to delete this transaction".to_string(),
            ));
        }

        // Capture the old contribution before the row disappears
        let old_type = CategoryService::classify_if_resolvable(&mut *tx, old.category_id).await?;

        sqlx::query("DELETE FROM transactions WHERE id = $1")
            .bind(transaction_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::InternalError(e.to_string()))?;

        BudgetLedger::reconcile(
            &mut tx,
            user_id,
            SpendSide::new(old.budget_id, old.amount, old_type),
            SpendSide::none(),
        )
        .await?;

        tx.commit()
            .await
            .map_err(|e| AppError::InternalError(e.to_string()))?;

        info!("Deleted transaction {} for user {}", transaction_id, user_id);
        Ok(())
    }

    /// Get a single transaction by ID, verifying ownership.
    pub async fn get_by_id(
        pool: &PgPool,
        transaction_id: Uuid,
        user_id: Uuid,
    ) -> Result<Transaction, AppError> {
        let transaction = sqlx::query_as::<_, Transaction>(
            r#"
            SELECT id, owner_id, category_id, budget_id, description, amount,
                   transaction_date, created_at, updated_at
            FROM transactions
            WHERE id = $1
            "#,
        )
        .bind(transaction_id)
        .fetch_optional(pool)
        .await
        .map_err(|e| AppError::InternalError(e.to_string()))?
        .ok_or_else(|| AppError::NotFound("Transaction not found".to_string()))?;

        if transaction.owner_id != user_id {
            return Err(AppError::Unauthorized(
                "You are not allowed to view this transaction".to_string(),
            ));
        }

        Ok(transaction)
    }

    /// List transactions with filters and pagination.
    pub async fn list(
        pool: &PgPool,
        user_id: Uuid,
        filters: &TransactionFilters,
    ) -> Result<(Vec<Transaction>, i64), AppError> {
        let limit = filters.limit.min(100);
        let description_pattern = filters
            .description
            .as_ref()
            .map(|d| format!("%{}%", d.trim()));

        let transactions = sqlx::query_as::<_, Transaction>(
            r#"
            SELECT id, owner_id, category_id, budget_id, description, amount,
                   transaction_date, created_at, updated_at
            FROM transactions
            WHERE owner_id = $1
              AND ($2::uuid IS NULL OR category_id = $2)
              AND ($3::uuid IS NULL OR budget_id = $3)
              AND ($4::numeric IS NULL OR amount >= $4)
              AND ($5::numeric IS NULL OR amount <= $5)
              AND ($6::date IS NULL OR transaction_date >= $6)
              AND ($7::date IS NULL OR transaction_date <= $7)
              AND ($8::text IS NULL OR description ILIKE $8)
            ORDER BY transaction_date DESC, created_at DESC
            LIMIT $9 OFFSET $10
            "#,
        )
        .bind(user_id)
        .bind(filters.category_id)
        .bind(filters.budget_id)
        .bind(filters.min_amount)
        .bind(filters.max_amount)
        .bind(filters.start_date)
        .bind(filters.end_date)
        .bind(&description_pattern)
        .bind(limit)
        .bind(filters.offset)
        .fetch_all(pool)
        .await
        .map_err(|e| AppError::InternalError(e.to_string()))?;

        let total = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM transactions
            WHERE owner_id = $1
              AND ($2::uuid IS NULL OR category_id = $2)
              AND ($3::uuid IS NULL OR budget_id = $3)
              AND ($4::numeric IS NULL OR amount >= $4)
              AND ($5::numeric IS NULL OR amount <= $5)
              AND ($6::date IS NULL OR transaction_date >= $6)
              AND ($7::date IS NULL OR transaction_date <= $7)
              AND ($8::text IS NULL OR description ILIKE $8)
            "#,
        )
        .bind(user_id)
        .bind(filters.category_id)
        .bind(filters.budget_id)
        .bind(filters.min_amount)
        .bind(filters.max_amount)
        .bind(filters.start_date)
        .bind(filters.end_date)
        .bind(&description_pattern)
        .fetch_one(pool)
        .await
        .map_err(|e| AppError::InternalError(e.to_string()))?;

        Ok((transactions, total))
    }

    async fn insert(
        tx: &mut PgTransaction<'_, Postgres>,
        user_id: Uuid,
        dto: &TransactionDto,
        budget_id: Option<Uuid>,
    ) -> Result<Transaction, AppError> {
        sqlx::query_as::<_, Transaction>(
            r#"
            INSERT INTO transactions
                (owner_id, category_id, budget_id, description, amount, transaction_date)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, owner_id, category_id, budget_id, description, amount,
                      transaction_date, created_at, updated_at
            "#,
        )
        .bind(user_id)
        .bind(dto.category_id)
        .bind(budget_id)
        .bind(&dto.description)
        .bind(dto.amount)
        .bind(dto.transaction_date)
        .fetch_one(&mut **tx)
        .await
        .map_err(|e| AppError::InternalError(e.to_string()))
    }

    /// Fetch and lock a transaction row for update/delete.
    async fn load_locked(
        tx: &mut PgTransaction<'_, Postgres>,
        transaction_id: Uuid,
    ) -> Result<Transaction, AppError> {
        sqlx::query_as::<_, Transaction>(
            r#"
            SELECT id, owner_id, category_id, budget_id, description, amount,
                   transaction_date, created_at, updated_at
            FROM transactions
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(transaction_id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(|e| AppError::InternalError(e.to_string()))?
        .ok_or_else(|| AppError::NotFound("Transaction not found".to_string()))
    }

    async fn check_budget_exists(
        tx: &mut PgTransaction<'_, Postgres>,
        budget_id: Uuid,
    ) -> Result<(), AppError> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM budgets WHERE id = $1)",
        )
        .bind(budget_id)
        .fetch_one(&mut **tx)
        .await
        .map_err(|e| AppError::InternalError(e.to_string()))?;

        if !exists {
            return Err(AppError::NotFound(
                "Invalid budget for transaction".to_string(),
            ));
        }

        Ok(())
    }
}
