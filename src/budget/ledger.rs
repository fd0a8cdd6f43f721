use rust_decimal::Decimal;
use sqlx::{Postgres, Transaction};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::category::models::CategoryType;
use crate::errors::AppError;

/// One side of a reconciliation: the budget contribution a transaction made
/// (old side) or will make (new side).
#[derive(Debug, Clone, Copy)]
pub struct SpendSide {
    pub budget_id: Option<Uuid>,
    pub amount: Decimal,
    pub category_type: Option<CategoryType>,
}

impl SpendSide {
    pub fn new(
        budget_id: Option<Uuid>,
        amount: Decimal,
        category_type: Option<CategoryType>,
    ) -> Self {
        Self {
            budget_id,
            amount,
            category_type,
        }
    }

    /// The empty side: used for creates (no old contribution) and deletes
    /// (no new contribution).
    pub fn none() -> Self {
        Self {
            budget_id: None,
            amount: Decimal::ZERO,
            category_type: None,
        }
    }

    fn is_expense(&self) -> bool {
        self.category_type == Some(CategoryType::Expense)
    }
}

/// A single adjustment to a budget's spend accumulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpendAdjustment {
    /// Subtract from spend, clamped at a floor of 0.
    Debit { budget_id: Uuid, amount: Decimal },
    /// Add to spend.
    Credit { budget_id: Uuid, amount: Decimal },
}

/// Compute the adjustments that keep budget spend totals consistent with a
/// transaction write. The net effect is always "remove old contribution, add
/// new contribution":
///
/// - INCOME on both sides → empty plan, budgets are never touched.
/// - Old side EXPENSE with a budget → debit that budget by the old amount.
/// - New side EXPENSE with a budget → credit that budget by the new amount.
///
/// Same-budget edits produce a literal debit-then-credit pair; both run
/// inside one database transaction, so the intermediate value is never
/// observable to other operations.
pub fn plan_adjustments(old: SpendSide, new: SpendSide) -> Vec<SpendAdjustment> {
    if !old.is_expense() && !new.is_expense() {
        return Vec::new();
    }

    let mut plan = Vec::with_capacity(2);

    if old.is_expense() {
        if let Some(budget_id) = old.budget_id {
            plan.push(SpendAdjustment::Debit {
                budget_id,
                amount: old.amount,
            });
        }
    }

    if new.is_expense() {
        if let Some(budget_id) = new.budget_id {
            plan.push(SpendAdjustment::Credit {
                budget_id,
                amount: new.amount,
            });
        }
    }

    plan
}

/// Clamp a debit at a floor of 0. Returns the new spend value and the excess
/// that had to be discarded to stay non-negative.
pub fn clamped_debit(spend: Decimal, amount: Decimal) -> (Decimal, Decimal) {
    let remaining = spend - amount;
    if remaining < Decimal::ZERO {
        (Decimal::ZERO, -remaining)
    } else {
        (remaining, Decimal::ZERO)
    }
}

/// The Budget Ledger: owns every mutation of `budgets.spend_amount`.
pub struct BudgetLedger;

impl BudgetLedger {
    /// Reconcile budget spend with a transaction write. Must run inside the
    /// same database transaction as the transaction-store write so a failure
    /// rolls back both.
    ///
    /// Debits lock the budget row and clamp at 0; the discarded excess is
    /// logged rather than silently dropped. Credits are expressed as atomic
    /// increments. A budget that no longer resolves is skipped with a
    /// warning, never an error.
    pub async fn reconcile(
        tx: &mut Transaction<'_, Postgres>,
        user_id: Uuid,
        old: SpendSide,
        new: SpendSide,
    ) -> Result<(), AppError> {
        let plan = plan_adjustments(old, new);
        if plan.is_empty() {
            debug!("No budget adjustment needed (not an EXPENSE transaction)");
            return Ok(());
        }

        for adjustment in plan {
            match adjustment {
                SpendAdjustment::Debit { budget_id, amount } => {
                    Self::debit(tx, user_id, budget_id, amount).await?;
                }
                SpendAdjustment::Credit { budget_id, amount } => {
                    Self::credit(tx, user_id, budget_id, amount).await?;
                }
            }
        }

        Ok(())
    }

    async fn debit(
        tx: &mut Transaction<'_, Postgres>,
        user_id: Uuid,
        budget_id: Uuid,
        amount: Decimal,
    ) -> Result<(), AppError> {
        // Lock the row so the read-modify-write cannot race a concurrent
        // reconciliation against the same budget.
        let spend = sqlx::query_scalar::<_, Decimal>(
            "SELECT spend_amount FROM budgets WHERE id = $1 FOR UPDATE",
        )
        .bind(budget_id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(|e| AppError::InternalError(e.to_string()))?;

        let Some(spend) = spend else {
            warn!(
                "Budget {} missing during spend debit for user {}; adjustment skipped",
                budget_id, user_id
            );
            return Ok(());
        };

        let (new_spend, lost) = clamped_debit(spend, amount);
        if lost > Decimal::ZERO {
            warn!(
                "Budget {} spend under-flow: debit {} exceeds recorded spend {}, discarding {}",
                budget_id, amount, spend, lost
            );
        }

        sqlx::query("UPDATE budgets SET spend_amount = $1, updated_at = NOW() WHERE id = $2")
            .bind(new_spend)
            .bind(budget_id)
            .execute(&mut **tx)
            .await
            .map_err(|e| AppError::InternalError(e.to_string()))?;

        debug!("Adjusted budget {} spend to {}", budget_id, new_spend);
        Ok(())
    }

    async fn credit(
        tx: &mut Transaction<'_, Postgres>,
        user_id: Uuid,
        budget_id: Uuid,
        amount: Decimal,
    ) -> Result<(), AppError> {
        // Increment-by-delta: the arithmetic happens in a single atomic
        // UPDATE, so concurrent credits cannot lose each other's writes.
        let result = sqlx::query(
            "UPDATE budgets SET spend_amount = spend_amount + $1, updated_at = NOW() WHERE id = $2",
        )
        .bind(amount)
        .bind(budget_id)
        .execute(&mut **tx)
        .await
        .map_err(|e| AppError::InternalError(e.to_string()))?;

        if result.rows_affected() == 0 {
            warn!(
                "Budget {} missing during spend credit for user {}; adjustment skipped",
                budget_id, user_id
            );
        } else {
            debug!("Credited budget {} spend by {}", budget_id, amount);
        }

        Ok(())
    }
}
