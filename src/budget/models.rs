use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::{Validate, ValidationError};

/// Validate that an amount is strictly positive
fn validate_positive_amount(amount: &Decimal) -> Result<(), ValidationError> {
    if *amount <= Decimal::ZERO {
        return Err(ValidationError::new("amount_must_be_positive"));
    }
    Ok(())
}

/// Database entity for budgets
#[derive(Debug, Clone, FromRow)]
pub struct Budget {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub category_id: Option<Uuid>,
    pub budget_amount: Decimal,
    pub spend_amount: Decimal,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Derived utilization label, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BudgetStatus {
    Unknown,
    Exceeded,
    NearingLimit,
    OnTrack,
}

impl BudgetStatus {
    #[allow(dead_code)]
    pub fn as_str(&self) -> &'static str {
        match self {
            BudgetStatus::Unknown => "UNKNOWN",
            BudgetStatus::Exceeded => "EXCEEDED",
            BudgetStatus::NearingLimit => "NEARING_LIMIT",
            BudgetStatus::OnTrack => "ON_TRACK",
        }
    }
}

/// Percent of the allocation consumed, rounded half-up to two decimals.
/// Zero-amount budgets report 0 rather than dividing by zero.
pub fn percent_used(budget_amount: Decimal, spend_amount: Decimal) -> Decimal {
    if budget_amount <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    (spend_amount / budget_amount * Decimal::from(100))
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Status is a pure function of (amount, spend) and only those fields.
pub fn derive_status(budget_amount: Decimal, spend_amount: Decimal) -> BudgetStatus {
    if budget_amount == Decimal::ZERO {
        return BudgetStatus::Unknown;
    }
    if spend_amount > budget_amount {
        return BudgetStatus::Exceeded;
    }
    if percent_used(budget_amount, spend_amount) >= Decimal::from(80) {
        return BudgetStatus::NearingLimit;
    }
    BudgetStatus::OnTrack
}

/// Budget returned in responses, with utilization derived on every read.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BudgetResponse {
    /// Unique budget identifier
    pub id: Uuid,
    /// Category this budget tracks (optional)
    pub category_id: Option<Uuid>,
    /// Allocated amount
    #[schema(example = 500.00)]
    pub budget_amount: Decimal,
    /// Accumulated spend from EXPENSE transactions
    #[schema(example = 350.00)]
    pub spend_amount: Decimal,
    /// Computed: percent of allocation consumed (two decimals)
    #[schema(example = 70.00)]
    pub percent_used: Decimal,
    /// Computed: UNKNOWN, EXCEEDED, NEARING_LIMIT, or ON_TRACK
    #[schema(example = "ON_TRACK")]
    pub status: BudgetStatus,
    /// Budget period start
    pub start_date: NaiveDate,
    /// Budget period end
    pub end_date: NaiveDate,
    /// Free-text note
    #[schema(example = "Monthly grocery budget")]
    pub note: Option<String>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl From<Budget> for BudgetResponse {
    fn from(b: Budget) -> Self {
        let percent = percent_used(b.budget_amount, b.spend_amount);
        let status = derive_status(b.budget_amount, b.spend_amount);

        Self {
            id: b.id,
            category_id: b.category_id,
            budget_amount: b.budget_amount,
            spend_amount: b.spend_amount,
            percent_used: percent,
            status,
            start_date: b.start_date,
            end_date: b.end_date,
            note: b.note,
            created_at: b.created_at,
            updated_at: b.updated_at,
        }
    }
}

/// Request body for creating or updating a budget
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BudgetDto {
    /// EXPENSE category to track (optional)
    pub category_id: Option<Uuid>,

    /// Allocated amount (must be positive)
    #[validate(custom(
        function = "validate_positive_amount",
        message = "Budget amount must be positive"
    ))]
    #[schema(example = 500.00)]
    pub budget_amount: Decimal,

    /// Budget period start
    pub start_date: NaiveDate,

    /// Budget period end
    pub end_date: NaiveDate,

    /// Free-text note (max 200 chars)
    #[validate(length(max = 200, message = "Note cannot exceed 200 characters"))]
    #[schema(example = "Monthly grocery budget")]
    pub note: Option<String>,
}

/// Query parameters for listing budgets
#[derive(Debug, Deserialize, Validate, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct BudgetFilters {
    /// Filter by category
    pub category_id: Option<Uuid>,
    /// Minimum allocated amount
    pub min_amount: Option<Decimal>,
    /// Maximum allocated amount
    pub max_amount: Option<Decimal>,
    /// Period must start on or after this date
    pub start_date: Option<NaiveDate>,
    /// Period must end on or before this date
    pub end_date: Option<NaiveDate>,
    /// Filter by note substring (case-insensitive)
    pub note: Option<String>,

    /// Maximum results (1-100)
    #[validate(range(min = 1, max = 100))]
    #[serde(default = "default_limit")]
    #[param(example = 50)]
    pub limit: i64,

    /// Number of results to skip
    #[validate(range(min = 0))]
    #[serde(default)]
    #[param(example = 0)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    50
}

/// Path parameters for budget ID
#[derive(Debug, Deserialize, IntoParams)]
pub struct BudgetIdPath {
    /// Budget UUID
    pub id: Uuid,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_status_unknown_for_zero_amount() {
        assert_eq!(derive_status(dec("0"), dec("0")), BudgetStatus::Unknown);
        assert_eq!(percent_used(dec("0"), dec("0")), Decimal::ZERO);
    }

    #[test]
    fn test_status_exceeded() {
        assert_eq!(derive_status(dec("100"), dec("150")), BudgetStatus::Exceeded);
    }

    #[test]
    fn test_status_nearing_limit_at_80_percent() {
        assert_eq!(
            derive_status(dec("100"), dec("85")),
            BudgetStatus::NearingLimit
        );
        assert_eq!(percent_used(dec("100"), dec("85")), dec("85.00"));
        // Exactly at the boundary counts as nearing
        assert_eq!(
            derive_status(dec("100"), dec("80")),
            BudgetStatus::NearingLimit
        );
    }

    #[test]
    fn test_status_on_track() {
        assert_eq!(derive_status(dec("100"), dec("50")), BudgetStatus::OnTrack);
        assert_eq!(percent_used(dec("100"), dec("50")), dec("50.00"));
    }

    #[test]
    fn test_spend_equal_to_amount_is_nearing_not_exceeded() {
        assert_eq!(
            derive_status(dec("100"), dec("100")),
            BudgetStatus::NearingLimit
        );
    }

    #[test]
    fn test_percent_used_rounds_half_up() {
        // 1/3 → 33.333...% rounds to 33.33
        assert_eq!(percent_used(dec("3"), dec("1")), dec("33.33"));
        // 0.125 of 1 → 12.5% stays exact; 1/800 → 0.125% rounds up to 0.13
        assert_eq!(percent_used(dec("800"), dec("1")), dec("0.13"));
    }

    #[test]
    fn test_status_labels() {
        assert_eq!(BudgetStatus::Unknown.as_str(), "UNKNOWN");
        assert_eq!(BudgetStatus::Exceeded.as_str(), "EXCEEDED");
        assert_eq!(BudgetStatus::NearingLimit.as_str(), "NEARING_LIMIT");
        assert_eq!(BudgetStatus::OnTrack.as_str(), "ON_TRACK");
    }
}
