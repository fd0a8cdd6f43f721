use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::{Validate, ValidationError};

/// Validate that amount is positive
fn validate_positive_amount(amount: &Decimal) -> Result<(), ValidationError> {
    if *amount <= Decimal::ZERO {
        return Err(ValidationError::new("amount_must_be_positive"));
    }
    Ok(())
}

/// Database model for transactions
#[derive(Debug, Clone, FromRow)]
pub struct Transaction {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub category_id: Uuid,
    pub budget_id: Option<Uuid>,
    pub description: Option<String>,
    pub amount: Decimal,
    pub transaction_date: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Transaction information returned in responses
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TransactionResponse {
    /// Unique transaction identifier
    pub id: Uuid,
    /// Category this transaction belongs to
    pub category_id: Uuid,
    /// Budget charged by this transaction (EXPENSE only)
    pub budget_id: Option<Uuid>,
    /// Optional description
    #[schema(example = "Weekly groceries")]
    pub description: Option<String>,
    /// Transaction amount (always positive)
    #[schema(example = 50.00)]
    pub amount: Decimal,
    /// Date of the transaction
    pub transaction_date: NaiveDate,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl From<Transaction> for TransactionResponse {
    fn from(t: Transaction) -> Self {
        Self {
            id: t.id,
            category_id: t.category_id,
            budget_id: t.budget_id,
            description: t.description,
            amount: t.amount,
            transaction_date: t.transaction_date,
            created_at: t.created_at,
            updated_at: t.updated_at,
        }
    }
}

/// Request body for creating or updating a transaction
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TransactionDto {
    /// Category this transaction belongs to
    pub category_id: Uuid,

    /// Budget to charge (mandatory for EXPENSE, forbidden for INCOME)
    pub budget_id: Option<Uuid>,

    /// Optional description (max 200 chars)
    #[validate(length(max = 200, message = "Description cannot exceed 200 characters"))]
    #[schema(example = "Weekly groceries")]
    pub description: Option<String>,

    /// Transaction amount (must be positive)
    #[validate(custom(
        function = "validate_positive_amount",
        message = "Amount must be positive"
    ))]
    #[schema(example = 50.00)]
    pub amount: Decimal,

    /// Date of the transaction
    pub transaction_date: NaiveDate,
}

/// Query parameters for listing transactions
#[derive(Debug, Deserialize, Validate, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct TransactionFilters {
    /// Filter by category
    pub category_id: Option<Uuid>,
    /// Filter by budget
    pub budget_id: Option<Uuid>,
    /// Minimum amount
    pub min_amount: Option<Decimal>,
    /// Maximum amount
    pub max_amount: Option<Decimal>,
    /// Filter by start date
    pub start_date: Option<NaiveDate>,
    /// Filter by end date
    pub end_date: Option<NaiveDate>,
    /// Filter by description substring (case-insensitive)
    pub description: Option<String>,

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

/// Paginated response wrapper
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PaginatedTransactionResponse {
    /// List of transactions
    pub data: Vec<TransactionResponse>,
    /// Total count matching filters
    #[schema(example = 100)]
    pub total: i64,
    /// Limit used
    #[schema(example = 50)]
    pub limit: i64,
    /// Offset used
    #[schema(example = 0)]
    pub offset: i64,
}

/// Path parameters for transaction ID
#[derive(Debug, Deserialize, IntoParams)]
pub struct TransactionIdPath {
    /// Transaction UUID
    pub id: Uuid,
}
