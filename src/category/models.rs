use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

/// Category type: every downstream budget decision branches on this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum CategoryType {
    /// Money coming in (e.g., Salary, Bonus)
    Income,
    /// Money going out (e.g., Food, Rent, Travel)
    Expense,
}

impl CategoryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CategoryType::Income => "income",
            CategoryType::Expense => "expense",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "income" => Some(CategoryType::Income),
            "expense" => Some(CategoryType::Expense),
            _ => None,
        }
    }
}

/// Database entity for categories. `owner_id` is NULL for system defaults.
#[derive(Debug, Clone, FromRow)]
pub struct Category {
    pub id: Uuid,
    pub owner_id: Option<Uuid>,
    pub name: String,
    pub category_type: String,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Category information returned in responses
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CategoryResponse {
    /// Unique category identifier
    pub id: Uuid,
    /// Owning user (null for system defaults)
    pub owner_id: Option<Uuid>,
    /// Category name
    #[schema(example = "Groceries")]
    pub name: String,
    /// Category type (income or expense)
    #[schema(example = "expense")]
    pub category_type: String,
    /// Whether this is a system-provided default
    pub is_default: bool,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl From<Category> for CategoryResponse {
    fn from(c: Category) -> Self {
        Self {
            id: c.id,
            owner_id: c.owner_id,
            name: c.name,
            category_type: c.category_type,
            is_default: c.is_default,
            created_at: c.created_at,
            updated_at: c.updated_at,
        }
    }
}

/// Request body for creating or updating a category
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CategoryDto {
    /// Category name (1-50 characters)
    #[validate(length(min = 1, max = 50, message = "Name must be 1-50 characters"))]
    #[schema(example = "Groceries")]
    pub name: String,

    /// Category type (income or expense)
    #[schema(example = "expense")]
    pub category_type: CategoryType,
}

/// Query parameters for listing categories
#[derive(Debug, Deserialize, Validate, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct CategoryFilters {
    /// Filter by name substring (case-insensitive)
    pub name: Option<String>,
    /// Filter by type (income or expense)
    #[param(example = "expense")]
    pub category_type: Option<CategoryType>,

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

/// Path parameters for category ID
#[derive(Debug, Deserialize, IntoParams)]
pub struct CategoryIdPath {
    /// Category UUID
    pub id: Uuid,
}
