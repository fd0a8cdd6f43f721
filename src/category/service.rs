use sqlx::{PgExecutor, PgPool};
use tracing::info;
use uuid::Uuid;

use super::models::{Category, CategoryDto, CategoryFilters, CategoryType};
use crate::errors::AppError;

/// System categories seeded at startup: (name, type).
const DEFAULT_CATEGORIES: &[(&str, CategoryType)] = &[
    ("Salary", CategoryType::Income),
    ("Travel", CategoryType::Expense),
    ("Food", CategoryType::Expense),
    ("Entertainment", CategoryType::Expense),
];

/// Service layer for category business logic.
pub struct CategoryService;

impl CategoryService {
    /// Resolve a category id to its type. Every transaction and budget
    /// decision branches on this classification.
    pub async fn classify<'e, E>(executor: E, category_id: Uuid) -> Result<CategoryType, AppError>
    where
        E: PgExecutor<'e>,
    {
        let type_str = sqlx::query_scalar::<_, String>(
            "SELECT category_type FROM categories WHERE id = $1",
        )
        .bind(category_id)
        .fetch_optional(executor)
        .await
        .map_err(|e| AppError::InternalError(e.to_string()))?
        .ok_or_else(|| AppError::NotFound("Category not found".to_string()))?;

        CategoryType::parse(&type_str).ok_or_else(|| {
            AppError::InternalError(format!("Unknown category type '{type_str}' in store"))
        })
    }

    /// Like `classify`, but tolerates a dangling reference (e.g. the category
    /// was deleted after the transaction was recorded).
    pub async fn classify_if_resolvable<'e, E>(
        executor: E,
        category_id: Uuid,
    ) -> Result<Option<CategoryType>, AppError>
    where
        E: PgExecutor<'e>,
    {
        let type_str = sqlx::query_scalar::<_, String>(
            "SELECT category_type FROM categories WHERE id = $1",
        )
        .bind(category_id)
        .fetch_optional(executor)
        .await
        .map_err(|e| AppError::InternalError(e.to_string()))?;

        Ok(type_str.as_deref().and_then(CategoryType::parse))
    }

    /// Get a category by ID. Default categories are visible to everyone,
    /// custom categories only to their owner.
    pub async fn get_by_id(
        pool: &PgPool,
        category_id: Uuid,
        user_id: Uuid,
    ) -> Result<Category, AppError> {
        let category = sqlx::query_as::<_, Category>(
            r#"
            SELECT id, owner_id, name, category_type, is_default, created_at, updated_at
            FROM categories
            WHERE id = $1
            "#,
        )
        .bind(category_id)
        .fetch_optional(pool)
        .await
        .map_err(|e| AppError::InternalError(e.to_string()))?
        .ok_or_else(|| AppError::NotFound("Category not found".to_string()))?;

        if !category.is_default && category.owner_id != Some(user_id) {
            return Err(AppError::Unauthorized(
                "You are not allowed to access this category".to_string(),
            ));
        }

        Ok(category)
    }

    /// List defaults plus the user's own categories, with optional filters.
    pub async fn list(
        pool: &PgPool,
        user_id: Uuid,
        filters: &CategoryFilters,
    ) -> Result<Vec<Category>, AppError> {
        let limit = filters.limit.min(100);
        let name_pattern = filters
            .name
            .as_ref()
            .map(|n| format!("%{}%", n.trim()));

        sqlx::query_as::<_, Category>(
            r#"
            SELECT id, owner_id, name, category_type, is_default, created_at, updated_at
            FROM categories
            WHERE (owner_id = $1 OR is_default = TRUE)
              AND ($2::text IS NULL OR name ILIKE $2)
              AND ($3::text IS NULL OR category_type = $3)
            ORDER BY is_default DESC, name ASC
            LIMIT $4 OFFSET $5
            "#,
        )
        .bind(user_id)
        .bind(name_pattern)
        .bind(filters.category_type.map(|t| t.as_str()))
        .bind(limit)
        .bind(filters.offset)
        .fetch_all(pool)
        .await
        .map_err(|e| AppError::InternalError(e.to_string()))
    }

    /// Create a custom category for the user. Names are unique per user,
    /// case-insensitively, within the user's own set.
    pub async fn create(
        pool: &PgPool,
        user_id: Uuid,
        dto: &CategoryDto,
    ) -> Result<Category, AppError> {
        let name = dto.name.trim().to_string();
        if name.is_empty() {
            return Err(AppError::ValidationError(
                "Name cannot be empty".to_string(),
            ));
        }

        let duplicate = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM categories WHERE owner_id = $1 AND LOWER(name) = LOWER($2)",
        )
        .bind(user_id)
        .bind(&name)
        .fetch_one(pool)
        .await
        .map_err(|e| AppError::InternalError(e.to_string()))?;

        if duplicate > 0 {
            return Err(AppError::Conflict(
                "Category with the same name already exists for this user".to_string(),
            ));
        }

        let category = sqlx::query_as::<_, Category>(
            r#"
            INSERT INTO categories (owner_id, name, category_type, is_default)
            VALUES ($1, $2, $3, FALSE)
            RETURNING id, owner_id, name, category_type, is_default, created_at, updated_at
            "#,
        )
        .bind(user_id)
        .bind(&name)
        .bind(dto.category_type.as_str())
        .fetch_one(pool)
        .await
        .map_err(|e| AppError::InternalError(e.to_string()))?;

        info!("Created category '{}' for user {}", category.name, user_id);
        Ok(category)
    }

    /// Update a custom category. Defaults are immutable.
    pub async fn update(
        pool: &PgPool,
        category_id: Uuid,
        user_id: Uuid,
        dto: &CategoryDto,
    ) -> Result<Category, AppError> {
        let existing = sqlx::query_as::<_, Category>(
            r#"
            SELECT id, owner_id, name, category_type, is_default, created_at, updated_at
            FROM categories
            WHERE id = $1
            "#,
        )
        .bind(category_id)
        .fetch_optional(pool)
        .await
        .map_err(|e| AppError::InternalError(e.to_string()))?
        .ok_or_else(|| AppError::NotFound("Category not found".to_string()))?;

        if existing.is_default {
            return Err(AppError::ValidationError(
                "Default categories cannot be updated".to_string(),
            ));
        }
        if existing.owner_id != Some(user_id) {
            return Err(AppError::Unauthorized(
                "You are not allowed to update this category".to_string(),
            ));
        }

        let name = dto.name.trim().to_string();
        let duplicate = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM categories
            WHERE owner_id = $1 AND LOWER(name) = LOWER($2) AND id <> $3
            "#,
        )
        .bind(user_id)
        .bind(&name)
        .bind(category_id)
        .fetch_one(pool)
        .await
        .map_err(|e| AppError::InternalError(e.to_string()))?;

        if duplicate > 0 {
            return Err(AppError::Conflict(
                "Category with the same name already exists for this user".to_string(),
            ));
        }

        let category = sqlx::query_as::<_, Category>(
            r#"
            UPDATE categories
            SET name = $2, category_type = $3, updated_at = NOW()
            WHERE id = $1
            RETURNING id, owner_id, name, category_type, is_default, created_at, updated_at
            "#,
        )
        .bind(category_id)
        .bind(&name)
        .bind(dto.category_type.as_str())
        .fetch_one(pool)
        .await
        .map_err(|e| AppError::InternalError(e.to_string()))?;

        info!("Updated category {} for user {}", category_id, user_id);
        Ok(category)
    }

    /// Delete a custom category. Defaults are undeletable.
    pub async fn delete(pool: &PgPool, category_id: Uuid, user_id: Uuid) -> Result<(), AppError> {
        let existing = sqlx::query_as::<_, Category>(
            r#"
            SELECT id, owner_id, name, category_type, is_default, created_at, updated_at
            FROM categories
            WHERE id = $1
            "#,
        )
        .bind(category_id)
        .fetch_optional(pool)
        .await
        .map_err(|e| AppError::InternalError(e.to_string()))?
        .ok_or_else(|| AppError::NotFound("Category not found".to_string()))?;

        if existing.is_default {
            return Err(AppError::ValidationError(
                "Default categories cannot be deleted".to_string(),
            ));
        }
        if existing.owner_id != Some(user_id) {
            return Err(AppError::Unauthorized(
                "You are not allowed to delete this category".to_string(),
            ));
        }

        sqlx::query("DELETE FROM categories WHERE id = $1")
            .bind(category_id)
            .execute(pool)
            .await
            .map_err(|e| AppError::InternalError(e.to_string()))?;

        info!("Deleted category {} for user {}", category_id, user_id);
        Ok(())
    }

    /// Seed system default categories, keyed by name + default flag so the
    /// seeder is idempotent across restarts.
    pub async fn seed_defaults(pool: &PgPool) -> Result<(), AppError> {
        for (name, category_type) in DEFAULT_CATEGORIES {
            let exists = sqlx::query_scalar::<_, i64>(
                "SELECT COUNT(*) FROM categories WHERE name = $1 AND is_default = TRUE",
            )
            .bind(name)
            .fetch_one(pool)
            .await
            .map_err(|e| AppError::InternalError(e.to_string()))?;

            if exists == 0 {
                sqlx::query(
                    r#"
                    INSERT INTO categories (owner_id, name, category_type, is_default)
                    VALUES (NULL, $1, $2, TRUE)
                    "#,
                )
                .bind(name)
                .bind(category_type.as_str())
                .execute(pool)
                .await
                .map_err(|e| AppError::InternalError(e.to_string()))?;

                info!("Seeded default category '{name}'");
            }
        }

        Ok(())
    }
}
