use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::auth::models::{
    AuthTokenResponse, CreateUserDto, ForgotPasswordDto, LoginDto, MessageResponse,
    ResetPasswordDto, UserResponseDto,
};
use crate::budget::models::{BudgetDto, BudgetResponse, BudgetStatus};
use crate::category::models::{CategoryDto, CategoryResponse, CategoryType};
use crate::errors::ErrorResponse;
use crate::transaction::models::{
    PaginatedTransactionResponse, TransactionDto, TransactionResponse,
};
use crate::user::models::UpdateProfileDto;

/// Security scheme modifier for Bearer token authentication
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .description(Some("JWT access token"))
                        .build(),
                ),
            );
        }
    }
}

/// OpenAPI documentation configuration
#[derive(OpenApi)]
#[openapi(
    info(
        title = "FinTrack API",
        version = "1.0.0",
        description = "RESTful API for personal finance tracking: categories, budgets, and transactions with budget-utilization metrics",
        license(
            name = "MIT"
        )
    ),
    servers(
        (url = "http://localhost:8080", description = "Development server"),
    ),
    tags(
        (name = "Health", description = "Health check endpoints"),
        (name = "Auth", description = "Authentication, email verification, and password reset"),
        (name = "Users", description = "Profile management"),
        (name = "Categories", description = "Income/expense category management"),
        (name = "Budgets", description = "Budget management with derived utilization"),
        (name = "Transactions", description = "Transaction management with atomic budget reconciliation")
    ),
    paths(
        // Auth endpoints
        crate::auth::handlers::register,
        crate::auth::handlers::verify_email,
        crate::auth::handlers::login,
        crate::auth::handlers::forgot_password,
        crate::auth::handlers::reset_password,
        crate::auth::handlers::me,
        // User endpoints
        crate::user::handlers::update_me,
        // Category endpoints
        crate::category::handlers::list_categories,
        crate::category::handlers::get_category,
        crate::category::handlers::create_category,
        crate::category::handlers::update_category,
        crate::category::handlers::delete_category,
        // Budget endpoints
        crate::budget::handlers::list_budgets,
        crate::budget::handlers::get_budget,
        crate::budget::handlers::create_budget,
        crate::budget::handlers::update_budget,
        crate::budget::handlers::delete_budget,
        // Transaction endpoints
        crate::transaction::handlers::list_transactions,
        crate::transaction::handlers::get_transaction,
        crate::transaction::handlers::create_transaction,
        crate::transaction::handlers::update_transaction,
        crate::transaction::handlers::delete_transaction,
    ),
    components(
        schemas(
            // Error response
            ErrorResponse,
            // Auth schemas
            CreateUserDto,
            LoginDto,
            ForgotPasswordDto,
            ResetPasswordDto,
            UserResponseDto,
            AuthTokenResponse,
            MessageResponse,
            // User schemas
            UpdateProfileDto,
            // Category schemas
            CategoryType,
            CategoryDto,
            CategoryResponse,
            // Budget schemas
            BudgetStatus,
            BudgetDto,
            BudgetResponse,
            // Transaction schemas
            TransactionDto,
            TransactionResponse,
            PaginatedTransactionResponse,
        )
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;
