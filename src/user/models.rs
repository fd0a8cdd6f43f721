use serde::Deserialize;
use utoipa::ToSchema;
use validator::Validate;

/// Request body for updating the authenticated user's profile.
/// Changing the email drops the account back to unverified and triggers a
/// fresh verification mail; changing the password re-hashes it.
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileDto {
    /// New full name
    #[validate(length(max = 100, message = "Full name must be at most 100 characters"))]
    #[schema(example = "John Doe")]
    pub full_name: Option<String>,

    /// New phone number
    #[validate(length(max = 30, message = "Phone must be at most 30 characters"))]
    #[schema(example = "+1 555 0100")]
    pub phone: Option<String>,

    /// New email address (requires re-verification)
    #[validate(email)]
    #[schema(example = "new@example.com")]
    pub email: Option<String>,

    /// New password
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    #[schema(example = "NewPassword123")]
    pub password: Option<String>,
}
