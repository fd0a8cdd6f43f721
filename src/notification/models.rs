use serde::Serialize;
use serde_json::{json, Value};

/// The kind of email a notification intent should render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationKind {
    VerifyEmail,
    EmailChangeVerify,
    PasswordReset,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::VerifyEmail => "VERIFY_EMAIL",
            NotificationKind::EmailChangeVerify => "EMAIL_CHANGE_VERIFY",
            NotificationKind::PasswordReset => "PASSWORD_RESET",
        }
    }
}

/// What the core wants sent, without knowing how to send it. Services return
/// intents; a dispatcher outside the core turns them into actual deliveries.
#[derive(Debug, Clone, Serialize)]
pub struct NotificationIntent {
    /// Email address the message goes to
    pub recipient: String,
    /// Template to render
    pub kind: NotificationKind,
    /// Template payload
    pub data: Value,
}

impl NotificationIntent {
    /// Verification mail for a freshly registered account.
    pub fn verify_email(recipient: &str, full_name: Option<&str>, token: &str) -> Self {
        Self {
            recipient: recipient.to_string(),
            kind: NotificationKind::VerifyEmail,
            data: json!({
                "name": full_name,
                "verificationToken": token,
                "expiresInHours": 24,
            }),
        }
    }

    /// Re-verification mail after the account email was changed.
    pub fn email_change_verify(
        new_email: &str,
        old_email: &str,
        full_name: Option<&str>,
        token: &str,
    ) -> Self {
        Self {
            recipient: new_email.to_string(),
            kind: NotificationKind::EmailChangeVerify,
            data: json!({
                "name": full_name,
                "oldEmail": old_email,
                "newEmail": new_email,
                "verificationToken": token,
                "expiresInHours": 24,
            }),
        }
    }

    /// Password-reset mail carrying the short-lived reset token.
    pub fn password_reset(recipient: &str, full_name: Option<&str>, token: &str) -> Self {
        Self {
            recipient: recipient.to_string(),
            kind: NotificationKind::PasswordReset,
            data: json!({
                "name": full_name,
                "resetToken": token,
                "expiresInMinutes": 15,
            }),
        }
    }
}
