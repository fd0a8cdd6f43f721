pub mod handlers;
pub mod jwt;
pub mod models;
pub mod password;
pub mod service;
pub mod tokens;

// Re-export handlers for use in main.rs
pub use handlers::{forgot_password, login, me, register, reset_password, verify_email};

// Re-export for use in extractors
pub use jwt::decode_token;
