//! Authentication error types.

use chrono::{DateTime, Utc};
use thiserror::Error;
use vellum_core::error::{FieldError, VellumError};

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Account is locked")]
    AccountLocked { until: DateTime<Utc> },

    #[error("Account is deactivated")]
    AccountInactive,

    #[error("Organization is inactive")]
    TenantInactive,

    #[error("Invalid two-factor code")]
    InvalidTwoFactorCode,

    #[error("Two-factor authentication has not been set up")]
    TwoFactorNotSetUp,

    #[error("Two-factor authentication is already enabled")]
    TwoFactorAlreadyEnabled,

    #[error("Two-factor authentication is not enabled")]
    TwoFactorNotEnabled,

    #[error("Token has expired")]
    TokenExpired,

    #[error("Invalid token")]
    TokenInvalid(String),

    #[error("Password was changed; please log in again")]
    StaleToken,

    #[error("Invalid or expired token")]
    InvalidActionToken,

    #[error("{0}")]
    WeakPassword(String),

    #[error("cryptography error: {0}")]
    Crypto(String),
}

impl From<AuthError> for VellumError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::AccountLocked { until } => VellumError::AccountLocked { until },
            AuthError::WeakPassword(message) => VellumError::Validation {
                message: message.clone(),
                errors: vec![FieldError {
                    field: "password".into(),
                    message,
                }],
            },
            AuthError::TwoFactorNotSetUp
            | AuthError::TwoFactorAlreadyEnabled
            | AuthError::TwoFactorNotEnabled
            | AuthError::InvalidActionToken => VellumError::validation(err.to_string()),
            AuthError::Crypto(msg) => VellumError::Crypto(msg),
            other => VellumError::AuthenticationFailed {
                reason: other.to_string(),
            },
        }
    }
}
