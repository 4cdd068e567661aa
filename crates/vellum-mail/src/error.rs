use thiserror::Error;
use vellum_core::error::VellumError;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("invalid address {address}: {reason}")]
    Address { address: String, reason: String },

    #[error("failed to build message: {0}")]
    Build(String),

    #[error("SMTP transport error: {0}")]
    Transport(String),
}

pub type MailResult<T> = Result<T, MailError>;

impl From<MailError> for VellumError {
    fn from(err: MailError) -> Self {
        VellumError::Mail(err.to_string())
    }
}
