use thiserror::Error;
use vellum_core::error::VellumError;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("object not found: {key}")]
    NotFound { key: String },

    #[error("object store request failed: {0}")]
    Backend(String),

    #[error("object store misconfigured: {0}")]
    Config(String),
}

pub type StorageResult<T> = Result<T, StorageError>;

impl From<StorageError> for VellumError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound { key } => VellumError::not_found("object", key),
            other => VellumError::Storage(other.to_string()),
        }
    }
}
