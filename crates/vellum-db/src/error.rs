//! Database-specific error types and conversions.

use vellum_core::error::VellumError;

/// Database-layer error type.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("SurrealDB error: {0}")]
    Surreal(#[from] surrealdb::Error),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Unique constraint violated on {entity}")]
    Duplicate { entity: String },

    #[error("Corrupt row: {0}")]
    Decode(String),

    #[error("Password hashing failed: {0}")]
    Hash(String),

    #[error("Record not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },
}

impl DbError {
    pub(crate) fn not_found(entity: &str, id: impl ToString) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    /// Classify a failed statement. SurrealDB reports unique index
    /// violations as "Database index ... already contains ...".
    pub(crate) fn from_statement(entity: &str, err: surrealdb::Error) -> Self {
        let msg = err.to_string();
        if msg.contains("already contains") {
            Self::Duplicate {
                entity: entity.into(),
            }
        } else {
            Self::Query(msg)
        }
    }
}

impl From<DbError> for VellumError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => VellumError::NotFound { entity, id },
            DbError::Duplicate { entity } => VellumError::AlreadyExists { entity },
            DbError::Hash(msg) => VellumError::Crypto(msg),
            other => VellumError::Database(other.to_string()),
        }
    }
}
