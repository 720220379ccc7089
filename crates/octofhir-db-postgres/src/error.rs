//! Error types for the PostgreSQL backend.

use octofhir_search::SearchError;
use octofhir_storage::StorageError;
use sqlx_core::error::Error as SqlxError;

/// PostgreSQL error code for unique violation (23505).
pub const PG_UNIQUE_VIOLATION: &str = "23505";

/// PostgreSQL error code for undefined table (42P01).
pub const PG_UNDEFINED_TABLE: &str = "42P01";

/// Checks if a sqlx error has a specific PostgreSQL error code.
pub fn has_pg_error_code(err: &SqlxError, code: &str) -> bool {
    if let SqlxError::Database(db_err) = err {
        db_err.code().as_deref() == Some(code)
    } else {
        false
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PostgresError {
    #[error("Database error: {0}")]
    Database(#[from] SqlxError),

    #[error("Migration error: {0}")]
    Migration(String),

    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl PostgresError {
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}

impl From<PostgresError> for StorageError {
    fn from(err: PostgresError) -> Self {
        match err {
            PostgresError::Database(e) => storage_error(e),
            PostgresError::Migration(e) => StorageError::internal(format!("Migration error: {e}")),
            PostgresError::Config { message } => {
                StorageError::internal(format!("Configuration error: {message}"))
            }
        }
    }
}

/// Maps a driver error onto the storage error taxonomy.
pub(crate) fn storage_error(err: SqlxError) -> StorageError {
    match &err {
        SqlxError::PoolTimedOut | SqlxError::PoolClosed | SqlxError::Io(_) | SqlxError::Tls(_) => {
            StorageError::connection_error(err.to_string())
        }
        _ if has_pg_error_code(&err, PG_UNDEFINED_TABLE) => StorageError::internal(format!(
            "Tables are missing, run migrations first: {err}"
        )),
        _ => StorageError::persistence(err.to_string()),
    }
}

pub(crate) fn search_error(err: SqlxError) -> SearchError {
    SearchError::Execution(err.to_string())
}

pub type Result<T> = std::result::Result<T, PostgresError>;
