// ============================================================================
// Data Access Errors
// ============================================================================
//
// Every repository operation fails with exactly one of three classes:
// - NotFound:      a required lookup matched no row
// - InvalidState:  a business rule refused the write
// - Storage:       the store failed (connection, query, decode, sequence)
//
// Nothing here is retried. Errors surface to the caller as soon as they occur.
//
// ============================================================================

/// Coarse failure class, for callers that branch on what went wrong
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    InvalidState,
    Storage,
}

#[derive(Debug, thiserror::Error)]
pub enum DataError {
    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Cannot get next serial value for {table}.{column}")]
    SerialUnavailable { table: String, column: String },

    #[error("Cannot decode stored value: {0}")]
    Decode(String),
}

impl DataError {
    pub fn not_found(entity: &'static str, key: impl ToString) -> Self {
        DataError::NotFound {
            entity,
            key: key.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            DataError::NotFound { .. } => ErrorKind::NotFound,
            DataError::InvalidState(_) => ErrorKind::InvalidState,
            DataError::Storage(_) => ErrorKind::Storage,
        }
    }
}

impl From<sqlx::Error> for DataError {
    fn from(err: sqlx::Error) -> Self {
        DataError::Storage(StorageError::Database(err))
    }
}

pub type DataResult<T> = Result<T, DataError>;
