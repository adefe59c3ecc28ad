//! The three error kinds named in the error handling design: `ParseFailed`
//! and `Unsupported` surface from the analysis façade, `StorageFailed` from
//! the cache façade. There are no sentinel-value errors; a cache miss is a
//! regular `Option::None`, never an `Err`.

/// Errors surfaced from `analyze_select`/`analyze_write`.
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("failed to parse SQL: {0}")]
    ParseFailed(String),

    #[error("unsupported SQL construct: {0}")]
    Unsupported(String),
}

impl From<sqlparser::parser::ParserError> for AnalysisError {
    fn from(e: sqlparser::parser::ParserError) -> Self {
        AnalysisError::ParseFailed(e.to_string())
    }
}

/// Errors surfaced from the cache façade's storage operations. Rollback of
/// the underlying transaction is unconditional on any `StorageFailed` path.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage operation failed: {0}")]
    StorageFailed(String),
}

impl From<sled::Error> for StorageError {
    fn from(e: sled::Error) -> Self {
        StorageError::StorageFailed(e.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(e: serde_json::Error) -> Self {
        StorageError::StorageFailed(e.to_string())
    }
}

impl<E: std::fmt::Display> From<sled::transaction::TransactionError<E>> for StorageError {
    fn from(e: sled::transaction::TransactionError<E>) -> Self {
        StorageError::StorageFailed(e.to_string())
    }
}
