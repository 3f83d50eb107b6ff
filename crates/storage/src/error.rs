use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// A (branch, revision) pair already exists. Raised by the losing side
    /// of a concurrent save; the caller may re-read the head and retry.
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),

    /// The combined head-update + archive-insert could not commit as one
    /// unit. Fatal to the save attempt; no partial state is left behind.
    #[error("transaction failure: {0}")]
    TransactionFailure(String),

    #[error("core error: {0}")]
    Core(#[from] coopdir_core::CoreError),
}
