use coopdir_core::CoreError;
use coopdir_storage::StorageError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("core error: {0}")]
    Core(#[from] CoreError),

    /// The record carries an id but no branch. Only happens when a caller
    /// hand-assembles meta instead of loading the record from storage.
    #[error("record has an id but no branch: {0}")]
    MissingBranch(String),
}

impl EngineError {
    /// True for failures the caller may resolve by re-reading the head and
    /// reapplying its edits.
    pub fn is_retryable_conflict(&self) -> bool {
        matches!(self, Self::Storage(StorageError::ConstraintViolation(_)))
    }
}
