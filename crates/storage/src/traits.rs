use coopdir_core::{ids::RecordId, Versioned};

use crate::error::StorageError;

/// Row-level access to one versioned table.
///
/// Implementations enforce UNIQUE (branch, revision); `insert` surfaces a
/// collision as `StorageError::ConstraintViolation`. The save protocol in
/// the engine composes these primitives inside one transaction; none of
/// them opens a transaction of its own.
pub trait RevisionStore<R: Versioned> {
    /// Assign a fresh id, write the row, and record the id back into the
    /// row's meta.
    fn insert(&mut self, row: &mut R) -> Result<RecordId, StorageError>;

    /// Rewrite an existing row's content in place, preserving its id.
    fn update(&mut self, id: RecordId, row: &R) -> Result<(), StorageError>;

    fn get(&self, id: RecordId) -> Result<R, StorageError>;

    /// All revisions of a branch, ascending by revision number. Includes
    /// the head and every archived row.
    fn find_by_branch(&self, branch: RecordId) -> Result<Vec<R>, StorageError>;
}
