use serde::{Deserialize, Serialize};

use crate::ids::{RecordId, UserId};
use crate::time::Timestamp;
use crate::CoreError;

/// Shared bookkeeping for a versioned row.
///
/// Every save appends one revision to the row's branch. The branch is the
/// id of the head row, which always carries the latest content; earlier
/// content lives in archived rows with their own ids. A record that has
/// never been persisted has neither an id nor a branch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevisionMeta {
    pub id: Option<RecordId>,
    pub branch: Option<RecordId>,
    pub revision: u32,
    pub created_by: UserId,
    pub created_at: Timestamp,
}

impl RevisionMeta {
    pub fn new(created_by: UserId) -> Result<Self, CoreError> {
        Ok(Self {
            id: None,
            branch: None,
            revision: 0,
            created_by,
            created_at: Timestamp::now()?,
        })
    }

    /// True once persisted and pointing at itself, i.e. this instance was
    /// loaded from (or just became) the head row of its branch.
    pub fn is_head(&self) -> bool {
        self.id.is_some() && self.id == self.branch
    }
}

/// Implemented by record types that keep a revision history.
pub trait Versioned {
    fn meta(&self) -> &RevisionMeta;
    fn meta_mut(&mut self) -> &mut RevisionMeta;
}
