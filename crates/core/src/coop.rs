use serde::{Deserialize, Serialize};

use crate::ids::*;
use crate::record::{RevisionMeta, Versioned};
use crate::CoreError;

/// A housing cooperative. Required fields are hard columns; everything
/// optional about a coop lives in its answered questions.
///
/// Coops are versioned: every save rewrites the head row and archives the
/// previous content under a fresh id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoopRecord {
    pub meta: RevisionMeta,
    pub name: String,
    pub picture: Option<PictureId>,
    pub contactable: Option<ContactId>,
}

impl CoopRecord {
    pub fn new(name: &str, created_by: UserId) -> Result<Self, CoreError> {
        Ok(Self {
            meta: RevisionMeta::new(created_by)?,
            name: name.to_string(),
            picture: None,
            contactable: None,
        })
    }
}

impl Versioned for CoopRecord {
    fn meta(&self) -> &RevisionMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut RevisionMeta {
        &mut self.meta
    }
}

/// A directory account. Wraps whatever external identity the web layer
/// authenticates; this core only needs a stable id to stamp revisions with.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryUser {
    pub id: UserId,
    pub display_name: String,
    pub contactable: Option<ContactId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Picture {
    pub id: PictureId,
    pub stock: bool,
    pub path: String,
}

/// An organizing tag for coops, e.g. "student housing".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoopCategory {
    pub id: CoopCategoryId,
    pub category: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationshipType {
    pub id: RelationshipTypeId,
    pub name: String,
}

/// A directed link between two coops, keyed by their branch ids so the
/// link always resolves to each coop's current head.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoopRelationship {
    pub from_coop: RecordId,
    pub to_coop: RecordId,
    pub relationship_type: RelationshipTypeId,
}
