use serde::{Deserialize, Serialize};

use crate::ids::*;
use crate::time::Timestamp;

/// A label for a contact method, e.g. "Main", "Work", "Home". Rank
/// controls display order. Contactables themselves are bare anchor ids
/// (`ContactId`) that coops and users point at.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContactLabel {
    pub id: LabelId,
    pub label: String,
    pub rank: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Email {
    pub id: EmailId,
    pub contactable: ContactId,
    pub label: LabelId,
    pub address: String,
    pub description: String,
    pub created_at: Timestamp,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhoneNumber {
    pub id: PhoneId,
    pub contactable: ContactId,
    pub label: LabelId,
    pub number: String,
    pub description: String,
    pub created_at: Timestamp,
}
