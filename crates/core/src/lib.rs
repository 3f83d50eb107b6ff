pub mod contact;
pub mod coop;
pub mod error;
pub mod ids;
pub mod question;
pub mod record;
pub mod time;

pub use error::CoreError;
pub use ids::*;
pub use record::{RevisionMeta, Versioned};
pub use time::Timestamp;
