pub mod catalog;
pub mod error;
pub mod schema;
pub mod sqlite;
pub mod traits;

pub use error::StorageError;
pub use sqlite::SqliteStorage;
pub use traits::RevisionStore;
