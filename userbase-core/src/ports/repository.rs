//! Repository port - user storage abstraction

use crate::domain::result::Result;
use crate::domain::User;

/// User storage abstraction
///
/// Implementations (adapters) provide the actual persistence. All methods
/// are blocking; async callers should hop onto a blocking thread.
pub trait UserRepository: Send + Sync {
    /// Insert a new record and return the id assigned to it.
    ///
    /// The `id` field of the argument is ignored.
    fn insert_user(&self, user: &User) -> Result<i64>;

    /// Get a record by id
    fn get_user(&self, id: i64) -> Result<Option<User>>;

    /// Get all records, ordered by id
    fn list_users(&self) -> Result<Vec<User>>;

    /// Overwrite name and email of an existing record.
    ///
    /// Returns false if no record has that id.
    fn update_user(&self, user: &User) -> Result<bool>;

    /// Delete a record, returning false if it did not exist
    fn delete_user(&self, id: i64) -> Result<bool>;

    /// Number of stored records
    fn count_users(&self) -> Result<i64>;
}
