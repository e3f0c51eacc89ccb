//! Cache port - read-through record cache

use crate::domain::User;

/// Record cache keyed by user id
///
/// A cache is allowed to forget entries at any time; callers always fall
/// back to the repository on a miss.
pub trait UserCache: Send + Sync {
    fn get(&self, id: i64) -> Option<User>;

    fn put(&self, user: &User);

    fn invalidate(&self, id: i64);
}
