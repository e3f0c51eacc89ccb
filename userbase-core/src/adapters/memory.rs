//! In-memory adapters
//!
//! Used for the `memory` storage backend, as the default record cache, and
//! as lightweight doubles in tests.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::RwLock;

use crate::domain::result::{Error, Result};
use crate::domain::User;
use crate::ports::{UserCache, UserRepository};

/// Process-local user repository; ids start at 1
pub struct InMemoryUserRepository {
    users: RwLock<BTreeMap<i64, User>>,
    next_id: AtomicI64,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self {
            users: RwLock::new(BTreeMap::new()),
            next_id: AtomicI64::new(1),
        }
    }
}

impl Default for InMemoryUserRepository {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned<T>(e: std::sync::PoisonError<T>) -> Error {
    Error::database(format!("Lock poisoned: {}", e))
}

impl UserRepository for InMemoryUserRepository {
    fn insert_user(&self, user: &User) -> Result<i64> {
        let mut users = self.users.write().map_err(poisoned)?;
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let mut stored = user.clone();
        stored.id = id;
        users.insert(id, stored);
        Ok(id)
    }

    fn get_user(&self, id: i64) -> Result<Option<User>> {
        let users = self.users.read().map_err(poisoned)?;
        Ok(users.get(&id).cloned())
    }

    fn list_users(&self) -> Result<Vec<User>> {
        let users = self.users.read().map_err(poisoned)?;
        Ok(users.values().cloned().collect())
    }

    fn update_user(&self, user: &User) -> Result<bool> {
        let mut users = self.users.write().map_err(poisoned)?;
        match users.get_mut(&user.id) {
            Some(stored) => {
                stored.name = user.name.clone();
                stored.email = user.email.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn delete_user(&self, id: i64) -> Result<bool> {
        let mut users = self.users.write().map_err(poisoned)?;
        Ok(users.remove(&id).is_some())
    }

    fn count_users(&self) -> Result<i64> {
        let users = self.users.read().map_err(poisoned)?;
        Ok(users.len() as i64)
    }
}

/// Unbounded record cache backed by a HashMap
///
/// A poisoned lock behaves like an empty cache.
#[derive(Default)]
pub struct InMemoryUserCache {
    entries: RwLock<HashMap<i64, User>>,
}

impl InMemoryUserCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl UserCache for InMemoryUserCache {
    fn get(&self, id: i64) -> Option<User> {
        self.entries.read().ok()?.get(&id).cloned()
    }

    fn put(&self, user: &User) {
        if let Ok(mut entries) = self.entries.write() {
            entries.insert(user.id, user.clone());
        }
    }

    fn invalidate(&self, id: i64) {
        if let Ok(mut entries) = self.entries.write() {
            entries.remove(&id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repository_ids_start_at_one() {
        let repo = InMemoryUserRepository::new();
        assert_eq!(repo.insert_user(&User::new("a", "a@x.io")).unwrap(), 1);
        assert_eq!(repo.insert_user(&User::new("b", "b@x.io")).unwrap(), 2);
        assert_eq!(repo.count_users().unwrap(), 2);
    }

    #[test]
    fn test_repository_update_keeps_created() {
        let repo = InMemoryUserRepository::new();
        let original = User::new("a", "a@x.io");
        let id = repo.insert_user(&original).unwrap();

        let mut changed = repo.get_user(id).unwrap().unwrap();
        changed.name = "renamed".to_string();
        changed.created = chrono::Utc::now() + chrono::Duration::days(1);
        assert!(repo.update_user(&changed).unwrap());

        let stored = repo.get_user(id).unwrap().unwrap();
        assert_eq!(stored.name, "renamed");
        assert_eq!(stored.created, original.created);
    }

    #[test]
    fn test_repository_delete_missing() {
        let repo = InMemoryUserRepository::new();
        assert!(!repo.delete_user(42).unwrap());
        assert!(repo.list_users().unwrap().is_empty());
    }

    #[test]
    fn test_cache_put_get_invalidate() {
        let cache = InMemoryUserCache::new();
        let mut user = User::new("a", "a@x.io");
        user.id = 3;

        assert!(cache.get(3).is_none());
        cache.put(&user);
        assert_eq!(cache.get(3), Some(user.clone()));

        cache.invalidate(3);
        assert!(cache.get(3).is_none());
    }
}
