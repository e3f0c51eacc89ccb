//! User service - record creation and lookup
//!
//! All writes hold the service lock exclusively, so creations (and updates
//! and deletes) are fully serialized. Reads share the lock.

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, warn};

use crate::domain::result::{Error, Result};
use crate::domain::{User, UserPatch};
use crate::ports::{EventLog, UserCache, UserRepository};
use crate::services::LogEvent;

/// Service for managing user records
pub struct UserService {
    repository: Arc<dyn UserRepository>,
    cache: Arc<dyn UserCache>,
    events: Option<Arc<dyn EventLog>>,
    lock: RwLock<()>,
}

impl UserService {
    pub fn new(repository: Arc<dyn UserRepository>, cache: Arc<dyn UserCache>) -> Self {
        Self {
            repository,
            cache,
            events: None,
            lock: RwLock::new(()),
        }
    }

    /// Attach an event log; recorded events never fail an operation
    pub fn with_event_log(mut self, events: Arc<dyn EventLog>) -> Self {
        self.events = Some(events);
        self
    }

    fn write_lock(&self) -> Result<RwLockWriteGuard<'_, ()>> {
        self.lock
            .write()
            .map_err(|e| Error::Other(format!("Lock poisoned: {}", e)))
    }

    fn read_lock(&self) -> Result<RwLockReadGuard<'_, ()>> {
        self.lock
            .read()
            .map_err(|e| Error::Other(format!("Lock poisoned: {}", e)))
    }

    fn record(&self, event: LogEvent) {
        if let Some(events) = &self.events {
            if let Err(e) = events.record(event) {
                warn!("Failed to record event: {}", e);
            }
        }
    }

    /// Create and persist a new user stamped with the current time
    ///
    /// On a storage failure the cause is wrapped as `failed to save user: ...`
    /// and no record is returned.
    pub fn create_user(&self, name: &str, email: &str) -> Result<User> {
        let _guard = self.write_lock()?;

        let mut user = User::new(name, email);
        user.validate()?;

        match self.repository.insert_user(&user) {
            Ok(id) => user.id = id,
            Err(e) => {
                self.record(LogEvent::new("user_create_failed").with_error(e.to_string()));
                return Err(Error::save(e));
            }
        }

        self.cache.put(&user);
        self.record(LogEvent::new("user_created").with_user(user.id));
        debug!("Created user {}", user.id);

        Ok(user)
    }

    /// Look up a single user, consulting the cache first
    pub fn get_user(&self, id: i64) -> Result<User> {
        let _guard = self.read_lock()?;

        if let Some(user) = self.cache.get(id) {
            return Ok(user);
        }

        let user = self
            .repository
            .get_user(id)?
            .ok_or_else(|| Error::not_found(format!("user {}", id)))?;
        self.cache.put(&user);
        Ok(user)
    }

    /// All users ordered by id
    pub fn list_users(&self) -> Result<Vec<User>> {
        let _guard = self.read_lock()?;
        self.repository.list_users()
    }

    /// Apply a partial update to an existing user
    pub fn update_user(&self, id: i64, patch: &UserPatch) -> Result<User> {
        let _guard = self.write_lock()?;

        let mut user = self
            .repository
            .get_user(id)?
            .ok_or_else(|| Error::not_found(format!("user {}", id)))?;

        if !user.apply(patch) {
            return Ok(user);
        }
        user.validate()?;

        if !self.repository.update_user(&user)? {
            // Deleted underneath us by another process
            self.cache.invalidate(id);
            return Err(Error::not_found(format!("user {}", id)));
        }

        self.cache.put(&user);
        self.record(LogEvent::new("user_updated").with_user(id));
        Ok(user)
    }

    /// Delete a user
    pub fn delete_user(&self, id: i64) -> Result<()> {
        let _guard = self.write_lock()?;

        self.cache.invalidate(id);
        if !self.repository.delete_user(id)? {
            return Err(Error::not_found(format!("user {}", id)));
        }

        self.record(LogEvent::new("user_deleted").with_user(id));
        Ok(())
    }

    /// Number of stored users
    pub fn count(&self) -> Result<i64> {
        let _guard = self.read_lock()?;
        self.repository.count_users()
    }
}
