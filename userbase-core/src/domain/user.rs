//! User domain model

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

use super::result::{Error, Result};

/// A stored user record
///
/// Serialized on the wire as `{ "id", "name", "email", "created" }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub created: DateTime<Utc>,
}

impl User {
    /// Build an unsaved record stamped with the current time.
    ///
    /// The id stays 0 until a repository assigns one. The timestamp is
    /// truncated to microseconds, the precision storage keeps.
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: 0,
            name: name.into(),
            email: email.into(),
            created: Utc::now().trunc_subsecs(6),
        }
    }

    /// Display form: `Name <email>`
    pub fn full_name(&self) -> String {
        format!("{} <{}>", self.name, self.email)
    }

    /// Minimal sanity checks on the record fields
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::validation("name must not be empty"));
        }
        if !self.email.contains('@') {
            return Err(Error::validation(format!(
                "email '{}' is not a valid address",
                self.email
            )));
        }
        Ok(())
    }

    /// Apply a partial update, returning true if anything changed
    pub fn apply(&mut self, patch: &UserPatch) -> bool {
        let mut changed = false;
        if let Some(name) = &patch.name {
            if *name != self.name {
                self.name = name.clone();
                changed = true;
            }
        }
        if let Some(email) = &patch.email {
            if *email != self.email {
                self.email = email.clone();
                changed = true;
            }
        }
        changed
    }
}

/// Request body for creating a user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewUser {
    pub name: String,
    pub email: String,
}

/// Request body for updating a user; absent fields are left untouched
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl UserPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.email.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_creation() {
        let before = Utc::now().trunc_subsecs(6);
        let user = User::new("Ada", "ada@example.com");
        assert_eq!(user.id, 0);
        assert_eq!(user.name, "Ada");
        assert_eq!(user.email, "ada@example.com");
        assert!(user.created >= before);
    }

    #[test]
    fn test_full_name() {
        let user = User::new("Ada", "ada@example.com");
        assert_eq!(user.full_name(), "Ada <ada@example.com>");
    }

    #[test]
    fn test_validate() {
        assert!(User::new("Ada", "ada@example.com").validate().is_ok());

        let err = User::new("  ", "ada@example.com").validate().unwrap_err();
        assert!(matches!(err, Error::Validation(_)));

        let err = User::new("Ada", "not-an-address").validate().unwrap_err();
        assert!(err.to_string().contains("not-an-address"));
    }

    #[test]
    fn test_json_field_names() {
        let mut user = User::new("Ada", "ada@example.com");
        user.id = 7;
        let value = serde_json::to_value(&user).unwrap();
        let obj = value.as_object().unwrap();

        let mut keys: Vec<_> = obj.keys().cloned().collect();
        keys.sort();
        assert_eq!(keys, vec!["created", "email", "id", "name"]);
        assert_eq!(obj["id"], 7);
    }

    #[test]
    fn test_apply_patch() {
        let mut user = User::new("Ada", "ada@example.com");

        assert!(!user.apply(&UserPatch::default()));
        assert!(!user.apply(&UserPatch {
            name: Some("Ada".to_string()),
            email: None,
        }));

        let changed = user.apply(&UserPatch {
            name: None,
            email: Some("ada@lovelace.dev".to_string()),
        });
        assert!(changed);
        assert_eq!(user.name, "Ada");
        assert_eq!(user.email, "ada@lovelace.dev");
    }
}
