//! Users and roles

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::RecordId;
use crate::{Result, SpamGenieError};

/// Role assigned to a user by an administrator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    #[default]
    Normal,
    PowerUser,
    Admin,
}

impl Role {
    /// Wire value, as used in `?role=` filters
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Normal => "normal",
            Role::PowerUser => "power_user",
            Role::Admin => "admin",
        }
    }
}

impl FromStr for Role {
    type Err = SpamGenieError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "normal" | "user" => Ok(Role::Normal),
            "power_user" | "power" => Ok(Role::PowerUser),
            "admin" => Ok(Role::Admin),
            other => Err(SpamGenieError::Validation(format!(
                "Unknown role '{}'. Use normal, power_user or admin",
                other
            ))),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Role::Normal => "Normal User",
            Role::PowerUser => "Power User",
            Role::Admin => "Admin",
        };
        write!(f, "{}", label)
    }
}

/// A user as returned by `/api/auth/user/` or `/api/users/`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "UserRecord")]
pub struct User {
    pub id: RecordId,
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub role: Role,
}

/// The user list nests the role under `profile`; the auth endpoint puts it
/// at the top level
#[derive(Deserialize)]
struct UserRecord {
    id: RecordId,
    username: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    role: Option<Role>,
    #[serde(default)]
    profile: Option<ProfileRecord>,
}

#[derive(Deserialize)]
struct ProfileRecord {
    #[serde(default)]
    role: Role,
}

impl From<UserRecord> for User {
    fn from(record: UserRecord) -> Self {
        let role = record
            .role
            .or_else(|| record.profile.map(|profile| profile.role))
            .unwrap_or_default();
        Self {
            id: record.id,
            username: record.username,
            email: record.email,
            role,
        }
    }
}

impl User {
    pub fn to_ref(&self) -> UserRef {
        UserRef {
            id: self.id,
            username: self.username.clone(),
        }
    }
}

/// Minimal reference to another user (workspace owner, share target, search hit)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRef {
    pub id: RecordId,
    pub username: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_wire_format() {
        let role: Role = serde_json::from_str("\"power_user\"").unwrap();
        assert_eq!(role, Role::PowerUser);
        assert_eq!(serde_json::to_string(&Role::Admin).unwrap(), "\"admin\"");
    }

    #[test]
    fn test_user_defaults_to_normal_role() {
        let user: User = serde_json::from_str(r#"{"id": 4, "username": "ana"}"#).unwrap();
        assert_eq!(user.role, Role::Normal);
        assert_eq!(user.email, "");
    }

    #[test]
    fn test_role_read_from_profile() {
        let user: User = serde_json::from_str(
            r#"{"id": 5, "username": "root", "email": "root@example.com",
                "profile": {"id": 1, "username": "root", "role": "admin"}}"#,
        )
        .unwrap();
        assert_eq!(user.role, Role::Admin);
    }

    #[test]
    fn test_role_parsing() {
        assert_eq!("power-user".parse::<Role>().unwrap(), Role::PowerUser);
        assert_eq!("ADMIN".parse::<Role>().unwrap(), Role::Admin);
        assert_eq!(Role::PowerUser.as_str(), "power_user");
        assert!("root".parse::<Role>().is_err());
    }
}
