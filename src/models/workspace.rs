//! # Workspace Models
//!
//! A workspace scopes one investigation's samples, headers and generated rules.
//! Owners may share a workspace with other users at `read` or `write` level.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::{RecordId, User, UserRef};
use crate::auth::{Capability, CapabilitySet};
use crate::{Result, SpamGenieError};

/// Longest workspace name the backend accepts
pub const MAX_WORKSPACE_NAME_LEN: usize = 25;

/// Permission granted by a workspace share
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    #[default]
    Read,
    Write,
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Permission::Read => write!(f, "read"),
            Permission::Write => write!(f, "write"),
        }
    }
}

impl std::str::FromStr for Permission {
    type Err = SpamGenieError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "read" | "r" | "read-only" => Ok(Permission::Read),
            "write" | "w" | "read-write" => Ok(Permission::Write),
            other => Err(SpamGenieError::Validation(format!(
                "Unknown permission '{}'. Use 'read' or 'write'",
                other
            ))),
        }
    }
}

/// One user a workspace has been shared with
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkspaceShare {
    pub user_id: RecordId,
    pub username: String,
    #[serde(default)]
    pub email: String,
    pub permission: Permission,
}

/// How the current user reaches a workspace
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkspaceAccess {
    Owner,
    Shared(Permission),
}

impl WorkspaceAccess {
    /// Read-only shares suppress upload, header selection and prompt editing
    pub fn is_read_only(&self) -> bool {
        matches!(self, WorkspaceAccess::Shared(Permission::Read))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workspace {
    pub id: RecordId,
    pub name: String,
    pub owner: UserRef,
    #[serde(default)]
    pub description: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub shares: Vec<WorkspaceShare>,
}

impl Workspace {
    /// Check a workspace name before it is sent anywhere.
    ///
    /// Returns the trimmed name.
    pub fn validate_name(name: &str) -> Result<String> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(SpamGenieError::Validation(
                "Workspace name cannot be empty".to_string(),
            ));
        }
        if trimmed.chars().count() > MAX_WORKSPACE_NAME_LEN {
            return Err(SpamGenieError::Validation(format!(
                "Workspace name cannot exceed {} characters",
                MAX_WORKSPACE_NAME_LEN
            )));
        }
        Ok(trimmed.to_string())
    }

    /// Resolve the access level of `user`, or `None` if the workspace is not
    /// theirs and was not shared with them
    pub fn access_for(&self, user: &User) -> Option<WorkspaceAccess> {
        if self.owner.id == user.id
            || CapabilitySet::for_role(user.role).has(Capability::AccessAllWorkspaces)
        {
            return Some(WorkspaceAccess::Owner);
        }
        self.shares
            .iter()
            .find(|share| share.user_id == user.id)
            .map(|share| WorkspaceAccess::Shared(share.permission))
    }

    /// True for the owner and anyone the workspace is shared with
    pub fn is_member(&self, user_id: RecordId) -> bool {
        self.owner.id == user_id || self.shares.iter().any(|s| s.user_id == user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;

    fn workspace() -> Workspace {
        Workspace {
            id: 1,
            name: "phish-wave".into(),
            owner: UserRef {
                id: 10,
                username: "owner".into(),
            },
            description: String::new(),
            created_at: Utc::now(),
            shares: vec![
                WorkspaceShare {
                    user_id: 11,
                    username: "reader".into(),
                    email: String::new(),
                    permission: Permission::Read,
                },
                WorkspaceShare {
                    user_id: 12,
                    username: "writer".into(),
                    email: String::new(),
                    permission: Permission::Write,
                },
            ],
        }
    }

    fn user(id: RecordId, role: Role) -> User {
        User {
            id,
            username: format!("user{}", id),
            email: String::new(),
            role,
        }
    }

    #[test]
    fn test_name_validation() {
        assert_eq!(Workspace::validate_name("  campaign  ").unwrap(), "campaign");
        assert!(Workspace::validate_name("").is_err());
        assert!(Workspace::validate_name("   ").is_err());
        assert!(Workspace::validate_name(&"a".repeat(25)).is_ok());
        assert!(Workspace::validate_name(&"a".repeat(26)).is_err());
    }

    #[test]
    fn test_access_levels() {
        let ws = workspace();
        assert_eq!(ws.access_for(&user(10, Role::Normal)), Some(WorkspaceAccess::Owner));
        assert_eq!(
            ws.access_for(&user(11, Role::Normal)),
            Some(WorkspaceAccess::Shared(Permission::Read))
        );
        assert!(ws.access_for(&user(11, Role::Normal)).unwrap().is_read_only());
        assert!(!ws.access_for(&user(12, Role::Normal)).unwrap().is_read_only());
        assert_eq!(ws.access_for(&user(99, Role::Normal)), None);
    }

    #[test]
    fn test_only_access_all_capability_opens_foreign_workspace() {
        let ws = workspace();
        assert_eq!(ws.access_for(&user(99, Role::Admin)), Some(WorkspaceAccess::Owner));
        assert_eq!(ws.access_for(&user(99, Role::PowerUser)), None);
        assert_eq!(
            ws.access_for(&user(11, Role::PowerUser)),
            Some(WorkspaceAccess::Shared(Permission::Read))
        );
    }

    #[test]
    fn test_permission_parsing() {
        assert_eq!("READ".parse::<Permission>().unwrap(), Permission::Read);
        assert_eq!("write".parse::<Permission>().unwrap(), Permission::Write);
        assert!("admin".parse::<Permission>().is_err());
    }
}
