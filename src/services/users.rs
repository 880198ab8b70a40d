//! User administration: list users by role and reassign roles.
//!
//! Both operations need [`Capability::ManageUsers`]; callers without it are
//! refused before anything is sent.

use std::sync::Arc;

use crate::api::SpamGenieApi;
use crate::auth::{Capability, Session};
use crate::models::{RecordId, Role, User};
use crate::{Result, SpamGenieError};

pub struct UserService {
    api: Arc<dyn SpamGenieApi>,
    session: Session,
}

impl UserService {
    pub fn new(api: Arc<dyn SpamGenieApi>, session: Session) -> Self {
        Self { api, session }
    }

    fn require_manage_users(&self) -> Result<()> {
        if !self.session.has(Capability::ManageUsers) {
            return Err(SpamGenieError::Forbidden(
                "Only administrators can manage users".to_string(),
            ));
        }
        Ok(())
    }

    /// All users, or only those holding `role`
    pub async fn list(&self, role: Option<Role>) -> Result<Vec<User>> {
        self.require_manage_users()?;
        self.api.list_users(role).await
    }

    /// Find a user by id or exact username
    pub async fn find(&self, id_or_username: &str) -> Result<User> {
        let by_id = id_or_username.parse::<RecordId>().ok();
        self.list(None)
            .await?
            .into_iter()
            .find(|user| Some(user.id) == by_id || user.username == id_or_username)
            .ok_or_else(|| SpamGenieError::NotFound(format!("user '{}'", id_or_username)))
    }

    /// Assign `role` to `user`. Returns the user unchanged, without a call,
    /// when they already hold it.
    pub async fn set_role(&self, user: &User, role: Role) -> Result<User> {
        self.require_manage_users()?;
        if user.role == role {
            return Ok(user.clone());
        }
        let updated = self.api.update_user_role(user.id, role).await?;
        tracing::info!(
            "Changed role of '{}' from {} to {}",
            updated.username,
            user.role,
            updated.role
        );
        Ok(updated)
    }
}
