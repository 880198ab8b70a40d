//! Workspace management: creation, deletion, sharing and user search

use std::sync::Arc;

use crate::api::SpamGenieApi;
use crate::auth::Session;
use crate::models::{
    Permission, RecordId, UserRef, Workspace, WorkspaceAccess, WorkspaceShare,
};
use crate::{Result, SpamGenieError};

/// User searches shorter than this return nothing without asking the backend
pub const MIN_USER_SEARCH_LEN: usize = 2;

pub struct WorkspaceService {
    api: Arc<dyn SpamGenieApi>,
    session: Session,
}

impl WorkspaceService {
    pub fn new(api: Arc<dyn SpamGenieApi>, session: Session) -> Self {
        Self { api, session }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub async fn list(&self) -> Result<Vec<Workspace>> {
        self.api.list_workspaces().await
    }

    /// Find a workspace by id, or by exact name among the caller's workspaces
    pub async fn find(&self, id_or_name: &str) -> Result<Workspace> {
        let workspaces = self.list().await?;
        let by_id = id_or_name.parse::<RecordId>().ok();
        workspaces
            .into_iter()
            .find(|ws| Some(ws.id) == by_id || ws.name == id_or_name)
            .ok_or_else(|| SpamGenieError::NotFound(format!("workspace '{}'", id_or_name)))
    }

    /// How the signed-in user reaches `workspace`
    pub fn access(&self, workspace: &Workspace) -> Result<WorkspaceAccess> {
        workspace.access_for(&self.session.user).ok_or_else(|| {
            SpamGenieError::Forbidden(format!("No access to workspace '{}'", workspace.name))
        })
    }

    /// Create a workspace. The name is validated before anything is sent.
    pub async fn create(&self, name: &str, description: &str) -> Result<Workspace> {
        let name = Workspace::validate_name(name)?;
        let workspace = self.api.create_workspace(&name, description.trim()).await?;
        tracing::info!("Created workspace '{}' ({})", workspace.name, workspace.id);
        Ok(workspace)
    }

    pub async fn delete(&self, workspace: &Workspace) -> Result<()> {
        self.require_owner(workspace)?;
        self.api.delete_workspace(workspace.id).await?;
        tracing::info!("Deleted workspace '{}' ({})", workspace.name, workspace.id);
        Ok(())
    }

    /// Share with a user by username or email; re-sharing updates the permission
    pub async fn share(
        &self,
        workspace: &Workspace,
        username_or_email: &str,
        permission: Permission,
    ) -> Result<WorkspaceShare> {
        self.require_owner(workspace)?;
        let target = username_or_email.trim();
        if target.is_empty() {
            return Err(SpamGenieError::Validation(
                "Enter a username or email to share with".to_string(),
            ));
        }
        if target == self.session.user.username
            || (!self.session.user.email.is_empty() && target == self.session.user.email)
        {
            return Err(SpamGenieError::Validation(
                "You cannot share a workspace with yourself".to_string(),
            ));
        }

        let share = self.api.share_workspace(workspace.id, target, permission).await?;
        tracing::info!(
            "Shared workspace '{}' with {} ({})",
            workspace.name,
            share.username,
            share.permission
        );
        Ok(share)
    }

    pub async fn unshare(&self, workspace: &Workspace, user_id: RecordId) -> Result<()> {
        self.require_owner(workspace)?;
        self.api.remove_share(workspace.id, user_id).await?;
        tracing::info!("Removed user {} from workspace '{}'", user_id, workspace.name);
        Ok(())
    }

    /// Users matching a username or email fragment
    pub async fn search_users(&self, query: &str) -> Result<Vec<UserRef>> {
        let query = query.trim();
        if query.chars().count() < MIN_USER_SEARCH_LEN {
            return Ok(Vec::new());
        }
        self.api.search_users(query).await
    }

    fn require_owner(&self, workspace: &Workspace) -> Result<()> {
        match self.access(workspace)? {
            WorkspaceAccess::Owner => Ok(()),
            WorkspaceAccess::Shared(_) => Err(SpamGenieError::Forbidden(format!(
                "Only the owner of '{}' can do this",
                workspace.name
            ))),
        }
    }
}
