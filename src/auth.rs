//! # Capabilities
//!
//! Role checks are reduced to a [`CapabilitySet`] once per session instead of
//! asking "is this user an admin / a power user?" all over the code base.
//! The same module holds the template visibility rule and the local
//! pre-checks for template mutations; the backend enforces both again.

use std::collections::HashSet;
use std::sync::Arc;

use crate::api::SpamGenieApi;
use crate::models::{PromptTemplate, Role, User, Visibility, Workspace};
use crate::Result;

/// Something a user is allowed to do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Create or edit templates with global visibility
    ManageGlobalTemplates,
    /// See every template regardless of visibility
    ViewAllTemplates,
    /// Edit or delete templates created by other users
    EditAnyTemplate,
    /// Delete the system base prompts and modules
    DeleteDefaultTemplates,
    /// Administer users and roles
    ManageUsers,
    /// Open any workspace, shared or not
    AccessAllWorkspaces,
}

/// The capabilities granted to one user
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapabilitySet {
    granted: HashSet<Capability>,
}

impl CapabilitySet {
    pub fn for_role(role: Role) -> Self {
        let granted: &[Capability] = match role {
            Role::Normal => &[],
            Role::PowerUser => &[
                Capability::ManageGlobalTemplates,
                Capability::ViewAllTemplates,
                Capability::EditAnyTemplate,
            ],
            Role::Admin => &[
                Capability::ManageGlobalTemplates,
                Capability::ViewAllTemplates,
                Capability::EditAnyTemplate,
                Capability::DeleteDefaultTemplates,
                Capability::ManageUsers,
                Capability::AccessAllWorkspaces,
            ],
        };
        Self {
            granted: granted.iter().copied().collect(),
        }
    }

    pub fn has(&self, capability: Capability) -> bool {
        self.granted.contains(&capability)
    }

    pub fn iter(&self) -> impl Iterator<Item = Capability> + '_ {
        self.granted.iter().copied()
    }
}

/// The signed-in user and their capabilities, resolved once
#[derive(Debug, Clone)]
pub struct Session {
    pub user: User,
    pub capabilities: CapabilitySet,
}

impl Session {
    pub fn new(user: User) -> Self {
        let capabilities = CapabilitySet::for_role(user.role);
        Self { user, capabilities }
    }

    /// Ask the backend who we are
    pub async fn establish(api: &Arc<dyn SpamGenieApi>) -> Result<Self> {
        let user = api.current_user().await?;
        tracing::info!("Signed in as {} ({})", user.username, user.role);
        Ok(Self::new(user))
    }

    pub fn has(&self, capability: Capability) -> bool {
        self.capabilities.has(capability)
    }

    /// Whether `template` should be offered to this user.
    ///
    /// `workspaces` are the workspaces the user can see; workspace-scoped
    /// templates are visible to that workspace's owner and everyone it is
    /// shared with.
    pub fn can_see_template(&self, template: &PromptTemplate, workspaces: &[Workspace]) -> bool {
        if self.has(Capability::ViewAllTemplates) {
            return true;
        }
        match template.visibility {
            Visibility::Global => true,
            Visibility::UserWorkspaces => template.created_by == Some(self.user.id),
            Visibility::Workspace => template.workspace.is_some_and(|id| {
                workspaces
                    .iter()
                    .any(|ws| ws.id == id && ws.is_member(self.user.id))
            }),
        }
    }

    /// Local pre-check before creating or switching a template to `visibility`
    pub fn can_use_visibility(&self, visibility: Visibility) -> bool {
        visibility != Visibility::Global || self.has(Capability::ManageGlobalTemplates)
    }

    /// Local pre-check before editing a template
    pub fn can_edit_template(&self, template: &PromptTemplate) -> bool {
        self.has(Capability::EditAnyTemplate) || template.created_by == Some(self.user.id)
    }

    /// Local pre-check before deleting a template
    pub fn can_delete_template(&self, template: &PromptTemplate) -> bool {
        if template.kind.is_default() {
            return self.has(Capability::DeleteDefaultTemplates);
        }
        self.can_edit_template(template)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Permission, TemplateKind, UserRef, WorkspaceShare};
    use chrono::Utc;

    fn session(id: i64, role: Role) -> Session {
        Session::new(User {
            id,
            username: format!("user{}", id),
            email: String::new(),
            role,
        })
    }

    fn template(visibility: Visibility, created_by: Option<i64>, workspace: Option<i64>) -> PromptTemplate {
        PromptTemplate {
            id: 1,
            name: "t".into(),
            description: String::new(),
            body: "body".into(),
            kind: TemplateKind::Workspace,
            visibility,
            created_by,
            workspace,
            created_at: None,
            updated_at: None,
        }
    }

    fn workspaces() -> Vec<Workspace> {
        vec![Workspace {
            id: 50,
            name: "shared".into(),
            owner: UserRef {
                id: 1,
                username: "owner".into(),
            },
            description: String::new(),
            created_at: Utc::now(),
            shares: vec![WorkspaceShare {
                user_id: 2,
                username: "friend".into(),
                email: String::new(),
                permission: Permission::Read,
            }],
        }]
    }

    #[test]
    fn test_role_capabilities() {
        let normal = CapabilitySet::for_role(Role::Normal);
        assert!(!normal.has(Capability::ManageGlobalTemplates));

        let power = CapabilitySet::for_role(Role::PowerUser);
        assert!(power.has(Capability::ManageGlobalTemplates));
        assert!(!power.has(Capability::DeleteDefaultTemplates));

        let admin = CapabilitySet::for_role(Role::Admin);
        assert!(admin.has(Capability::DeleteDefaultTemplates));
        assert!(admin.has(Capability::ManageUsers));
    }

    #[test]
    fn test_global_templates_visible_to_everyone() {
        let t = template(Visibility::Global, Some(9), None);
        assert!(session(3, Role::Normal).can_see_template(&t, &[]));
    }

    #[test]
    fn test_user_workspace_templates_visible_to_creator_only() {
        let t = template(Visibility::UserWorkspaces, Some(3), None);
        assert!(session(3, Role::Normal).can_see_template(&t, &[]));
        assert!(!session(4, Role::Normal).can_see_template(&t, &[]));
        assert!(session(4, Role::PowerUser).can_see_template(&t, &[]));
    }

    #[test]
    fn test_workspace_templates_visible_to_owner_and_shares() {
        let t = template(Visibility::Workspace, Some(1), Some(50));
        let all = workspaces();
        assert!(session(1, Role::Normal).can_see_template(&t, &all));
        assert!(session(2, Role::Normal).can_see_template(&t, &all));
        assert!(!session(3, Role::Normal).can_see_template(&t, &all));
    }

    #[test]
    fn test_template_mutation_checks() {
        let mut t = template(Visibility::Workspace, Some(3), Some(50));
        assert!(session(3, Role::Normal).can_delete_template(&t));
        assert!(!session(4, Role::Normal).can_delete_template(&t));
        assert!(session(4, Role::PowerUser).can_delete_template(&t));

        t.kind = TemplateKind::Base;
        assert!(!session(3, Role::Normal).can_delete_template(&t));
        assert!(!session(4, Role::PowerUser).can_delete_template(&t));
        assert!(session(5, Role::Admin).can_delete_template(&t));

        assert!(!session(3, Role::Normal).can_use_visibility(Visibility::Global));
        assert!(session(3, Role::PowerUser).can_use_visibility(Visibility::Global));
    }
}
