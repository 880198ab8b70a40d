//! Prompt template listing and CRUD
//!
//! Listing applies the visibility rules from [`Session::can_see_template`],
//! so a backend that returns more than the caller should see is narrowed
//! down locally. Mutations are checked against the caller's capabilities
//! before they are sent.

use std::sync::Arc;

use crate::api::{SpamGenieApi, TemplateFilter};
use crate::auth::{Capability, Session};
use crate::models::{NewTemplate, PromptTemplate, RecordId, TemplateUpdate};
use crate::{Result, SpamGenieError};

pub struct TemplateService {
    api: Arc<dyn SpamGenieApi>,
    session: Session,
}

impl TemplateService {
    pub fn new(api: Arc<dyn SpamGenieApi>, session: Session) -> Self {
        Self { api, session }
    }

    /// Templates the caller may see, sorted by name
    pub async fn list_visible(&self, filter: TemplateFilter) -> Result<Vec<PromptTemplate>> {
        let templates = self.api.list_templates(filter).await?;
        let workspaces = self.api.list_workspaces().await?;
        let mut visible: Vec<PromptTemplate> = templates
            .into_iter()
            .filter(|t| self.session.can_see_template(t, &workspaces))
            .collect();
        visible.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(visible)
    }

    pub async fn base_templates(&self) -> Result<Vec<PromptTemplate>> {
        self.list_visible(TemplateFilter::Base).await
    }

    pub async fn module_templates(&self) -> Result<Vec<PromptTemplate>> {
        self.list_visible(TemplateFilter::Modules).await
    }

    pub async fn get(&self, id: RecordId) -> Result<PromptTemplate> {
        self.list_visible(TemplateFilter::All)
            .await?
            .into_iter()
            .find(|t| t.id == id)
            .ok_or_else(|| SpamGenieError::NotFound(format!("prompt template {}", id)))
    }

    pub async fn create(&self, template: &NewTemplate) -> Result<PromptTemplate> {
        template.validate()?;
        if !self.session.can_use_visibility(template.visibility) {
            return Err(SpamGenieError::Forbidden(
                "Only power users and admins can create global templates".to_string(),
            ));
        }
        if template.kind.is_default() && !self.session.has(Capability::ManageGlobalTemplates) {
            return Err(SpamGenieError::Forbidden(
                "Only power users and admins can create base prompts and modules".to_string(),
            ));
        }

        let created = self.api.create_template(template).await?;
        tracing::info!("Created template '{}' ({})", created.name, created.id);
        Ok(created)
    }

    pub async fn update(
        &self,
        template: &PromptTemplate,
        update: &TemplateUpdate,
    ) -> Result<PromptTemplate> {
        if update.is_empty() {
            return Err(SpamGenieError::Validation("Nothing to update".to_string()));
        }
        if let Some(name) = &update.name {
            if name.trim().is_empty() {
                return Err(SpamGenieError::Validation(
                    "Template name cannot be empty".to_string(),
                ));
            }
        }
        if !self.session.can_edit_template(template) {
            return Err(SpamGenieError::Forbidden(format!(
                "You can only edit your own templates, '{}' belongs to someone else",
                template.name
            )));
        }
        if let Some(visibility) = update.visibility {
            if !self.session.can_use_visibility(visibility) {
                return Err(SpamGenieError::Forbidden(
                    "Only power users and admins can make templates global".to_string(),
                ));
            }
        }

        let updated = self.api.update_template(template.id, update).await?;
        tracing::info!("Updated template '{}' ({})", updated.name, updated.id);
        Ok(updated)
    }

    pub async fn delete(&self, template: &PromptTemplate) -> Result<()> {
        if !self.session.can_delete_template(template) {
            let reason = if template.kind.is_default() {
                "Only admins can delete base prompts and modules"
            } else {
                "You can only delete your own templates"
            };
            return Err(SpamGenieError::Forbidden(reason.to_string()));
        }
        self.api.delete_template(template.id).await?;
        tracing::info!("Deleted template '{}' ({})", template.name, template.id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::memory::InMemoryBackend;
    use crate::models::{Role, TemplateKind, User, Visibility};

    fn user(id: RecordId, role: Role) -> User {
        User {
            id,
            username: format!("user{}", id),
            email: String::new(),
            role,
        }
    }

    fn template(id: RecordId, name: &str, kind: TemplateKind, visibility: Visibility, created_by: RecordId) -> PromptTemplate {
        PromptTemplate {
            id,
            name: name.into(),
            description: String::new(),
            body: format!("{} body", name),
            kind,
            visibility,
            created_by: Some(created_by),
            workspace: None,
            created_at: None,
            updated_at: None,
        }
    }

    fn seeded(role: Role) -> (InMemoryBackend, TemplateService) {
        let me = user(1, role);
        let backend = InMemoryBackend::new(me.clone());
        backend.insert_template(template(100, "Standard", TemplateKind::Base, Visibility::Global, 9));
        backend.insert_template(template(
            101,
            "Private base",
            TemplateKind::Base,
            Visibility::UserWorkspaces,
            9,
        ));
        backend.insert_template(template(
            102,
            "Scoring",
            TemplateKind::Module {
                module_type: "scoring".into(),
            },
            Visibility::Global,
            9,
        ));
        let api: Arc<dyn SpamGenieApi> = Arc::new(backend.clone());
        (backend, TemplateService::new(api, Session::new(me)))
    }

    #[tokio::test]
    async fn test_visibility_filtering() {
        let (_backend, service) = seeded(Role::Normal);
        let bases = service.base_templates().await.unwrap();
        assert_eq!(bases.len(), 1);
        assert_eq!(bases[0].name, "Standard");
        assert_eq!(service.module_templates().await.unwrap().len(), 1);

        let (_backend, power) = seeded(Role::PowerUser);
        assert_eq!(power.base_templates().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_normal_user_cannot_create_global() {
        let (backend, service) = seeded(Role::Normal);
        let mut new = NewTemplate::for_workspace("Mine", "body", 5);
        new.visibility = Visibility::Global;
        new.workspace = None;
        let err = service.create(&new).await.unwrap_err();
        assert!(matches!(err, SpamGenieError::Forbidden(_)));
        assert_eq!(backend.call_count("create_template"), 0);

        new.visibility = Visibility::UserWorkspaces;
        let created = service.create(&new).await.unwrap();
        assert_eq!(created.created_by, Some(1));
    }

    #[tokio::test]
    async fn test_delete_rules() {
        let (backend, service) = seeded(Role::Normal);
        let base = service.get(100).await.unwrap();
        assert!(matches!(
            service.delete(&base).await,
            Err(SpamGenieError::Forbidden(_))
        ));
        assert_eq!(backend.call_count("delete_template"), 0);

        let (_backend, admin) = seeded(Role::Admin);
        let base = admin.get(100).await.unwrap();
        admin.delete(&base).await.unwrap();
        assert!(admin.get(100).await.is_err());
    }

    #[tokio::test]
    async fn test_update_own_template_only() {
        let (_backend, service) = seeded(Role::Normal);
        let mine = service
            .create(&{
                let mut t = NewTemplate::for_workspace("Mine", "body", 5);
                t.visibility = Visibility::UserWorkspaces;
                t.workspace = None;
                t
            })
            .await
            .unwrap();

        let update = TemplateUpdate {
            body: Some("new body".into()),
            ..Default::default()
        };
        let updated = service.update(&mine, &update).await.unwrap();
        assert_eq!(updated.body, "new body");

        let theirs = service.get(102).await.unwrap();
        assert!(matches!(
            service.update(&theirs, &update).await,
            Err(SpamGenieError::Forbidden(_))
        ));
        assert!(matches!(
            service.update(&mine, &TemplateUpdate::default()).await,
            Err(SpamGenieError::Validation(_))
        ));
    }
}
