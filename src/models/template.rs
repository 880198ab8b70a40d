//! # Prompt Template Models
//!
//! Templates come in three kinds:
//! - **Base**: the prompt skeleton used for rule generation
//! - **Module**: an optional fragment (scoring guidance, URI detection, ...)
//!   appended to the base, tagged with a module type
//! - **Workspace**: a custom prompt saved by a user
//!
//! The backend keeps the kind as two flags (`is_base`, `is_module`) plus a
//! `module_type`; on the client it is a single discriminated [`TemplateKind`].
//! The backend is the only place that enforces "one designated base"; the
//! client always treats base templates as a list.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::RecordId;
use crate::{Result, SpamGenieError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateKind {
    Base,
    Module { module_type: String },
    Workspace,
}

impl TemplateKind {
    pub fn is_base(&self) -> bool {
        matches!(self, TemplateKind::Base)
    }

    pub fn is_module(&self) -> bool {
        matches!(self, TemplateKind::Module { .. })
    }

    /// Base prompts and modules are the system defaults only admins may delete
    pub fn is_default(&self) -> bool {
        self.is_base() || self.is_module()
    }

    fn into_flags(self) -> (bool, bool, Option<String>) {
        match self {
            TemplateKind::Base => (true, false, None),
            TemplateKind::Module { module_type } => (false, true, Some(module_type)),
            TemplateKind::Workspace => (false, false, None),
        }
    }

    fn from_flags(is_base: bool, is_module: bool, module_type: Option<String>) -> Self {
        if is_base {
            TemplateKind::Base
        } else if is_module {
            TemplateKind::Module {
                module_type: module_type.unwrap_or_default(),
            }
        } else {
            TemplateKind::Workspace
        }
    }
}

/// Who can see a template
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    /// Everyone
    Global,
    /// The creator, in all of their workspaces
    UserWorkspaces,
    /// The owner of one workspace and the users it is shared with
    #[default]
    Workspace,
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Visibility::Global => "global",
            Visibility::UserWorkspaces => "user_workspaces",
            Visibility::Workspace => "workspace",
        };
        write!(f, "{}", label)
    }
}

impl std::str::FromStr for Visibility {
    type Err = SpamGenieError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "global" => Ok(Visibility::Global),
            "user_workspaces" | "all_workspaces" => Ok(Visibility::UserWorkspaces),
            "workspace" => Ok(Visibility::Workspace),
            other => Err(SpamGenieError::Validation(format!(
                "Unknown visibility '{}'. Use global, user_workspaces or workspace",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "TemplateRecord", into = "TemplateRecord")]
pub struct PromptTemplate {
    pub id: RecordId,
    pub name: String,
    pub description: String,
    pub body: String,
    pub kind: TemplateKind,
    pub visibility: Visibility,
    pub created_by: Option<RecordId>,
    pub workspace: Option<RecordId>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Backend representation of a template
#[derive(Debug, Clone, Serialize, Deserialize)]
struct TemplateRecord {
    id: RecordId,
    name: String,
    #[serde(default)]
    description: String,
    template: String,
    #[serde(default)]
    is_base: bool,
    #[serde(default)]
    is_module: bool,
    #[serde(default)]
    module_type: Option<String>,
    #[serde(default)]
    visibility: Visibility,
    #[serde(default)]
    created_by: Option<RecordId>,
    #[serde(default)]
    workspace: Option<RecordId>,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    updated_at: Option<DateTime<Utc>>,
}

impl From<TemplateRecord> for PromptTemplate {
    fn from(record: TemplateRecord) -> Self {
        Self {
            id: record.id,
            name: record.name,
            description: record.description,
            body: record.template,
            kind: TemplateKind::from_flags(record.is_base, record.is_module, record.module_type),
            visibility: record.visibility,
            created_by: record.created_by,
            workspace: record.workspace,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

impl From<PromptTemplate> for TemplateRecord {
    fn from(template: PromptTemplate) -> Self {
        let (is_base, is_module, module_type) = template.kind.into_flags();
        Self {
            id: template.id,
            name: template.name,
            description: template.description,
            template: template.body,
            is_base,
            is_module,
            module_type,
            visibility: template.visibility,
            created_by: template.created_by,
            workspace: template.workspace,
            created_at: template.created_at,
            updated_at: template.updated_at,
        }
    }
}

/// Payload for creating a template
#[derive(Debug, Clone, PartialEq)]
pub struct NewTemplate {
    pub name: String,
    pub description: String,
    pub body: String,
    pub kind: TemplateKind,
    pub visibility: Visibility,
    pub workspace: Option<RecordId>,
}

impl NewTemplate {
    /// A custom prompt scoped to one workspace
    pub fn for_workspace(name: impl Into<String>, body: impl Into<String>, workspace: RecordId) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            body: body.into(),
            kind: TemplateKind::Workspace,
            visibility: Visibility::Workspace,
            workspace: Some(workspace),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(SpamGenieError::Validation(
                "Template name cannot be empty".to_string(),
            ));
        }
        if self.name.chars().count() > 100 {
            return Err(SpamGenieError::Validation(
                "Template name cannot exceed 100 characters".to_string(),
            ));
        }
        if self.body.trim().is_empty() {
            return Err(SpamGenieError::Validation(
                "Template body cannot be empty".to_string(),
            ));
        }
        if self.visibility == Visibility::Workspace && self.workspace.is_none() {
            return Err(SpamGenieError::Validation(
                "Workspace-specific templates must be associated with a workspace".to_string(),
            ));
        }
        Ok(())
    }

    /// JSON body for `POST /api/prompt-templates/`
    pub fn to_payload(&self) -> serde_json::Value {
        let (is_base, is_module, module_type) = self.kind.clone().into_flags();
        serde_json::json!({
            "name": self.name.trim(),
            "description": self.description,
            "template": self.body,
            "is_base": is_base,
            "is_module": is_module,
            "module_type": module_type,
            "visibility": self.visibility,
            "workspace": self.workspace,
        })
    }
}

/// Partial update for `PATCH /api/prompt-templates/<id>/`
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TemplateUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "template", skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visibility: Option<Visibility>,
}

impl TemplateUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.body.is_none()
            && self.visibility.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_template_from_backend() {
        let json = r#"{
            "id": 7,
            "name": "URI detection",
            "template": "Look for suspicious URIs.",
            "is_base": false,
            "is_module": true,
            "module_type": "uri",
            "visibility": "global",
            "created_by": null,
            "workspace": null
        }"#;

        let template: PromptTemplate = serde_json::from_str(json).unwrap();
        assert_eq!(
            template.kind,
            TemplateKind::Module {
                module_type: "uri".into()
            }
        );
        assert_eq!(template.body, "Look for suspicious URIs.");
        assert_eq!(template.visibility, Visibility::Global);
    }

    #[test]
    fn test_template_serializes_back_to_flags() {
        let template = PromptTemplate {
            id: 1,
            name: "Default".into(),
            description: String::new(),
            body: "base".into(),
            kind: TemplateKind::Base,
            visibility: Visibility::Global,
            created_by: None,
            workspace: None,
            created_at: None,
            updated_at: None,
        };

        let value = serde_json::to_value(&template).unwrap();
        assert_eq!(value["is_base"], true);
        assert_eq!(value["is_module"], false);
        assert_eq!(value["template"], "base");
    }

    #[test]
    fn test_new_template_validation() {
        let mut template = NewTemplate::for_workspace("Mine", "Be strict", 3);
        assert!(template.validate().is_ok());

        template.workspace = None;
        assert!(template.validate().is_err());

        let empty = NewTemplate::for_workspace(" ", "body", 3);
        assert!(empty.validate().is_err());
    }

    #[test]
    fn test_update_skips_unset_fields() {
        let update = TemplateUpdate {
            body: Some("new".into()),
            ..Default::default()
        };
        assert_eq!(
            serde_json::to_value(&update).unwrap(),
            serde_json::json!({"template": "new"})
        );
        assert!(TemplateUpdate::default().is_empty());
    }
}
