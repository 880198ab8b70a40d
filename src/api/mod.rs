// Backend API abstraction for SpamGenie
// Every REST operation the client consumes goes through this trait

//! # Backend API Layer
//!
//! The REST backend owns all persistent records. This module defines the
//! [`SpamGenieApi`] trait listing the operations the client consumes, so the
//! wizard and services can run against either implementation:
//!
//! - [`http::HttpBackend`]: the real backend over HTTP (reqwest)
//! - [`memory::InMemoryBackend`]: in-process stand-in for development and tests
//!
//! ## Rust Learning Notes:
//!
//! ### Async Traits
//! The `async-trait` crate lets trait methods be `async`; the `Send + Sync`
//! bound allows an `Arc<dyn SpamGenieApi>` to be shared with spawned tasks
//! such as the generation poller.

use serde::{Deserialize, Serialize};

use crate::models::{
    AssembledPrompt, CandidateFile, EmailSample, GenerationResult, GenerationStatus, HeaderSet,
    NewTemplate, Permission, PromptTemplate, RecordId, Role, TemplateUpdate, User, UserRef,
    Workspace, WorkspaceShare,
};
use crate::Result;

pub mod http;
pub mod memory;

/// Which templates to list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateFilter {
    All,
    Base,
    Modules,
}

/// Body of `POST /api/rule-generations/generate_default_prompt/`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptRequest {
    pub workspace: RecordId,
    pub selected_headers: Vec<String>,
    pub base_prompt_id: Option<RecordId>,
    pub prompt_modules: Vec<RecordId>,
}

/// Body of `POST /api/rule-generations/` and of the feedback variant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub workspace: RecordId,
    pub prompt: String,
    pub prompt_modules: Vec<RecordId>,
    pub base_prompt_id: Option<RecordId>,
    /// Reviewer feedback on a previous rule; routes to the regenerate endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
    /// Generation the feedback refers to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_generation: Option<RecordId>,
}

/// Operations offered by the SpamGenie REST backend
#[async_trait::async_trait]
pub trait SpamGenieApi: Send + Sync {
    /// The signed-in user
    async fn current_user(&self) -> Result<User>;

    /// Workspaces owned by or shared with the current user
    async fn list_workspaces(&self) -> Result<Vec<Workspace>>;

    async fn create_workspace(&self, name: &str, description: &str) -> Result<Workspace>;

    async fn delete_workspace(&self, id: RecordId) -> Result<()>;

    /// Share a workspace, or change the permission of an existing share
    async fn share_workspace(
        &self,
        workspace: RecordId,
        username_or_email: &str,
        permission: Permission,
    ) -> Result<WorkspaceShare>;

    async fn remove_share(&self, workspace: RecordId, user_id: RecordId) -> Result<()>;

    /// Find users to share with by username or email fragment
    async fn search_users(&self, query: &str) -> Result<Vec<UserRef>>;

    /// Every user, or only those with `role`, sorted by username. Admin only.
    async fn list_users(&self, role: Option<Role>) -> Result<Vec<User>>;

    /// Assign `role` to a user. Admin only.
    async fn update_user_role(&self, id: RecordId, role: Role) -> Result<User>;

    async fn upload_sample(&self, workspace: RecordId, file: &CandidateFile)
        -> Result<EmailSample>;

    async fn list_samples(&self, workspace: RecordId) -> Result<Vec<EmailSample>>;

    async fn delete_sample(&self, id: RecordId) -> Result<()>;

    /// Header name → example value across every sample in the workspace
    async fn available_headers(&self, workspace: RecordId) -> Result<HeaderSet>;

    async fn list_templates(&self, filter: TemplateFilter) -> Result<Vec<PromptTemplate>>;

    async fn create_template(&self, template: &NewTemplate) -> Result<PromptTemplate>;

    async fn update_template(&self, id: RecordId, update: &TemplateUpdate)
        -> Result<PromptTemplate>;

    async fn delete_template(&self, id: RecordId) -> Result<()>;

    /// Assemble a prompt from base, modules and the workspace's samples
    async fn generate_default_prompt(&self, request: &PromptRequest) -> Result<AssembledPrompt>;

    /// Start a generation; the returned result is incomplete
    async fn create_generation(&self, request: &GenerationRequest) -> Result<GenerationResult>;

    /// Start a generation that takes reviewer feedback into account
    async fn regenerate_with_feedback(&self, request: &GenerationRequest)
        -> Result<GenerationResult>;

    async fn generation_status(&self, id: RecordId) -> Result<GenerationStatus>;

    /// Generations of a workspace, newest first
    async fn list_generations(&self, workspace: RecordId) -> Result<Vec<GenerationResult>>;
}
