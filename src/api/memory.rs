//! In-memory implementation of [`SpamGenieApi`]
//!
//! A test double: keeps every record in concurrent maps inside the process
//! so the services and the wizard can be exercised without a server. No
//! binary path uses it. It mimics the backend closely enough for that:
//! - headers are derived from the uploaded bytes like the real backend does
//! - prompts are assembled from the stored base and module templates
//! - generations complete after a configurable number of status polls
//!
//! It also counts calls per operation so callers can check how often the
//! backend was hit.
//!
//! ## Limitations
//!
//! - **Not persistent**: data is lost when the process exits
//! - **Single user**: every call is made as the user given at construction

use chrono::Utc;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU32, Ordering};
use std::sync::Arc;

use super::{GenerationRequest, PromptRequest, SpamGenieApi, TemplateFilter};
use crate::models::{
    AssembledPrompt, CandidateFile, EmailSample, GenerationResult, GenerationStatus, HeaderSet,
    NewTemplate, Permission, PromptMetadata, PromptTemplate, RecordId, TemplateKind,
    Role, TemplateSummary, TemplateUpdate, User, UserRef, Workspace, WorkspaceAccess,
    WorkspaceShare,
};
use crate::auth::{Capability, CapabilitySet};
use crate::{Result, SpamGenieError};

#[derive(Debug, Clone)]
struct StoredSample {
    sample: EmailSample,
    headers: HeaderSet,
}

/// In-process stand-in for the SpamGenie backend, for tests
#[derive(Debug, Clone)]
pub struct InMemoryBackend {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    user: User,
    users: DashMap<RecordId, User>,
    workspaces: DashMap<RecordId, Workspace>,
    samples: DashMap<RecordId, StoredSample>,
    templates: DashMap<RecordId, PromptTemplate>,
    generations: DashMap<RecordId, GenerationResult>,
    polls: DashMap<RecordId, u32>,
    calls: DashMap<&'static str, usize>,
    failing_uploads: DashMap<String, ()>,
    fail_status: AtomicBool,
    fail_headers: AtomicBool,
    polls_until_complete: AtomicU32,
    rule: std::sync::RwLock<String>,
    next_id: AtomicI64,
}

impl InMemoryBackend {
    /// Create an empty backend where every call is made as `user`
    pub fn new(user: User) -> Self {
        let users = DashMap::new();
        users.insert(user.id, user.clone());
        Self {
            inner: Arc::new(Inner {
                user,
                users,
                workspaces: DashMap::new(),
                samples: DashMap::new(),
                templates: DashMap::new(),
                generations: DashMap::new(),
                polls: DashMap::new(),
                calls: DashMap::new(),
                failing_uploads: DashMap::new(),
                fail_status: AtomicBool::new(false),
                fail_headers: AtomicBool::new(false),
                polls_until_complete: AtomicU32::new(1),
                rule: std::sync::RwLock::new("score SPAM_GENERATED 1.0".to_string()),
                next_id: AtomicI64::new(1),
            }),
        }
    }

    fn next_id(&self) -> RecordId {
        self.inner.next_id.fetch_add(1, Ordering::SeqCst)
    }

    fn record_call(&self, operation: &'static str) {
        *self.inner.calls.entry(operation).or_insert(0) += 1;
    }

    /// How many times an operation (trait method name) has been called
    pub fn call_count(&self, operation: &str) -> usize {
        self.inner
            .calls
            .iter()
            .find(|entry| *entry.key() == operation)
            .map(|entry| *entry.value())
            .unwrap_or(0)
    }

    /// Total number of calls across all operations
    pub fn total_calls(&self) -> usize {
        self.inner.calls.iter().map(|entry| *entry.value()).sum()
    }

    /// Register another user that workspaces can be shared with
    pub fn add_user(&self, user: User) {
        self.inner.users.insert(user.id, user);
    }

    /// Insert a workspace as-is (e.g. one owned by somebody else and shared)
    pub fn insert_workspace(&self, workspace: Workspace) {
        self.inner.workspaces.insert(workspace.id, workspace);
    }

    /// Insert a template as-is, bypassing validation
    pub fn insert_template(&self, template: PromptTemplate) {
        self.inner.templates.insert(template.id, template);
    }

    /// Insert an existing generation result
    pub fn insert_generation(&self, result: GenerationResult) {
        self.inner.generations.insert(result.id, result);
    }

    /// Generations report complete on the `polls`-th status request (≥1)
    /// with `rule` as their body
    pub fn complete_generations_after(&self, polls: u32, rule: impl Into<String>) {
        self.inner
            .polls_until_complete
            .store(polls.max(1), Ordering::SeqCst);
        if let Ok(mut stored) = self.inner.rule.write() {
            *stored = rule.into();
        }
    }

    /// Make uploads of `filename` fail with a server error
    pub fn fail_upload_of(&self, filename: impl Into<String>) {
        self.inner.failing_uploads.insert(filename.into(), ());
    }

    /// Make every status request fail with a server error
    pub fn fail_status_requests(&self, fail: bool) {
        self.inner.fail_status.store(fail, Ordering::SeqCst);
    }

    /// Make every header request fail with a server error
    pub fn fail_header_requests(&self, fail: bool) {
        self.inner.fail_headers.store(fail, Ordering::SeqCst);
    }

    fn require_admin(&self) -> Result<()> {
        if !CapabilitySet::for_role(self.inner.user.role).has(Capability::ManageUsers) {
            return Err(SpamGenieError::Forbidden(
                "You do not have permission to perform this action.".to_string(),
            ));
        }
        Ok(())
    }

    fn access(&self, workspace: &Workspace) -> Option<WorkspaceAccess> {
        workspace.access_for(&self.inner.user)
    }

    fn workspace(&self, id: RecordId) -> Result<Workspace> {
        let workspace = self
            .inner
            .workspaces
            .get(&id)
            .map(|w| w.clone())
            .ok_or_else(|| SpamGenieError::NotFound(format!("workspace {}", id)))?;
        if self.access(&workspace).is_none() {
            return Err(SpamGenieError::NotFound(format!("workspace {}", id)));
        }
        Ok(workspace)
    }

    fn writable_workspace(&self, id: RecordId) -> Result<Workspace> {
        let workspace = self.workspace(id)?;
        match self.access(&workspace) {
            Some(access) if !access.is_read_only() => Ok(workspace),
            _ => Err(SpamGenieError::Forbidden(format!(
                "No write access to workspace '{}'",
                workspace.name
            ))),
        }
    }

    fn owned_workspace(&self, id: RecordId) -> Result<Workspace> {
        let workspace = self.workspace(id)?;
        if self.access(&workspace) != Some(WorkspaceAccess::Owner) {
            return Err(SpamGenieError::Forbidden(
                "Only the owner can do this".to_string(),
            ));
        }
        Ok(workspace)
    }

    fn workspace_headers(&self, workspace: RecordId) -> HeaderSet {
        let mut samples: Vec<StoredSample> = self
            .inner
            .samples
            .iter()
            .filter(|entry| entry.sample.workspace == workspace)
            .map(|entry| entry.value().clone())
            .collect();
        samples.sort_by_key(|stored| stored.sample.id);

        let mut headers = HeaderSet::new();
        for stored in samples {
            for (name, example) in stored.headers.iter() {
                headers.insert(name, example);
            }
        }
        headers
    }
}

/// Parse the header block of a raw RFC 822 message: name → first value.
/// Folded continuation lines are skipped.
pub fn parse_headers(raw: &[u8]) -> HeaderSet {
    let text = String::from_utf8_lossy(raw);
    let mut headers = HeaderSet::new();
    for line in text.lines() {
        let line = line.trim_end_matches('\r');
        if line.is_empty() {
            break;
        }
        if line.starts_with(' ') || line.starts_with('\t') {
            continue;
        }
        if let Some((name, value)) = line.split_once(':') {
            let name = name.trim();
            if !name.is_empty() && !name.contains(' ') {
                headers.insert(name, value.trim());
            }
        }
    }
    headers
}

#[async_trait::async_trait]
impl SpamGenieApi for InMemoryBackend {
    async fn current_user(&self) -> Result<User> {
        self.record_call("current_user");
        Ok(self.inner.user.clone())
    }

    async fn list_workspaces(&self) -> Result<Vec<Workspace>> {
        self.record_call("list_workspaces");
        let mut workspaces: Vec<Workspace> = self
            .inner
            .workspaces
            .iter()
            .filter(|entry| self.access(entry.value()).is_some())
            .map(|entry| entry.value().clone())
            .collect();
        workspaces.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(workspaces)
    }

    async fn create_workspace(&self, name: &str, description: &str) -> Result<Workspace> {
        self.record_call("create_workspace");
        let name = Workspace::validate_name(name)?;
        let duplicate = self
            .inner
            .workspaces
            .iter()
            .any(|entry| entry.owner.id == self.inner.user.id && entry.name == name);
        if duplicate {
            return Err(SpamGenieError::Server {
                status: 400,
                message: format!("A workspace named '{}' already exists", name),
            });
        }

        let workspace = Workspace {
            id: self.next_id(),
            name,
            owner: self.inner.user.to_ref(),
            description: description.to_string(),
            created_at: Utc::now(),
            shares: Vec::new(),
        };
        self.inner.workspaces.insert(workspace.id, workspace.clone());
        Ok(workspace)
    }

    async fn delete_workspace(&self, id: RecordId) -> Result<()> {
        self.record_call("delete_workspace");
        self.owned_workspace(id)?;
        self.inner.workspaces.remove(&id);
        self.inner.samples.retain(|_, stored| stored.sample.workspace != id);
        self.inner.generations.retain(|_, result| result.workspace != id);
        Ok(())
    }

    async fn share_workspace(
        &self,
        workspace: RecordId,
        username_or_email: &str,
        permission: Permission,
    ) -> Result<WorkspaceShare> {
        self.record_call("share_workspace");
        self.owned_workspace(workspace)?;

        let target = self
            .inner
            .users
            .iter()
            .find(|entry| {
                if username_or_email.contains('@') {
                    entry.email == username_or_email
                } else {
                    entry.username == username_or_email
                }
            })
            .map(|entry| entry.value().clone())
            .ok_or_else(|| SpamGenieError::NotFound("User not found".to_string()))?;

        if target.id == self.inner.user.id {
            return Err(SpamGenieError::Server {
                status: 400,
                message: "You cannot share a workspace with yourself".to_string(),
            });
        }

        let share = WorkspaceShare {
            user_id: target.id,
            username: target.username.clone(),
            email: target.email.clone(),
            permission,
        };

        if let Some(mut stored) = self.inner.workspaces.get_mut(&workspace) {
            match stored.shares.iter_mut().find(|s| s.user_id == target.id) {
                Some(existing) => existing.permission = permission,
                None => stored.shares.push(share.clone()),
            }
        }
        Ok(share)
    }

    async fn remove_share(&self, workspace: RecordId, user_id: RecordId) -> Result<()> {
        self.record_call("remove_share");
        self.owned_workspace(workspace)?;
        let mut stored = self
            .inner
            .workspaces
            .get_mut(&workspace)
            .ok_or_else(|| SpamGenieError::NotFound(format!("workspace {}", workspace)))?;
        let before = stored.shares.len();
        stored.shares.retain(|share| share.user_id != user_id);
        if stored.shares.len() == before {
            return Err(SpamGenieError::NotFound("Share not found".to_string()));
        }
        Ok(())
    }

    async fn search_users(&self, query: &str) -> Result<Vec<UserRef>> {
        self.record_call("search_users");
        let needle = query.to_lowercase();
        let mut found: Vec<UserRef> = self
            .inner
            .users
            .iter()
            .filter(|entry| entry.id != self.inner.user.id)
            .filter(|entry| {
                entry.username.to_lowercase().contains(&needle)
                    || entry.email.to_lowercase().contains(&needle)
            })
            .map(|entry| entry.to_ref())
            .collect();
        found.sort_by(|a, b| a.username.cmp(&b.username));
        found.truncate(10);
        Ok(found)
    }

    async fn list_users(&self, role: Option<Role>) -> Result<Vec<User>> {
        self.record_call("list_users");
        self.require_admin()?;
        let mut users: Vec<User> = self
            .inner
            .users
            .iter()
            .filter(|entry| role.map_or(true, |role| entry.role == role))
            .map(|entry| entry.value().clone())
            .collect();
        users.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(users)
    }

    async fn update_user_role(&self, id: RecordId, role: Role) -> Result<User> {
        self.record_call("update_user_role");
        self.require_admin()?;
        let mut user = self
            .inner
            .users
            .get_mut(&id)
            .ok_or_else(|| SpamGenieError::NotFound(format!("user {}", id)))?;
        user.role = role;
        Ok(user.clone())
    }

    async fn upload_sample(
        &self,
        workspace: RecordId,
        file: &CandidateFile,
    ) -> Result<EmailSample> {
        self.record_call("upload_sample");
        self.writable_workspace(workspace)?;

        if self.inner.failing_uploads.contains_key(&file.filename) {
            return Err(SpamGenieError::Server {
                status: 500,
                message: format!("Failed to store {}", file.filename),
            });
        }
        if !file.has_extension(".eml") {
            return Err(SpamGenieError::Server {
                status: 400,
                message: "Only .eml files are supported.".to_string(),
            });
        }

        let sample = EmailSample {
            id: self.next_id(),
            original_filename: file.filename.clone(),
            workspace,
            uploaded_at: Utc::now(),
        };
        self.inner.samples.insert(
            sample.id,
            StoredSample {
                sample: sample.clone(),
                headers: parse_headers(&file.content),
            },
        );
        Ok(sample)
    }

    async fn list_samples(&self, workspace: RecordId) -> Result<Vec<EmailSample>> {
        self.record_call("list_samples");
        self.workspace(workspace)?;
        let mut samples: Vec<EmailSample> = self
            .inner
            .samples
            .iter()
            .filter(|entry| entry.sample.workspace == workspace)
            .map(|entry| entry.sample.clone())
            .collect();
        samples.sort_by_key(|sample| sample.id);
        Ok(samples)
    }

    async fn delete_sample(&self, id: RecordId) -> Result<()> {
        self.record_call("delete_sample");
        let workspace = self
            .inner
            .samples
            .get(&id)
            .map(|stored| stored.sample.workspace)
            .ok_or_else(|| SpamGenieError::NotFound(format!("email file {}", id)))?;
        self.writable_workspace(workspace)?;
        self.inner.samples.remove(&id);
        Ok(())
    }

    async fn available_headers(&self, workspace: RecordId) -> Result<HeaderSet> {
        self.record_call("available_headers");
        self.workspace(workspace)?;
        if self.inner.fail_headers.load(Ordering::SeqCst) {
            return Err(SpamGenieError::Server {
                status: 503,
                message: "Header service unavailable".to_string(),
            });
        }
        Ok(self.workspace_headers(workspace))
    }

    async fn list_templates(&self, filter: TemplateFilter) -> Result<Vec<PromptTemplate>> {
        self.record_call("list_templates");
        let mut templates: Vec<PromptTemplate> = self
            .inner
            .templates
            .iter()
            .filter(|entry| match filter {
                TemplateFilter::All => true,
                TemplateFilter::Base => entry.kind.is_base(),
                TemplateFilter::Modules => entry.kind.is_module(),
            })
            .map(|entry| entry.value().clone())
            .collect();
        templates.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(templates)
    }

    async fn create_template(&self, template: &NewTemplate) -> Result<PromptTemplate> {
        self.record_call("create_template");
        template.validate()?;
        if self
            .inner
            .templates
            .iter()
            .any(|entry| entry.name == template.name.trim())
        {
            return Err(SpamGenieError::Server {
                status: 400,
                message: "prompt template with this name already exists.".to_string(),
            });
        }

        let now = Utc::now();
        let created = PromptTemplate {
            id: self.next_id(),
            name: template.name.trim().to_string(),
            description: template.description.clone(),
            body: template.body.clone(),
            kind: template.kind.clone(),
            visibility: template.visibility,
            created_by: Some(self.inner.user.id),
            workspace: template.workspace,
            created_at: Some(now),
            updated_at: Some(now),
        };
        self.inner.templates.insert(created.id, created.clone());
        Ok(created)
    }

    async fn update_template(
        &self,
        id: RecordId,
        update: &TemplateUpdate,
    ) -> Result<PromptTemplate> {
        self.record_call("update_template");
        let mut stored = self
            .inner
            .templates
            .get_mut(&id)
            .ok_or_else(|| SpamGenieError::NotFound(format!("prompt template {}", id)))?;
        if let Some(name) = &update.name {
            stored.name = name.clone();
        }
        if let Some(description) = &update.description {
            stored.description = description.clone();
        }
        if let Some(body) = &update.body {
            stored.body = body.clone();
        }
        if let Some(visibility) = update.visibility {
            stored.visibility = visibility;
        }
        stored.updated_at = Some(Utc::now());
        Ok(stored.clone())
    }

    async fn delete_template(&self, id: RecordId) -> Result<()> {
        self.record_call("delete_template");
        self.inner
            .templates
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| SpamGenieError::NotFound(format!("prompt template {}", id)))
    }

    async fn generate_default_prompt(&self, request: &PromptRequest) -> Result<AssembledPrompt> {
        self.record_call("generate_default_prompt");
        self.workspace(request.workspace)?;

        let base = match request.base_prompt_id {
            Some(id) => self
                .inner
                .templates
                .get(&id)
                .filter(|t| t.kind.is_base())
                .map(|t| t.clone()),
            None => {
                let mut bases: Vec<PromptTemplate> = self
                    .inner
                    .templates
                    .iter()
                    .filter(|t| t.kind.is_base())
                    .map(|t| t.value().clone())
                    .collect();
                bases.sort_by(|a, b| a.name.cmp(&b.name));
                bases.into_iter().next()
            }
        };
        let base = base.ok_or_else(|| {
            SpamGenieError::NotFound("No base prompt template found".to_string())
        })?;

        let headers = self.workspace_headers(request.workspace);
        let sample_count = self
            .inner
            .samples
            .iter()
            .filter(|entry| entry.sample.workspace == request.workspace)
            .count();

        let mut prompt = String::from("## Email Headers\n");
        for name in &request.selected_headers {
            if let Some(example) = headers.example(name) {
                prompt.push_str(&format!("{}: {}\n", name, example));
            }
        }
        prompt.push_str("\n\n");
        prompt.push_str(&base.body);

        let mut modules = Vec::new();
        for module_id in &request.prompt_modules {
            let module = self.inner.templates.get(module_id).map(|m| m.clone());
            if let Some(module) = module.filter(|m| m.kind.is_module()) {
                prompt.push_str("\n\n");
                prompt.push_str(&module.body);
                let module_type = match &module.kind {
                    TemplateKind::Module { module_type } => Some(module_type.clone()),
                    _ => None,
                };
                modules.push(TemplateSummary {
                    id: Some(module.id),
                    name: module.name.clone(),
                    module_type,
                });
            }
        }

        Ok(AssembledPrompt {
            prompt,
            metadata: PromptMetadata {
                base_prompt: Some(TemplateSummary {
                    id: Some(base.id),
                    name: base.name.clone(),
                    module_type: None,
                }),
                modules,
                email_sample_count: sample_count,
            },
        })
    }

    async fn create_generation(&self, request: &GenerationRequest) -> Result<GenerationResult> {
        self.record_call("create_generation");
        self.writable_workspace(request.workspace)?;
        if request.prompt.trim().is_empty() {
            return Err(SpamGenieError::Server {
                status: 400,
                message: "prompt: This field may not be blank.".to_string(),
            });
        }

        let result = GenerationResult {
            id: self.next_id(),
            workspace: request.workspace,
            prompt: request.prompt.clone(),
            module_ids: request.prompt_modules.clone(),
            base_prompt_id: request.base_prompt_id,
            is_complete: false,
            rule: None,
            created_at: Utc::now(),
        };
        self.inner.generations.insert(result.id, result.clone());
        Ok(result)
    }

    async fn regenerate_with_feedback(
        &self,
        request: &GenerationRequest,
    ) -> Result<GenerationResult> {
        self.record_call("regenerate_with_feedback");
        let feedback = request.feedback.as_deref().unwrap_or("").trim();
        if feedback.is_empty() {
            return Err(SpamGenieError::Server {
                status: 400,
                message: "feedback is required".to_string(),
            });
        }
        self.writable_workspace(request.workspace)?;

        let result = GenerationResult {
            id: self.next_id(),
            workspace: request.workspace,
            prompt: format!("{}\n\n## Reviewer Feedback\n{}", request.prompt, feedback),
            module_ids: request.prompt_modules.clone(),
            base_prompt_id: request.base_prompt_id,
            is_complete: false,
            rule: None,
            created_at: Utc::now(),
        };
        self.inner.generations.insert(result.id, result.clone());
        Ok(result)
    }

    async fn generation_status(&self, id: RecordId) -> Result<GenerationStatus> {
        self.record_call("generation_status");
        if self.inner.fail_status.load(Ordering::SeqCst) {
            return Err(SpamGenieError::Server {
                status: 503,
                message: "Status temporarily unavailable".to_string(),
            });
        }

        let polls = {
            let mut count = self.inner.polls.entry(id).or_insert(0);
            *count += 1;
            *count
        };
        let mut result = self
            .inner
            .generations
            .get_mut(&id)
            .ok_or_else(|| SpamGenieError::NotFound(format!("rule generation {}", id)))?;

        if !result.is_complete
            && polls >= self.inner.polls_until_complete.load(Ordering::SeqCst)
        {
            result.is_complete = true;
            result.rule = self.inner.rule.read().ok().map(|rule| rule.clone());
        }

        Ok(GenerationStatus {
            id,
            is_complete: result.is_complete,
            rule: if result.is_complete {
                result.rule.clone()
            } else {
                None
            },
        })
    }

    async fn list_generations(&self, workspace: RecordId) -> Result<Vec<GenerationResult>> {
        self.record_call("list_generations");
        self.workspace(workspace)?;
        let mut results: Vec<GenerationResult> = self
            .inner
            .generations
            .iter()
            .filter(|entry| entry.workspace == workspace)
            .map(|entry| entry.value().clone())
            .collect();
        results.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;

    fn user(id: RecordId, name: &str) -> User {
        User {
            id,
            username: name.to_string(),
            email: format!("{}@example.com", name),
            role: Role::Normal,
        }
    }

    #[test]
    fn test_parse_headers_stops_at_body() {
        let raw = b"From: spammer@example.com\r\nSubject: You won\r\n\tcontinued\r\nX-Mailer: bulk\r\n\r\nSubject: not a header\r\n";
        let headers = parse_headers(raw);
        assert_eq!(headers.len(), 3);
        assert_eq!(headers.example("Subject"), Some("You won"));
        assert_eq!(headers.example("X-Mailer"), Some("bulk"));
    }

    #[test]
    fn test_parse_headers_keeps_first_repeat() {
        let raw = b"Received: from a\nReceived: from b\n\nbody";
        assert_eq!(parse_headers(raw).example("Received"), Some("from a"));
    }

    #[tokio::test]
    async fn test_headers_follow_samples() {
        let backend = InMemoryBackend::new(user(1, "owner"));
        let workspace = backend.create_workspace("wave", "").await.unwrap();

        let first = backend
            .upload_sample(workspace.id, &CandidateFile::new("a.eml", "From: a\n\nx"))
            .await
            .unwrap();
        backend
            .upload_sample(workspace.id, &CandidateFile::new("b.eml", "Subject: b\n\nx"))
            .await
            .unwrap();
        assert_eq!(backend.available_headers(workspace.id).await.unwrap().len(), 2);

        backend.delete_sample(first.id).await.unwrap();
        let headers = backend.available_headers(workspace.id).await.unwrap();
        assert_eq!(headers.names().collect::<Vec<_>>(), vec!["Subject"]);
        assert_eq!(backend.call_count("available_headers"), 2);
    }

    #[tokio::test]
    async fn test_sharing_round() {
        let backend = InMemoryBackend::new(user(1, "owner"));
        backend.add_user(user(2, "friend"));
        let workspace = backend.create_workspace("wave", "").await.unwrap();

        let share = backend
            .share_workspace(workspace.id, "friend", Permission::Read)
            .await
            .unwrap();
        assert_eq!(share.user_id, 2);

        let upgraded = backend
            .share_workspace(workspace.id, "friend@example.com", Permission::Write)
            .await
            .unwrap();
        assert_eq!(upgraded.permission, Permission::Write);
        let workspaces = backend.list_workspaces().await.unwrap();
        assert_eq!(workspaces[0].shares.len(), 1);
        assert_eq!(workspaces[0].shares[0].permission, Permission::Write);

        backend.remove_share(workspace.id, 2).await.unwrap();
        assert!(backend.remove_share(workspace.id, 2).await.is_err());
        assert!(backend
            .share_workspace(workspace.id, "owner", Permission::Read)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_generation_completes_after_configured_polls() {
        let backend = InMemoryBackend::new(user(1, "owner"));
        backend.complete_generations_after(2, "score TEST 1.0");
        let workspace = backend.create_workspace("wave", "").await.unwrap();

        let created = backend
            .create_generation(&GenerationRequest {
                workspace: workspace.id,
                prompt: "rules please".into(),
                prompt_modules: vec![],
                base_prompt_id: None,
                feedback: None,
                previous_generation: None,
            })
            .await
            .unwrap();

        let first = backend.generation_status(created.id).await.unwrap();
        assert!(!first.is_complete);
        assert!(first.rule.is_none());

        let second = backend.generation_status(created.id).await.unwrap();
        assert!(second.is_complete);
        assert_eq!(second.rule.as_deref(), Some("score TEST 1.0"));
    }
}
