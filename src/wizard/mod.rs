// Rule generation wizard for SpamGenie
// Upload samples, pick headers, assemble a prompt, generate a rule

//! # Rule Generation Wizard
//!
//! [`Wizard`] owns the transient state of one pass through the four steps
//! for one workspace and wires the components together:
//!
//! - [`upload::UploadCoordinator`]: sequential batch uploads
//! - [`headers::HeaderResolver`]: derived header map and selection
//! - [`prompt::PromptAssembler`]: base + modules → assembled prompt
//! - [`poller::GenerationPoller`]: submission and status polling
//! - [`step::StepController`]: which step is active and which are reachable
//!
//! Mutating operations are refused in read-only shared workspaces. Leaving
//! the rule step, or dropping the wizard, cancels an outstanding poll.

pub mod headers;
pub mod poller;
pub mod prompt;
pub mod step;
pub mod upload;


use std::sync::Arc;
use std::time::Duration;

use crate::api::SpamGenieApi;
use crate::models::{
    AssembledPrompt, CandidateFile, EmailSample, GenerationResult, PromptTemplate, RecordId,
    Workspace, WorkspaceAccess,
};
use crate::services::templates::TemplateService;
use crate::settings::Settings;
use crate::{Result, SpamGenieError};

use headers::HeaderResolver;
use poller::{GenerationPoller, PollHandle, DEFAULT_POLL_INTERVAL};
use prompt::PromptAssembler;
use step::{Progress, Step, StepController};
use upload::{UploadCoordinator, UploadProgress, UploadReport};

/// Knobs the wizard takes from configuration
#[derive(Debug, Clone)]
pub struct WizardOptions {
    pub poll_interval: Duration,
    pub accepted_extension: String,
}

impl Default for WizardOptions {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            accepted_extension: ".eml".to_string(),
        }
    }
}

impl From<&Settings> for WizardOptions {
    fn from(settings: &Settings) -> Self {
        Self {
            poll_interval: settings.poll_interval(),
            accepted_extension: settings.accepted_extension.clone(),
        }
    }
}

pub struct Wizard {
    workspace: Workspace,
    access: WorkspaceAccess,
    steps: StepController,
    samples: Vec<EmailSample>,
    uploads: UploadCoordinator,
    headers: HeaderResolver,
    prompt: PromptAssembler,
    poller: GenerationPoller,
}

impl Wizard {
    /// Open the wizard on `workspace`, loading its samples and stored results.
    ///
    /// A freshly created workspace has neither, so both requests are skipped
    /// when `is_new` is set.
    pub async fn open(
        api: Arc<dyn SpamGenieApi>,
        workspace: Workspace,
        access: WorkspaceAccess,
        options: WizardOptions,
        is_new: bool,
    ) -> Result<Self> {
        let read_only = access.is_read_only();
        let mut wizard = Self {
            steps: StepController::new(read_only),
            samples: Vec::new(),
            uploads: UploadCoordinator::new(Arc::clone(&api), options.accepted_extension),
            headers: HeaderResolver::new(Arc::clone(&api), workspace.id),
            prompt: PromptAssembler::new(Arc::clone(&api), workspace.id),
            poller: GenerationPoller::new(Arc::clone(&api), workspace.id, workspace.name.clone(), read_only)
                .with_interval(options.poll_interval),
            workspace,
            access,
        };

        if !is_new {
            wizard.samples = api.list_samples(wizard.workspace.id).await?;
            wizard.poller.load_results().await?;
            if !read_only {
                wizard.headers.refresh(&wizard.samples).await?;
            }
        }

        tracing::info!(
            "Opened wizard on '{}' ({} sample(s), {} result(s){})",
            wizard.workspace.name,
            wizard.samples.len(),
            wizard.poller.result_count(),
            if read_only { ", read-only" } else { "" }
        );
        Ok(wizard)
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    pub fn access(&self) -> WorkspaceAccess {
        self.access
    }

    pub fn is_read_only(&self) -> bool {
        self.access.is_read_only()
    }

    fn ensure_writable(&self) -> Result<()> {
        if self.is_read_only() {
            return Err(SpamGenieError::ReadOnly {
                workspace: self.workspace.name.clone(),
            });
        }
        Ok(())
    }

    // Navigation

    pub fn progress(&self) -> Progress {
        Progress {
            samples: self.samples.len(),
            available_headers: self.headers.available().len(),
            selected_headers: self.headers.selected_count(),
            prompt_generated: self.prompt.generated_in_session(),
            prior_results: self.poller.result_count(),
            read_only: self.is_read_only(),
        }
    }

    pub fn current_step(&self) -> Step {
        self.steps.current()
    }

    pub fn can_access(&self, step: Step) -> bool {
        self.steps.can_access(step, &self.progress())
    }

    pub fn reachable_steps(&self) -> Vec<Step> {
        self.steps.reachable(&self.progress())
    }

    /// Move to `step` if reachable; returns whether the step changed.
    /// Leaving the rule step cancels an outstanding poll.
    pub fn go_to(&mut self, step: Step) -> bool {
        let leaving_rule = self.steps.current() == Step::Rule;
        let progress = self.progress();
        let moved = self.steps.go_to(step, &progress);
        if moved && leaving_rule {
            self.poller.cancel();
        }
        moved
    }

    // Step 1: samples

    pub fn samples(&self) -> &[EmailSample] {
        &self.samples
    }

    /// Upload a batch. Headers are re-resolved once if anything was stored.
    ///
    /// Once files are stored the report is always returned; a failed header
    /// fetch lands in [`UploadReport::header_error`].
    pub async fn upload<F>(&mut self, files: Vec<CandidateFile>, on_progress: F) -> Result<UploadReport>
    where
        F: FnMut(&UploadProgress),
    {
        self.ensure_writable()?;
        let mut report = self
            .uploads
            .upload(self.workspace.id, files, on_progress)
            .await;
        if !report.uploaded.is_empty() {
            self.samples.extend(report.uploaded.iter().cloned());
            if let Err(error) = self.refresh_headers().await {
                tracing::warn!("Header refresh after upload failed: {}", error);
                report.header_error = Some(error);
            }
        }
        Ok(report)
    }

    /// Retry header resolution for the current samples. A no-op when the
    /// headers already match the sample set.
    pub async fn refresh_headers_now(&mut self) -> Result<()> {
        self.ensure_writable()?;
        self.refresh_headers().await
    }

    pub async fn delete_sample(&mut self, id: RecordId) -> Result<()> {
        self.ensure_writable()?;
        if !self.samples.iter().any(|s| s.id == id) {
            return Err(SpamGenieError::NotFound(format!("email file {}", id)));
        }
        self.uploads.delete(id).await?;
        self.samples.retain(|s| s.id != id);
        self.refresh_headers().await
    }

    async fn refresh_headers(&mut self) -> Result<()> {
        let before = self.headers.selected();
        self.headers.refresh(&self.samples).await?;
        if self.headers.selected() != before {
            self.prompt.headers_changed();
        }
        Ok(())
    }

    // Step 2: headers

    pub fn headers(&self) -> &HeaderResolver {
        &self.headers
    }

    pub fn select_header(&mut self, name: &str) -> Result<()> {
        self.ensure_writable()?;
        self.headers.select(name)?;
        self.prompt.headers_changed();
        Ok(())
    }

    pub fn toggle_header(&mut self, name: &str) -> Result<bool> {
        self.ensure_writable()?;
        let selected = self.headers.toggle(name)?;
        self.prompt.headers_changed();
        Ok(selected)
    }

    pub fn select_all_headers(&mut self) -> Result<()> {
        self.ensure_writable()?;
        self.headers.select_all();
        self.prompt.headers_changed();
        Ok(())
    }

    pub fn clear_headers(&mut self) -> Result<()> {
        self.ensure_writable()?;
        self.headers.clear();
        self.prompt.headers_changed();
        Ok(())
    }

    pub fn select_common_headers(&mut self) -> Result<usize> {
        self.ensure_writable()?;
        let added = self.headers.select_common();
        if added > 0 {
            self.prompt.headers_changed();
        }
        Ok(added)
    }

    // Step 3: prompt

    pub fn prompt(&self) -> &PromptAssembler {
        &self.prompt
    }

    /// Load the base and module templates visible to the caller
    pub async fn load_templates(&mut self, templates: &TemplateService) -> Result<()> {
        let bases = templates.base_templates().await?;
        let modules = templates.module_templates().await?;
        self.set_templates(bases, modules);
        Ok(())
    }

    pub fn set_templates(&mut self, bases: Vec<PromptTemplate>, modules: Vec<PromptTemplate>) {
        self.prompt.set_templates(bases, modules);
    }

    pub fn select_base(&mut self, id: RecordId) -> Result<()> {
        self.ensure_writable()?;
        self.prompt.select_base(id)
    }

    pub fn toggle_module(&mut self, id: RecordId) -> Result<bool> {
        self.ensure_writable()?;
        self.prompt.toggle_module(id)
    }

    pub fn set_prompt_override(&mut self, text: impl Into<String>) -> Result<()> {
        self.ensure_writable()?;
        self.prompt.set_override(text);
        Ok(())
    }

    pub fn clear_prompt_override(&mut self) {
        self.prompt.clear_override();
    }

    pub async fn generate_prompt(&mut self) -> Result<AssembledPrompt> {
        self.ensure_writable()?;
        let selected = self.headers.require_selection()?;
        Ok(self.prompt.generate(&selected).await?.clone())
    }

    // Step 4: rule

    /// Submit the current prompt for generation and start polling.
    /// `feedback` asks for a revision of the newest rule.
    pub async fn submit(&mut self, feedback: Option<String>) -> Result<PollHandle> {
        self.ensure_writable()?;
        let text = self.prompt.submission_text()?;
        self.poller
            .submit(
                text,
                self.prompt.module_ids().to_vec(),
                self.prompt.base_id(),
                feedback,
            )
            .await
    }

    pub fn is_polling(&self) -> bool {
        self.poller.is_polling()
    }

    pub fn cancel_poll(&mut self) {
        self.poller.cancel();
    }

    /// Results for the workspace, newest first
    pub async fn results(&self) -> Vec<GenerationResult> {
        self.poller.results().await
    }

    pub async fn last_error(&self) -> Option<String> {
        self.poller.last_error().await
    }

    /// Reload stored results from the backend
    pub async fn reload_results(&mut self) -> Result<usize> {
        self.poller.load_results().await
    }
}

impl Drop for Wizard {
    fn drop(&mut self) {
        self.poller.cancel();
    }
}
