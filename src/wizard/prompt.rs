//! # Prompt Assembler
//!
//! Holds the chosen base template, the ordered module selection and the
//! most recently assembled prompt. Any change to headers, base or modules
//! marks the assembled prompt stale; a user-supplied override survives
//! such changes until it is cleared.

use std::sync::Arc;

use crate::api::{PromptRequest, SpamGenieApi};
use crate::models::{AssembledPrompt, PromptTemplate, RecordId};
use crate::{Result, SpamGenieError};

pub struct PromptAssembler {
    api: Arc<dyn SpamGenieApi>,
    workspace: RecordId,
    bases: Vec<PromptTemplate>,
    modules: Vec<PromptTemplate>,
    base_id: Option<RecordId>,
    module_ids: Vec<RecordId>,
    assembled: Option<AssembledPrompt>,
    stale: bool,
    override_text: Option<String>,
    generated_in_session: bool,
}

impl PromptAssembler {
    pub fn new(api: Arc<dyn SpamGenieApi>, workspace: RecordId) -> Self {
        Self {
            api,
            workspace,
            bases: Vec::new(),
            modules: Vec::new(),
            base_id: None,
            module_ids: Vec::new(),
            assembled: None,
            stale: false,
            override_text: None,
            generated_in_session: false,
        }
    }

    /// Offer these templates for selection. Without a current base choice,
    /// the first base by name becomes the default. Selections that are no
    /// longer offered are dropped.
    pub fn set_templates(&mut self, mut bases: Vec<PromptTemplate>, mut modules: Vec<PromptTemplate>) {
        bases.sort_by(|a, b| a.name.cmp(&b.name));
        modules.sort_by(|a, b| a.name.cmp(&b.name));

        if let Some(id) = self.base_id {
            if !bases.iter().any(|t| t.id == id) {
                self.base_id = None;
                self.mark_stale();
            }
        }
        if self.base_id.is_none() {
            self.base_id = bases.first().map(|t| t.id);
        }

        let before = self.module_ids.len();
        self.module_ids.retain(|id| modules.iter().any(|t| t.id == *id));
        if self.module_ids.len() != before {
            self.mark_stale();
        }

        self.bases = bases;
        self.modules = modules;
    }

    pub fn bases(&self) -> &[PromptTemplate] {
        &self.bases
    }

    pub fn modules(&self) -> &[PromptTemplate] {
        &self.modules
    }

    pub fn base_id(&self) -> Option<RecordId> {
        self.base_id
    }

    pub fn base(&self) -> Option<&PromptTemplate> {
        self.base_id
            .and_then(|id| self.bases.iter().find(|t| t.id == id))
    }

    /// Selected module ids in the order they were chosen
    pub fn module_ids(&self) -> &[RecordId] {
        &self.module_ids
    }

    pub fn select_base(&mut self, id: RecordId) -> Result<()> {
        if !self.bases.iter().any(|t| t.id == id) {
            return Err(SpamGenieError::NotFound(format!("base prompt {}", id)));
        }
        if self.base_id != Some(id) {
            self.base_id = Some(id);
            self.mark_stale();
        }
        Ok(())
    }

    /// Add or remove a module; returns whether it is now selected
    pub fn toggle_module(&mut self, id: RecordId) -> Result<bool> {
        if let Some(pos) = self.module_ids.iter().position(|m| *m == id) {
            self.module_ids.remove(pos);
            self.mark_stale();
            return Ok(false);
        }
        if !self.modules.iter().any(|t| t.id == id) {
            return Err(SpamGenieError::NotFound(format!("prompt module {}", id)));
        }
        self.module_ids.push(id);
        self.mark_stale();
        Ok(true)
    }

    /// The header selection changed
    pub fn headers_changed(&mut self) {
        self.mark_stale();
    }

    fn mark_stale(&mut self) {
        if self.assembled.is_some() {
            self.stale = true;
        }
    }

    pub fn is_stale(&self) -> bool {
        self.stale
    }

    pub fn assembled(&self) -> Option<&AssembledPrompt> {
        self.assembled.as_ref()
    }

    /// Whether a prompt has been assembled during this session
    pub fn generated_in_session(&self) -> bool {
        self.generated_in_session
    }

    /// Ask the backend to assemble the prompt for `selected_headers`
    pub async fn generate(&mut self, selected_headers: &[String]) -> Result<&AssembledPrompt> {
        if selected_headers.is_empty() {
            return Err(SpamGenieError::Validation(
                "Select at least one header before generating a prompt".to_string(),
            ));
        }

        let request = PromptRequest {
            workspace: self.workspace,
            selected_headers: selected_headers.to_vec(),
            base_prompt_id: self.base_id,
            prompt_modules: self.module_ids.clone(),
        };
        let assembled = self.api.generate_default_prompt(&request).await?;
        tracing::info!(
            "Assembled prompt from {} header(s) and {} module(s) over {} sample(s)",
            request.selected_headers.len(),
            assembled.metadata.modules.len(),
            assembled.metadata.email_sample_count
        );

        self.stale = false;
        self.generated_in_session = true;
        Ok(self.assembled.insert(assembled))
    }

    pub fn set_override(&mut self, text: impl Into<String>) {
        let text = text.into();
        self.override_text = if text.trim().is_empty() { None } else { Some(text) };
    }

    pub fn clear_override(&mut self) {
        self.override_text = None;
    }

    pub fn override_text(&self) -> Option<&str> {
        self.override_text.as_deref()
    }

    /// The text to submit: the override if set, otherwise the assembled
    /// prompt as long as it is not stale
    pub fn submission_text(&self) -> Result<String> {
        if let Some(text) = &self.override_text {
            return Ok(text.clone());
        }
        match &self.assembled {
            Some(_) if self.stale => Err(SpamGenieError::Validation(
                "The prompt is out of date, generate it again".to_string(),
            )),
            Some(assembled) => Ok(assembled.prompt.clone()),
            None => Err(SpamGenieError::Validation(
                "Generate a prompt first".to_string(),
            )),
        }
    }
}
