//! # Header Resolver
//!
//! Keeps the header map derived from a workspace's samples and the user's
//! header selection. The map is refetched only when the set of sample ids
//! changes, so adding or deleting a sample costs exactly one request and
//! re-rendering the step costs none.

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::api::SpamGenieApi;
use crate::models::{EmailSample, HeaderSet, RecordId};
use crate::{Result, SpamGenieError};

/// Headers that usually matter for spam rules, used by "select common"
pub const COMMON_HEADERS: &[&str] = &[
    "From",
    "To",
    "Subject",
    "Reply-To",
    "Return-Path",
    "Received",
    "Message-ID",
    "Date",
    "Content-Type",
    "X-Mailer",
    "List-Unsubscribe",
    "Authentication-Results",
    "Received-SPF",
    "DKIM-Signature",
];

pub struct HeaderResolver {
    api: Arc<dyn SpamGenieApi>,
    workspace: RecordId,
    available: HeaderSet,
    selected: BTreeSet<String>,
    /// Sample ids the current map was derived from; `None` before the first refresh
    resolved_for: Option<BTreeSet<RecordId>>,
}

impl HeaderResolver {
    pub fn new(api: Arc<dyn SpamGenieApi>, workspace: RecordId) -> Self {
        Self {
            api,
            workspace,
            available: HeaderSet::new(),
            selected: BTreeSet::new(),
            resolved_for: None,
        }
    }

    /// Bring the header map in line with `samples`.
    ///
    /// Returns `true` if the backend was asked. An empty sample set clears
    /// the map locally. Selected headers that disappeared are deselected.
    pub async fn refresh(&mut self, samples: &[EmailSample]) -> Result<bool> {
        let ids: BTreeSet<RecordId> = samples.iter().map(|s| s.id).collect();
        if self.resolved_for.as_ref() == Some(&ids) {
            return Ok(false);
        }

        if ids.is_empty() {
            self.available = HeaderSet::new();
            self.selected.clear();
            self.resolved_for = Some(ids);
            return Ok(false);
        }

        let headers = self.api.available_headers(self.workspace).await?;
        tracing::info!(
            "Resolved {} headers from {} sample(s)",
            headers.len(),
            ids.len()
        );
        self.available = headers;
        self.resolved_for = Some(ids);

        let available = &self.available;
        self.selected.retain(|name| available.contains(name));
        Ok(true)
    }

    pub fn available(&self) -> &HeaderSet {
        &self.available
    }

    /// Selected header names in name order
    pub fn selected(&self) -> Vec<String> {
        self.selected.iter().cloned().collect()
    }

    pub fn selected_count(&self) -> usize {
        self.selected.len()
    }

    pub fn is_selected(&self, name: &str) -> bool {
        self.selected.contains(name)
    }

    pub fn select(&mut self, name: &str) -> Result<()> {
        if !self.available.contains(name) {
            return Err(SpamGenieError::Validation(format!(
                "Header '{}' was not found in the uploaded samples",
                name
            )));
        }
        self.selected.insert(name.to_string());
        Ok(())
    }

    pub fn deselect(&mut self, name: &str) {
        self.selected.remove(name);
    }

    /// Flip one header; returns whether it is now selected
    pub fn toggle(&mut self, name: &str) -> Result<bool> {
        if self.selected.remove(name) {
            return Ok(false);
        }
        self.select(name)?;
        Ok(true)
    }

    pub fn select_all(&mut self) {
        self.selected = self.available.names().map(str::to_string).collect();
    }

    pub fn clear(&mut self) {
        self.selected.clear();
    }

    /// Select the available headers that appear in [`COMMON_HEADERS`]
    /// (names compared case-insensitively). Returns how many were added.
    pub fn select_common(&mut self) -> usize {
        let before = self.selected.len();
        let common: Vec<String> = self
            .available
            .names()
            .filter(|name| COMMON_HEADERS.iter().any(|c| c.eq_ignore_ascii_case(name)))
            .map(str::to_string)
            .collect();
        self.selected.extend(common);
        self.selected.len() - before
    }

    /// The selection, or an error if nothing is selected
    pub fn require_selection(&self) -> Result<Vec<String>> {
        if self.selected.is_empty() {
            return Err(SpamGenieError::Validation(
                "Select at least one header to continue".to_string(),
            ));
        }
        Ok(self.selected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::memory::InMemoryBackend;
    use crate::models::{CandidateFile, Role, User};

    async fn setup() -> (InMemoryBackend, Arc<dyn SpamGenieApi>, RecordId) {
        let backend = InMemoryBackend::new(User {
            id: 1,
            username: "alice".into(),
            email: String::new(),
            role: Role::Normal,
        });
        let api: Arc<dyn SpamGenieApi> = Arc::new(backend.clone());
        let workspace = api.create_workspace("headers", "").await.unwrap();
        (backend, api, workspace.id)
    }

    fn raw(headers: &str) -> CandidateFile {
        CandidateFile::new("s.eml", format!("{}\r\n\r\nbody", headers))
    }

    #[tokio::test]
    async fn test_refetch_only_when_sample_set_changes() {
        let (backend, api, ws) = setup().await;
        let mut resolver = HeaderResolver::new(api.clone(), ws);

        let first = api
            .upload_sample(ws, &raw("From: a@b.c\r\nSubject: hi"))
            .await
            .unwrap();
        let mut samples = vec![first];
        assert!(resolver.refresh(&samples).await.unwrap());
        assert!(!resolver.refresh(&samples).await.unwrap());
        assert_eq!(backend.call_count("available_headers"), 1);

        let second = api
            .upload_sample(ws, &raw("X-Spam-Flag: YES"))
            .await
            .unwrap();
        samples.push(second);
        assert!(resolver.refresh(&samples).await.unwrap());
        assert_eq!(backend.call_count("available_headers"), 2);
        assert_eq!(resolver.available().len(), 3);
    }

    #[tokio::test]
    async fn test_empty_samples_clear_without_call() {
        let (backend, api, ws) = setup().await;
        let mut resolver = HeaderResolver::new(api.clone(), ws);
        let sample = api.upload_sample(ws, &raw("Subject: hi")).await.unwrap();
        resolver.refresh(&[sample]).await.unwrap();
        resolver.select("Subject").unwrap();

        assert!(!resolver.refresh(&[]).await.unwrap());
        assert!(resolver.available().is_empty());
        assert_eq!(resolver.selected_count(), 0);
        assert_eq!(backend.call_count("available_headers"), 1);
    }

    #[tokio::test]
    async fn test_stale_selection_pruned() {
        let (_backend, api, ws) = setup().await;
        let mut resolver = HeaderResolver::new(api.clone(), ws);
        let a = api
            .upload_sample(ws, &raw("Subject: hi\r\nX-Odd: 1"))
            .await
            .unwrap();
        let b = api.upload_sample(ws, &raw("Subject: yo")).await.unwrap();
        resolver.refresh(&[a.clone(), b.clone()]).await.unwrap();
        resolver.select_all();
        assert_eq!(resolver.selected_count(), 2);

        api.delete_sample(a.id).await.unwrap();
        resolver.refresh(&[b]).await.unwrap();
        assert_eq!(resolver.selected(), vec!["Subject".to_string()]);
    }

    #[tokio::test]
    async fn test_select_common_and_toggle() {
        let (_backend, api, ws) = setup().await;
        let mut resolver = HeaderResolver::new(api.clone(), ws);
        let sample = api
            .upload_sample(ws, &raw("From: a@b.c\r\nSubject: hi\r\nX-Campaign: 7"))
            .await
            .unwrap();
        resolver.refresh(&[sample]).await.unwrap();

        assert_eq!(resolver.select_common(), 2);
        assert!(!resolver.is_selected("X-Campaign"));
        assert!(resolver.toggle("X-Campaign").unwrap());
        assert!(!resolver.toggle("Subject").unwrap());
        assert!(resolver.toggle("Nope").is_err());

        resolver.clear();
        assert!(resolver.require_selection().is_err());
    }
}
