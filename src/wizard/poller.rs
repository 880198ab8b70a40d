//! # Generation Poller
//!
//! Submits a generation request, then polls its status in a background task
//! until the backend reports it complete. Only the submitted result is
//! polled and only that entry of the shared result list is patched.
//!
//! ## Rust Learning Notes:
//!
//! ### Cancellable Tasks
//! The polling loop runs in `tokio::spawn` and races every wait against a
//! `CancellationToken`. [`PollHandle`] owns the `JoinHandle`, so callers can
//! cancel the loop or await its outcome.
//!
//! ### Sleep After Tick
//! The next status request is scheduled only after the previous one has
//! resolved, so slow responses never pile up.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::api::{GenerationRequest, SpamGenieApi};
use crate::models::{GenerationResult, RecordId};
use crate::{Result, SpamGenieError};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Result list shared between the wizard and the polling task, newest first
pub type SharedResults = Arc<RwLock<Vec<GenerationResult>>>;

/// Handle to one running poll loop
#[derive(Debug)]
pub struct PollHandle {
    result_id: RecordId,
    token: CancellationToken,
    task: JoinHandle<Result<GenerationResult>>,
}

impl PollHandle {
    /// Id of the generation being polled
    pub fn result_id(&self) -> RecordId {
        self.result_id
    }

    /// Stop polling. The result stays incomplete.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the loop to end: the completed result, a poll error or
    /// [`SpamGenieError::Cancelled`]
    pub async fn wait(self) -> Result<GenerationResult> {
        match self.task.await {
            Ok(outcome) => outcome,
            Err(e) if e.is_cancelled() => Err(SpamGenieError::Cancelled {
                id: self.result_id,
            }),
            Err(e) => Err(SpamGenieError::Internal(format!(
                "Polling task for generation {} failed: {}",
                self.result_id, e
            ))),
        }
    }
}

/// Bookkeeping for the loop the poller itself keeps an eye on
#[derive(Debug)]
struct ActivePoll {
    result_id: RecordId,
    token: CancellationToken,
    done: Arc<AtomicBool>,
}

pub struct GenerationPoller {
    api: Arc<dyn SpamGenieApi>,
    workspace: RecordId,
    workspace_name: String,
    read_only: bool,
    interval: Duration,
    results: SharedResults,
    result_count: usize,
    last_error: Arc<Mutex<Option<String>>>,
    active: Option<ActivePoll>,
}

impl GenerationPoller {
    pub fn new(
        api: Arc<dyn SpamGenieApi>,
        workspace: RecordId,
        workspace_name: impl Into<String>,
        read_only: bool,
    ) -> Self {
        Self {
            api,
            workspace,
            workspace_name: workspace_name.into(),
            read_only,
            interval: DEFAULT_POLL_INTERVAL,
            results: Arc::new(RwLock::new(Vec::new())),
            result_count: 0,
            last_error: Arc::new(Mutex::new(None)),
            active: None,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Load the workspace's stored results, replacing the local list
    pub async fn load_results(&mut self) -> Result<usize> {
        let results = self.api.list_generations(self.workspace).await?;
        self.result_count = results.len();
        *self.results.write().await = results;
        Ok(self.result_count)
    }

    /// Number of results known for the workspace, including ones submitted here
    pub fn result_count(&self) -> usize {
        self.result_count
    }

    pub fn results_handle(&self) -> SharedResults {
        Arc::clone(&self.results)
    }

    /// Copy of the result list, newest first
    pub async fn results(&self) -> Vec<GenerationResult> {
        self.results.read().await.clone()
    }

    /// Message of the last failed submission or poll
    pub async fn last_error(&self) -> Option<String> {
        self.last_error.lock().await.clone()
    }

    /// Whether a submitted generation is still being polled
    pub fn is_polling(&self) -> bool {
        self.active
            .as_ref()
            .map(|active| !active.done.load(Ordering::SeqCst))
            .unwrap_or(false)
    }

    /// Stop the outstanding poll loop, if any
    pub fn cancel(&mut self) {
        if let Some(active) = self.active.take() {
            if !active.done.load(Ordering::SeqCst) {
                tracing::info!("Cancelling poll for generation {}", active.result_id);
            }
            active.token.cancel();
        }
    }

    /// Start a generation and poll it in the background.
    ///
    /// With `feedback`, the request goes to the regenerate-with-feedback
    /// endpoint and refers to the newest known result.
    pub async fn submit(
        &mut self,
        prompt: String,
        module_ids: Vec<RecordId>,
        base_prompt_id: Option<RecordId>,
        feedback: Option<String>,
    ) -> Result<PollHandle> {
        if self.read_only {
            return Err(SpamGenieError::ReadOnly {
                workspace: self.workspace_name.clone(),
            });
        }
        if let Some(active) = self.active.as_ref().filter(|a| !a.done.load(Ordering::SeqCst)) {
            return Err(SpamGenieError::GenerationInProgress {
                id: active.result_id,
            });
        }
        if prompt.trim().is_empty() {
            return Err(SpamGenieError::Validation("The prompt is empty".to_string()));
        }
        let feedback = feedback.filter(|f| !f.trim().is_empty());

        let previous_generation = match feedback {
            Some(_) => self.results.read().await.first().map(|r| r.id),
            None => None,
        };
        let request = GenerationRequest {
            workspace: self.workspace,
            prompt,
            prompt_modules: module_ids,
            base_prompt_id,
            feedback,
            previous_generation,
        };

        let created = if request.feedback.is_some() {
            self.api.regenerate_with_feedback(&request).await
        } else {
            self.api.create_generation(&request).await
        };
        let created = match created {
            Ok(created) => created,
            Err(e) => {
                *self.last_error.lock().await = Some(e.to_string());
                return Err(e);
            }
        };
        tracing::info!("Submitted generation {}", created.id);

        *self.last_error.lock().await = None;
        self.results.write().await.insert(0, created.clone());
        self.result_count += 1;

        let token = CancellationToken::new();
        let done = Arc::new(AtomicBool::new(false));
        let task = tokio::spawn(poll_until_complete(
            Arc::clone(&self.api),
            created.id,
            self.interval,
            Arc::clone(&self.results),
            Arc::clone(&self.last_error),
            token.clone(),
            Arc::clone(&done),
        ));

        self.active = Some(ActivePoll {
            result_id: created.id,
            token: token.clone(),
            done,
        });
        Ok(PollHandle {
            result_id: created.id,
            token,
            task,
        })
    }
}

async fn poll_until_complete(
    api: Arc<dyn SpamGenieApi>,
    id: RecordId,
    interval: Duration,
    results: SharedResults,
    last_error: Arc<Mutex<Option<String>>>,
    token: CancellationToken,
    done: Arc<AtomicBool>,
) -> Result<GenerationResult> {
    let outcome = poll_loop(api, id, interval, results, &last_error, &token).await;
    done.store(true, Ordering::SeqCst);
    outcome
}

async fn poll_loop(
    api: Arc<dyn SpamGenieApi>,
    id: RecordId,
    interval: Duration,
    results: SharedResults,
    last_error: &Mutex<Option<String>>,
    token: &CancellationToken,
) -> Result<GenerationResult> {
    let mut ticks: u32 = 0;
    loop {
        tokio::select! {
            _ = token.cancelled() => {
                tracing::debug!("Poll for generation {} cancelled", id);
                return Err(SpamGenieError::Cancelled { id });
            }
            _ = tokio::time::sleep(interval) => {}
        }

        let status = tokio::select! {
            _ = token.cancelled() => {
                tracing::debug!("Poll for generation {} cancelled", id);
                return Err(SpamGenieError::Cancelled { id });
            }
            status = api.generation_status(id) => status,
        };
        ticks += 1;

        let status = match status {
            Ok(status) => status,
            Err(e) => {
                tracing::error!("Status poll for generation {} failed: {}", id, e);
                let message = e.to_string();
                *last_error.lock().await = Some(message.clone());
                return Err(SpamGenieError::Poll { id, message });
            }
        };

        if !status.is_complete {
            tracing::debug!("Generation {} still running after {} poll(s)", id, ticks);
            continue;
        }

        let mut list = results.write().await;
        let Some(result) = list.iter_mut().find(|r| r.id == id) else {
            return Err(SpamGenieError::Internal(format!(
                "Generation {} vanished from the result list",
                id
            )));
        };
        result.apply_status(&status);
        tracing::info!("Generation {} complete after {} poll(s)", id, ticks);
        return Ok(result.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::memory::InMemoryBackend;
    use crate::models::{Role, User};

    async fn setup() -> (InMemoryBackend, GenerationPoller) {
        let backend = InMemoryBackend::new(User {
            id: 1,
            username: "alice".into(),
            email: String::new(),
            role: Role::Normal,
        });
        let api: Arc<dyn SpamGenieApi> = Arc::new(backend.clone());
        let workspace = api.create_workspace("poll", "").await.unwrap();
        let poller = GenerationPoller::new(api, workspace.id, workspace.name, false)
            .with_interval(Duration::from_millis(5));
        (backend, poller)
    }

    #[tokio::test]
    async fn test_poll_until_complete() {
        let (backend, mut poller) = setup().await;
        backend.complete_generations_after(2, "score SPAM_TEST 1.0");

        let handle = poller
            .submit("make a rule".into(), vec![], None, None)
            .await
            .unwrap();
        let id = handle.result_id();
        let done = handle.wait().await.unwrap();

        assert_eq!(done.id, id);
        assert!(done.is_complete);
        assert_eq!(done.rule.as_deref(), Some("score SPAM_TEST 1.0"));
        assert_eq!(backend.call_count("generation_status"), 2);

        let results = poller.results().await;
        assert_eq!(results.len(), 1);
        assert!(results[0].is_complete);
        assert!(!poller.is_polling());
    }

    #[tokio::test]
    async fn test_refuses_second_submission_while_polling() {
        let (backend, mut poller) = setup().await;
        backend.complete_generations_after(1000, "never");

        let handle = poller
            .submit("first".into(), vec![], None, None)
            .await
            .unwrap();
        let err = poller
            .submit("second".into(), vec![], None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, SpamGenieError::GenerationInProgress { .. }));
        assert_eq!(backend.call_count("create_generation"), 1);

        poller.cancel();
        assert!(matches!(
            handle.wait().await,
            Err(SpamGenieError::Cancelled { .. })
        ));
        assert!(!poller.is_polling());
    }

    #[tokio::test]
    async fn test_poll_failure_leaves_result_incomplete() {
        let (backend, mut poller) = setup().await;
        backend.fail_status_requests(true);

        let handle = poller
            .submit("rule".into(), vec![], None, None)
            .await
            .unwrap();
        let err = handle.wait().await.unwrap_err();
        assert!(matches!(err, SpamGenieError::Poll { .. }));
        assert_eq!(backend.call_count("generation_status"), 1);

        let results = poller.results().await;
        assert!(!results[0].is_complete);
        assert!(poller.last_error().await.is_some());
    }

    #[tokio::test]
    async fn test_feedback_uses_regenerate_endpoint() {
        let (backend, mut poller) = setup().await;
        let first = poller
            .submit("rule".into(), vec![], None, None)
            .await
            .unwrap();
        first.wait().await.unwrap();

        let second = poller
            .submit("rule".into(), vec![], None, Some("too broad".into()))
            .await
            .unwrap();
        second.wait().await.unwrap();

        assert_eq!(backend.call_count("regenerate_with_feedback"), 1);
        let results = poller.results().await;
        assert_eq!(results.len(), 2);
        assert!(results[0].prompt.contains("too broad"));
    }

    #[tokio::test]
    async fn test_read_only_refuses_submission() {
        let (backend, _) = setup().await;
        let api: Arc<dyn SpamGenieApi> = Arc::new(backend.clone());
        let mut poller = GenerationPoller::new(api, 1, "shared", true);
        let err = poller
            .submit("rule".into(), vec![], None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, SpamGenieError::ReadOnly { .. }));
        assert_eq!(backend.call_count("create_generation"), 0);
    }
}
