//! # Upload Coordinator
//!
//! Filters a batch of candidate files by extension and uploads the accepted
//! ones one after another. A failed upload does not stop the batch: it is
//! recorded in the [`UploadReport`] and the next file is attempted.

use std::sync::Arc;

use crate::api::SpamGenieApi;
use crate::models::{CandidateFile, EmailSample, RecordId};
use crate::{Result, SpamGenieError};

/// Reported after each accepted file has been attempted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadProgress {
    pub filename: String,
    pub completed: usize,
    pub total: usize,
    /// Whole percent of the accepted files attempted so far
    pub percent: u8,
    pub succeeded: bool,
}

/// A file that was accepted but could not be stored
#[derive(Debug)]
pub struct UploadFailure {
    pub filename: String,
    pub error: SpamGenieError,
}

/// Outcome of one batch
#[derive(Debug, Default)]
pub struct UploadReport {
    pub uploaded: Vec<EmailSample>,
    /// Files skipped because of their extension
    pub rejected: usize,
    pub failures: Vec<UploadFailure>,
    /// Header re-resolution after the batch failed. The uploads themselves
    /// are stored; the next refresh retries the fetch.
    pub header_error: Option<SpamGenieError>,
}

impl UploadReport {
    pub fn attempted(&self) -> usize {
        self.uploaded.len() + self.failures.len()
    }

    pub fn is_clean(&self) -> bool {
        self.rejected == 0 && self.failures.is_empty() && self.header_error.is_none()
    }
}

pub struct UploadCoordinator {
    api: Arc<dyn SpamGenieApi>,
    accepted_extension: String,
}

impl UploadCoordinator {
    pub fn new(api: Arc<dyn SpamGenieApi>, accepted_extension: impl Into<String>) -> Self {
        Self {
            api,
            accepted_extension: accepted_extension.into(),
        }
    }

    pub fn accepted_extension(&self) -> &str {
        &self.accepted_extension
    }

    /// Remove an uploaded sample
    pub async fn delete(&self, sample: RecordId) -> Result<()> {
        self.api.delete_sample(sample).await?;
        tracing::info!("Deleted sample {}", sample);
        Ok(())
    }

    /// Split a batch into accepted files and the number rejected
    pub fn filter(&self, files: Vec<CandidateFile>) -> (Vec<CandidateFile>, usize) {
        let total = files.len();
        let accepted: Vec<CandidateFile> = files
            .into_iter()
            .filter(|file| file.has_extension(&self.accepted_extension))
            .collect();
        let rejected = total - accepted.len();
        (accepted, rejected)
    }

    /// Upload the accepted files of `files` sequentially.
    ///
    /// `on_progress` is called once per accepted file, after its upload
    /// has finished either way.
    pub async fn upload<F>(
        &self,
        workspace: RecordId,
        files: Vec<CandidateFile>,
        mut on_progress: F,
    ) -> UploadReport
    where
        F: FnMut(&UploadProgress),
    {
        let (accepted, rejected) = self.filter(files);
        if rejected > 0 {
            tracing::warn!(
                "Skipping {} file(s) without a {} extension",
                rejected,
                self.accepted_extension
            );
        }

        let total = accepted.len();
        let mut report = UploadReport {
            rejected,
            ..Default::default()
        };

        for (index, file) in accepted.iter().enumerate() {
            let succeeded = match self.api.upload_sample(workspace, file).await {
                Ok(sample) => {
                    tracing::info!("Uploaded {} as sample {}", file.filename, sample.id);
                    report.uploaded.push(sample);
                    true
                }
                Err(error) => {
                    tracing::error!("Upload of {} failed: {}", file.filename, error);
                    report.failures.push(UploadFailure {
                        filename: file.filename.clone(),
                        error,
                    });
                    false
                }
            };

            let completed = index + 1;
            on_progress(&UploadProgress {
                filename: file.filename.clone(),
                completed,
                total,
                percent: ((completed * 100) / total) as u8,
                succeeded,
            });
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::memory::InMemoryBackend;
    use crate::models::{Role, User};

    fn backend_with_workspace() -> (InMemoryBackend, Arc<dyn SpamGenieApi>) {
        let backend = InMemoryBackend::new(User {
            id: 1,
            username: "alice".into(),
            email: String::new(),
            role: Role::Normal,
        });
        let api: Arc<dyn SpamGenieApi> = Arc::new(backend.clone());
        (backend, api)
    }

    fn eml(name: &str) -> CandidateFile {
        CandidateFile::new(name, "Subject: hi\r\nFrom: a@b.c\r\n\r\nbody")
    }

    #[tokio::test]
    async fn test_rejected_files_never_uploaded() {
        let (backend, api) = backend_with_workspace();
        let workspace = api.create_workspace("batch", "").await.unwrap();
        let coordinator = UploadCoordinator::new(api.clone(), ".eml");

        let files = vec![eml("a.eml"), eml("notes.txt"), eml("B.EML"), eml("c.msg")];
        let report = coordinator.upload(workspace.id, files, |_| {}).await;

        assert_eq!(report.rejected, 2);
        assert_eq!(report.uploaded.len(), 2);
        assert!(report
            .uploaded
            .iter()
            .all(|s| s.original_filename.to_lowercase().ends_with(".eml")));
        assert_eq!(backend.call_count("upload_sample"), 2);
    }

    #[tokio::test]
    async fn test_progress_after_each_file() {
        let (_backend, api) = backend_with_workspace();
        let workspace = api.create_workspace("batch", "").await.unwrap();
        let coordinator = UploadCoordinator::new(api.clone(), ".eml");

        let mut seen = Vec::new();
        coordinator
            .upload(
                workspace.id,
                vec![eml("1.eml"), eml("2.eml"), eml("3.eml"), eml("4.eml")],
                |progress| seen.push(progress.percent),
            )
            .await;
        assert_eq!(seen, vec![25, 50, 75, 100]);
    }

    #[tokio::test]
    async fn test_failure_does_not_stop_batch() {
        let (backend, api) = backend_with_workspace();
        let workspace = api.create_workspace("batch", "").await.unwrap();
        backend.fail_upload_of("2.eml");
        let coordinator = UploadCoordinator::new(api.clone(), ".eml");

        let report = coordinator
            .upload(
                workspace.id,
                vec![eml("1.eml"), eml("2.eml"), eml("3.eml")],
                |_| {},
            )
            .await;
        assert_eq!(report.uploaded.len(), 2);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].filename, "2.eml");
        assert_eq!(report.attempted(), 3);
        assert!(!report.is_clean());
    }

    #[tokio::test]
    async fn test_all_rejected_makes_no_calls() {
        let (backend, api) = backend_with_workspace();
        let coordinator = UploadCoordinator::new(api, ".eml");
        let report = coordinator
            .upload(1, vec![eml("a.txt"), eml("b.pdf")], |_| {})
            .await;
        assert_eq!(report.rejected, 2);
        assert!(report.uploaded.is_empty());
        assert_eq!(backend.total_calls(), 0);
    }
}
