//! # Application State
//!
//! The only state the client owns outright: which workspace is currently
//! selected, and whether it was created moments ago (so the first wizard
//! visit can skip straight to the upload step). Everything else is a copy of
//! backend records.
//!
//! The state is hydrated once at startup from a [`StateStore`] and written
//! back whenever it changes.
//!
//! ## Rust Learning Notes:
//!
//! ### Storage Trait
//! Like the backend seam in [`crate::api`], persistence sits behind a small
//! trait. The CLI uses [`FileStateStore`]; tests use [`MemoryStateStore`].

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::models::{RecordId, Workspace};
use crate::{Result, SpamGenieError};

/// Persisted client state
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppState {
    #[serde(default)]
    pub current_workspace: Option<RecordId>,
    #[serde(default)]
    pub current_workspace_name: Option<String>,
    /// Set when the current workspace was just created; consumed once
    #[serde(default)]
    pub is_new_workspace: bool,
}

impl AppState {
    /// Load the saved state, falling back to an empty one if nothing was saved
    pub fn hydrate(store: &dyn StateStore) -> Result<Self> {
        Ok(store.load()?.unwrap_or_default())
    }

    pub fn persist(&self, store: &dyn StateStore) -> Result<()> {
        store.save(self)
    }

    pub fn select_workspace(&mut self, workspace: &Workspace, is_new: bool) {
        self.current_workspace = Some(workspace.id);
        self.current_workspace_name = Some(workspace.name.clone());
        self.is_new_workspace = is_new;
    }

    /// Returns the "just created" flag and clears it
    pub fn take_new_workspace_flag(&mut self) -> bool {
        std::mem::take(&mut self.is_new_workspace)
    }

    /// Forget the selection, e.g. after the workspace was deleted
    pub fn clear(&mut self) {
        *self = AppState::default();
    }

    /// Clear the selection only if it points at `workspace`
    pub fn forget_workspace(&mut self, workspace: RecordId) {
        if self.current_workspace == Some(workspace) {
            self.clear();
        }
    }
}

/// Where [`AppState`] is kept between runs
pub trait StateStore: Send + Sync {
    /// `Ok(None)` when nothing has been saved yet
    fn load(&self) -> Result<Option<AppState>>;

    fn save(&self, state: &AppState) -> Result<()>;
}

/// JSON file on disk
#[derive(Debug, Clone)]
pub struct FileStateStore {
    path: PathBuf,
}

impl FileStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StateStore for FileStateStore {
    fn load(&self) -> Result<Option<AppState>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let raw = std::fs::read_to_string(&self.path)?;
        match serde_json::from_str(&raw) {
            Ok(state) => Ok(Some(state)),
            Err(e) => {
                tracing::warn!(
                    "Ignoring unreadable state file {}: {}",
                    self.path.display(),
                    e
                );
                Ok(None)
            }
        }
    }

    fn save(&self, state: &AppState) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let raw = serde_json::to_string_pretty(state)?;
        std::fs::write(&self.path, raw)?;
        tracing::debug!("Saved state to {}", self.path.display());
        Ok(())
    }
}

/// Keeps the state in memory only
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    saved: Mutex<Option<AppState>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateStore for MemoryStateStore {
    fn load(&self) -> Result<Option<AppState>> {
        self.saved
            .lock()
            .map(|saved| saved.clone())
            .map_err(|_| SpamGenieError::Internal("state lock poisoned".to_string()))
    }

    fn save(&self, state: &AppState) -> Result<()> {
        let mut saved = self
            .saved
            .lock()
            .map_err(|_| SpamGenieError::Internal("state lock poisoned".to_string()))?;
        *saved = Some(state.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UserRef;
    use chrono::Utc;

    fn workspace(id: RecordId, name: &str) -> Workspace {
        Workspace {
            id,
            name: name.to_string(),
            owner: UserRef {
                id: 1,
                username: "alice".into(),
            },
            description: String::new(),
            created_at: Utc::now(),
            shares: Vec::new(),
        }
    }

    #[test]
    fn test_new_workspace_flag_consumed_once() {
        let mut state = AppState::default();
        state.select_workspace(&workspace(4, "phish"), true);
        assert!(state.take_new_workspace_flag());
        assert!(!state.take_new_workspace_flag());
        assert_eq!(state.current_workspace, Some(4));
    }

    #[test]
    fn test_forget_only_matching_workspace() {
        let mut state = AppState::default();
        state.select_workspace(&workspace(4, "phish"), false);
        state.forget_workspace(5);
        assert_eq!(state.current_workspace, Some(4));
        state.forget_workspace(4);
        assert_eq!(state, AppState::default());
    }

    #[test]
    fn test_file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStateStore::new(dir.path().join("nested").join("state.json"));
        assert!(AppState::hydrate(&store).unwrap().current_workspace.is_none());

        let mut state = AppState::default();
        state.select_workspace(&workspace(9, "invoices"), false);
        state.persist(&store).unwrap();

        let loaded = AppState::hydrate(&store).unwrap();
        assert_eq!(loaded.current_workspace, Some(9));
        assert_eq!(loaded.current_workspace_name.as_deref(), Some("invoices"));
    }

    #[test]
    fn test_corrupt_file_hydrates_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "{not json").unwrap();
        let state = AppState::hydrate(&FileStateStore::new(path)).unwrap();
        assert_eq!(state, AppState::default());
    }

    #[test]
    fn test_memory_store() {
        let store = MemoryStateStore::new();
        assert!(store.load().unwrap().is_none());
        let mut state = AppState::default();
        state.select_workspace(&workspace(2, "a"), true);
        state.persist(&store).unwrap();
        assert_eq!(store.load().unwrap(), Some(state));
    }
}
