// SpamGenie - Rust Edition
// Client library and rule-generation wizard for the SpamGenie rule service

//! # SpamGenie Library
//!
//! This is the library crate behind the `spam-genie` command-line tool. It talks
//! to the SpamGenie REST backend, which turns sample spam emails into
//! SpamAssassin rules with the help of an external LLM.
//!
//! ## Core Components
//!
//! ### Domain Models
//! - [`Workspace`]: a named container for one investigation's samples and rules
//! - [`EmailSample`]: an uploaded `.eml` file
//! - [`HeaderSet`]: header name → example value, derived from all samples
//! - [`PromptTemplate`]: base prompts, optional modules and workspace prompts
//! - [`GenerationResult`]: one generation request and, once complete, its rule
//!
//! ### API Seam
//! [`SpamGenieApi`] lists every backend operation the client consumes.
//! [`HttpBackend`] implements it over REST, [`InMemoryBackend`] keeps
//! everything in memory for development and tests.
//!
//! ### Rule Generation Wizard
//! The [`Wizard`] drives the four steps (upload → headers → prompt → rule):
//!
//! ```text
//! UploadCoordinator ──samples──▶ HeaderResolver ──headers──▶ PromptAssembler
//!                                                                  │
//!                                      GenerationPoller ◀──prompt──┘
//! ```
//!
//! Navigation between steps goes through the [`StepController`], which only
//! lets the user reach a step once its prerequisites are met.
//!
//! ### Session State
//! - [`CapabilitySet`]: what the signed-in user may do, computed once per session
//! - [`AppState`]: current workspace selection with hydrate/persist lifecycle
//!
//! ## Rust Learning Notes:
//!
//! ### Re-exports
//! `pub use` statements create shortcuts so users don't need to know the internal
//! module structure. Instead of `use spam_genie::wizard::poller::PollHandle`,
//! users can write `use spam_genie::PollHandle`.

// Core domain models shared by every other module
pub mod models;

// Backend API trait and its HTTP / in-memory implementations
pub mod api;

// Role → capability mapping and template visibility rules
pub mod auth;

// Settings loaded from defaults, config file and environment
pub mod settings;

// Client-side application state (current workspace)
pub mod state;

// Workspace and prompt template management
pub mod services;

// The multi-step rule generation workflow
pub mod wizard;

pub use models::{
    AssembledPrompt, CandidateFile, EmailSample, GenerationResult, GenerationStatus, HeaderSet,
    NewTemplate, Permission, PromptMetadata, PromptTemplate, Role, TemplateKind, TemplateUpdate,
    User, UserRef, Visibility, Workspace, WorkspaceAccess, WorkspaceShare,
};

pub use api::{http::HttpBackend, memory::InMemoryBackend, GenerationRequest, SpamGenieApi};
pub use auth::{Capability, CapabilitySet, Session};
pub use settings::Settings;
pub use services::{templates::TemplateService, users::UserService, workspaces::WorkspaceService};
pub use state::{AppState, FileStateStore, MemoryStateStore, StateStore};
pub use wizard::{
    headers::{HeaderResolver, COMMON_HEADERS},
    poller::{GenerationPoller, PollHandle},
    prompt::PromptAssembler,
    step::{Progress, Step, StepController},
    upload::{UploadCoordinator, UploadFailure, UploadProgress, UploadReport},
    Wizard,
};

use thiserror::Error;

/// Error taxonomy bucket, used by front ends to decide how to present an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Caught locally before any network call (bad name, bad extension, ...)
    Validation,
    /// A backend call failed; the operation is abandoned
    Api,
    /// The status poll loop stopped; the result stays incomplete
    Polling,
}

/// Errors produced by SpamGenie operations
///
/// ## Rust Learning Notes:
///
/// ### The `thiserror` Crate
/// - `#[derive(Error)]` implements the `std::error::Error` trait
/// - `#[error("...")]` provides human-readable error messages
/// - `#[from]` enables automatic conversion from other error types
#[derive(Error, Debug)]
pub enum SpamGenieError {
    /// Input rejected locally
    #[error("Validation error: {0}")]
    Validation(String),

    /// The operation is not allowed for the current user or workspace
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// The workspace was shared read-only with the current user
    #[error("Workspace '{workspace}' is read-only")]
    ReadOnly { workspace: String },

    /// A generation is already being polled
    #[error("Generation {id} is still in progress")]
    GenerationInProgress { id: i64 },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Parse error: {0}")]
    Parse(String),

    /// A status poll failed; the generation is left incomplete
    #[error("Polling generation {id} failed: {message}")]
    Poll { id: i64, message: String },

    #[error("Polling generation {id} was cancelled")]
    Cancelled { id: i64 },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl SpamGenieError {
    /// Which bucket of the error taxonomy this error belongs to
    pub fn category(&self) -> ErrorCategory {
        match self {
            SpamGenieError::Validation(_)
            | SpamGenieError::Forbidden(_)
            | SpamGenieError::ReadOnly { .. }
            | SpamGenieError::GenerationInProgress { .. }
            | SpamGenieError::Configuration(_) => ErrorCategory::Validation,
            SpamGenieError::Poll { .. } | SpamGenieError::Cancelled { .. } => {
                ErrorCategory::Polling
            }
            _ => ErrorCategory::Api,
        }
    }
}

impl From<reqwest::Error> for SpamGenieError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_decode() {
            SpamGenieError::Parse(error.to_string())
        } else if error.is_connect() {
            SpamGenieError::Network(format!("Connection failed: {}", error))
        } else {
            SpamGenieError::Network(error.to_string())
        }
    }
}

impl From<url::ParseError> for SpamGenieError {
    fn from(error: url::ParseError) -> Self {
        SpamGenieError::Configuration(format!("Invalid URL: {}", error))
    }
}

impl From<::config::ConfigError> for SpamGenieError {
    fn from(error: ::config::ConfigError) -> Self {
        SpamGenieError::Configuration(error.to_string())
    }
}

/// Type alias for Results that use our custom error type
pub type Result<T> = std::result::Result<T, SpamGenieError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_categories() {
        assert_eq!(
            SpamGenieError::Validation("empty name".into()).category(),
            ErrorCategory::Validation
        );
        assert_eq!(
            SpamGenieError::ReadOnly {
                workspace: "shared".into()
            }
            .category(),
            ErrorCategory::Validation
        );
        assert_eq!(
            SpamGenieError::Server {
                status: 500,
                message: "boom".into()
            }
            .category(),
            ErrorCategory::Api
        );
        assert_eq!(
            SpamGenieError::Poll {
                id: 3,
                message: "timeout".into()
            }
            .category(),
            ErrorCategory::Polling
        );
    }

    #[test]
    fn test_url_error_is_configuration() {
        let err: SpamGenieError = url::Url::parse("not a url").unwrap_err().into();
        assert!(matches!(err, SpamGenieError::Configuration(_)));
    }
}
