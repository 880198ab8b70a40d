// Core domain models for SpamGenie
// These mirror the records served by the REST backend

//! # Domain Models Module
//!
//! The client holds read-through copies of backend records; none of these
//! types has a lifecycle of its own on the client side.
//!
//! - [`user`]: signed-in user and role
//! - [`workspace`]: workspaces, shares and the caller's access level
//! - [`email`]: uploaded samples, candidate files and the derived header set
//! - [`template`]: prompt templates (base, module, workspace)
//! - [`generation`]: generation requests/results and assembled prompts

pub mod email;
pub mod generation;
pub mod template;
pub mod user;
pub mod workspace;

/// Backend record identifiers are integer primary keys
pub type RecordId = i64;

pub use email::{CandidateFile, EmailSample, HeaderSet};
pub use generation::{
    AssembledPrompt, GenerationResult, GenerationStatus, PromptMetadata, TemplateSummary,
};
pub use template::{NewTemplate, PromptTemplate, TemplateKind, TemplateUpdate, Visibility};
pub use user::{Role, User, UserRef};
pub use workspace::{Permission, Workspace, WorkspaceAccess, WorkspaceShare, MAX_WORKSPACE_NAME_LEN};
