// Workspace, template and user management for SpamGenie
// Thin layers over the backend API that add local validation and permission checks

//! # Services
//!
//! - [`workspaces::WorkspaceService`]: create, list, delete and share workspaces
//! - [`templates::TemplateService`]: visible base/module templates and template CRUD
//! - [`users::UserService`]: admin user listing and role assignment
//!
//! The services reject invalid input before any network call. The backend
//! remains the authority for permissions; the local checks only spare the
//! user a round trip that is certain to fail.

pub mod templates;
pub mod users;
pub mod workspaces;
