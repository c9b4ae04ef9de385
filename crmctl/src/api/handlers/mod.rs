//! HTTP request handlers for the `/api` surface.
//!
//! Handlers are grouped by resource. Each one:
//! - declares its guard as an extractor (`CurrentUser`, `RequiresPermission<..>`)
//! - takes bodies through [`crate::api::validation::ValidatedJson`]
//! - applies per-record access rules after a single-row lookup
//! - delegates storage to the repositories in [`crate::db::handlers`]
//!
//! # Handler Modules
//!
//! - [`analytics`]: dashboard summary
//! - [`auth`]: login and the current session
//! - [`health`]: database connectivity check, unauthenticated
//! - [`interactions`]: interaction recording, editing and listing
//! - [`leads`]: lead CRUD, filtered listing and the priority list
//! - [`permissions`]: permission catalogue
//! - [`roles`]: role CRUD with reserved-role and in-use guards
//! - [`tags`]: tag listing and client settings
//! - [`users`]: user CRUD, profiles and effective permissions
//!
//! # Error Handling
//!
//! Handlers return [`crate::errors::Error`], which converts to the JSON error body with a
//! stable `code`.

pub mod analytics;
pub mod auth;
pub mod health;
pub mod interactions;
pub mod leads;
pub mod permissions;
pub mod roles;
pub mod tags;
pub mod users;
