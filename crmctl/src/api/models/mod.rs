//! API request and response data models.
//!
//! These structures define the public API contract. They are distinct from the database models
//! in [`crate::db::models`], serialize with camelCase field names, and carry `utoipa` annotations
//! for the generated OpenAPI document. Request bodies derive `validator::Validate` and implement
//! [`crate::api::validation::PolicyRules`].
//!
//! - [`auth`]: login payloads
//! - [`users`]: accounts and the [`users::CurrentUser`] resolved for each request
//! - [`roles`] and [`permissions`]: role management and the permission catalogue
//! - [`leads`], [`interactions`] and [`tags`]: CRM data
//! - [`analytics`]: dashboard summary
//! - [`health`]: service health
//! - [`pagination`]: shared page/limit query parameters

pub mod analytics;
pub mod auth;
pub mod health;
pub mod interactions;
pub mod leads;
pub mod pagination;
pub mod permissions;
pub mod roles;
pub mod tags;
pub mod users;
