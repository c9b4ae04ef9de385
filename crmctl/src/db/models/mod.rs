//! Database record models matching table schemas.
//!
//! These structs are what repositories accept and return. They are kept apart from the API
//! models in [`crate::api::models`] so storage and wire formats can evolve independently.
//!
//! - [`users`]: user accounts, profiles and the resolved auth context
//! - [`roles`] and [`permissions`]: the role/permission store
//! - [`leads`], [`interactions`] and [`tags`]: CRM data
//! - [`analytics`]: dashboard aggregates

pub mod analytics;
pub mod interactions;
pub mod leads;
pub mod permissions;
pub mod roles;
pub mod tags;
pub mod users;
