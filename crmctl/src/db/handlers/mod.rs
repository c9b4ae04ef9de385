//! Repository implementations for database access.
//!
//! Each repository wraps a `&mut PgConnection`, provides strongly-typed operations, and returns
//! models from [`crate::db::models`]. The CRUD-shaped ones implement [`Repository`].
//!
//! # Available Repositories
//!
//! - [`Users`]: accounts, profiles, login bookkeeping and the auth context query
//! - [`Roles`]: roles and their permission sets
//! - [`Permissions`]: the seeded permission catalogue (read-only)
//! - [`Leads`]: leads, their tags, visibility filtering and priority scoring
//! - [`Interactions`]: interactions logged against leads
//! - [`Tags`]: lead tags
//! - [`analytics`]: dashboard queries (free functions over the pool)
//!
//! # Common Pattern
//!
//! ```ignore
//! use crmctl::db::handlers::{Users, Repository};
//!
//! async fn example(pool: &sqlx::PgPool) -> Result<(), Box<dyn std::error::Error>> {
//!     let mut conn = pool.acquire().await?;
//!     let mut repo = Users::new(&mut conn);
//!     let users = repo.list(&UserFilter::new(0, 100)).await?;
//!     Ok(())
//! }
//! ```

pub mod analytics;
pub mod interactions;
pub mod leads;
pub mod permissions;
pub mod repository;
pub mod roles;
pub mod tags;
pub mod users;

pub use interactions::Interactions;
pub use leads::Leads;
pub use permissions::Permissions;
pub use repository::Repository;
pub use roles::Roles;
pub use tags::Tags;
pub use users::Users;
