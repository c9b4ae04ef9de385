//! Authentication and authorization system.
//!
//! - Users log in via `POST /api/auth/login` with email and password and receive a signed,
//!   expiring JWT (`iss`/`aud` scoped).
//! - Every other `/api` route requires `Authorization: Bearer <token>`. The token only carries
//!   identity; role and permissions are loaded from the database on each request, so changes
//!   take effect immediately.
//! - Authorization is role based. A user's permissions are those attached to their role, and
//!   `super_admin` passes every check.
//!
//! # Modules
//!
//! - [`current_user`]: resolving the acting user from the bearer token
//! - [`middleware`]: the authentication layer wrapped around the protected routes
//! - [`password`]: Argon2 password hashing and verification
//! - [`permissions`]: predicates, route guards and the `Requires*` extractors
//! - [`session`]: JWT creation and verification
//!
//! # Usage in Handlers
//!
//! ```ignore
//! use crmctl::auth::permissions::{RequiresPermission, permission};
//!
//! async fn list_leads(
//!     State(state): State<AppState>,
//!     current_user: RequiresPermission<permission::LeadsRead>,
//! ) -> Result<Json<LeadList>> {
//!     // current_user derefs to CurrentUser
//!     ...
//! }
//! ```

pub mod current_user;
pub mod middleware;
pub mod password;
pub mod permissions;
pub mod session;
