//! API layer for HTTP request handling and data models.
//!
//! - **[`handlers`]**: Axum route handlers for all API endpoints
//! - **[`models`]**: Request/response data structures for API communication
//! - **[`validation`]**: Request body validation and the [`validation::ValidatedJson`] extractor
//!
//! # API Structure
//!
//! Everything is mounted under `/api`:
//!
//! - **Authentication** (`/api/auth/*`): login and the current user
//! - **Leads** (`/api/leads/*`): leads, tags and priority scoring
//! - **Interactions** (`/api/interactions/*`): calls, emails and meetings logged against leads
//! - **Users** (`/api/users/*`), **Roles** (`/api/roles/*`), **Permissions** (`/api/permissions`)
//! - **Analytics** (`/api/analytics/dashboard`), **Settings** (`/api/settings`, `/api/tags`)
//! - **Health** (`/api/health`)
//!
//! # OpenAPI Documentation
//!
//! All endpoints are documented with `utoipa`. The document is served at
//! `/api-docs/openapi.json` and rendered at `/docs`.

pub mod handlers;
pub mod models;
pub mod validation;
