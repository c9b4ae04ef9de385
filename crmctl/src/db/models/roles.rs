//! Database models for roles.

use crate::types::RoleId;
use chrono::{DateTime, Utc};

/// Database request for creating a new role. `permissions` are permission names.
#[derive(Debug, Clone)]
pub struct RoleCreateDBRequest {
    pub name: String,
    pub display_name: String,
    pub description: Option<String>,
    pub permissions: Vec<String>,
}

/// Database request for updating a role. `Some(permissions)` replaces the whole set.
#[derive(Debug, Clone, Default)]
pub struct RoleUpdateDBRequest {
    pub name: Option<String>,
    pub display_name: Option<String>,
    pub description: Option<String>,
    pub is_active: Option<bool>,
    pub permissions: Option<Vec<String>>,
}

/// Short form of a permission attached to a role
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct RolePermissionSummary {
    pub name: String,
    pub display_name: String,
    pub module: String,
    pub action: String,
}

/// Database response for a role with its user count and permissions
#[derive(Debug, Clone)]
pub struct RoleDBResponse {
    pub id: RoleId,
    pub name: String,
    pub display_name: String,
    pub description: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub user_count: i64,
    pub permissions: Vec<RolePermissionSummary>,
}
