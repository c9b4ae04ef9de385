//! API request/response models for users.

use super::pagination::Pagination;
use super::permissions::PermissionResponse;
use crate::api::validation::{PolicyRules, check_password};
use crate::auth::permissions::VIEWER;
use crate::config::Config;
use crate::db::models::{
    permissions::PermissionDBResponse,
    users::{ProfileFields, UserAuthContext, UserDBResponse, UserStatus},
};
use crate::errors::ValidationErrors;
use crate::types::{RoleId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

/// Display name used when a user has no role
pub const DEFAULT_ROLE_DISPLAY_NAME: &str = "Viewer";

/// Query parameters for listing users
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct ListUsersQuery {
    /// Pagination parameters
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,
}

/// The authenticated user for the current request.
///
/// Resolved from the database on every request, so role and permission changes apply
/// immediately.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CurrentUser {
    #[schema(value_type = String, format = "uuid")]
    pub id: UserId,
    pub email: String,
    pub name: String,
    pub role: String,
    pub role_display_name: String,
    pub permissions: Vec<String>,
}

impl From<UserAuthContext> for CurrentUser {
    fn from(ctx: UserAuthContext) -> Self {
        Self {
            id: ctx.id,
            email: ctx.email,
            name: ctx.name,
            role: ctx.role_name.unwrap_or_else(|| VIEWER.to_string()),
            role_display_name: ctx.role_display_name.unwrap_or_else(|| DEFAULT_ROLE_DISPLAY_NAME.to_string()),
            permissions: ctx.permissions,
        }
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UserCreate {
    #[validate(
        length(min = 2, max = 255, message = "Must be between 2 and 255 characters"),
        custom(function = "crate::api::validation::not_blank")
    )]
    pub name: String,
    #[validate(email(message = "Must be a valid email address"))]
    pub email: String,
    #[validate(custom(function = "crate::api::validation::phone"))]
    pub phone: Option<String>,
    pub password: String,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub role_id: Option<RoleId>,
    pub status: Option<UserStatus>,
    #[validate(length(max = 100, message = "Must be at most 100 characters"))]
    pub department: Option<String>,
    #[validate(length(max = 100, message = "Must be at most 100 characters"))]
    pub position: Option<String>,
    #[validate(length(max = 500, message = "Must be at most 500 characters"))]
    pub bio: Option<String>,
}

impl UserCreate {
    pub fn profile(&self) -> ProfileFields {
        ProfileFields {
            department: self.department.clone(),
            position: self.position.clone(),
            bio: self.bio.clone(),
        }
    }
}

impl PolicyRules for UserCreate {
    fn check_policy(&self, config: &Config, errors: &mut ValidationErrors) {
        check_password(errors, "password", &self.password, config);
    }
}

/// Every field is optional; absent fields keep their current value.
#[derive(Debug, Clone, Default, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UserUpdate {
    #[validate(
        length(min = 2, max = 255, message = "Must be between 2 and 255 characters"),
        custom(function = "crate::api::validation::not_blank")
    )]
    pub name: Option<String>,
    #[validate(email(message = "Must be a valid email address"))]
    pub email: Option<String>,
    #[validate(custom(function = "crate::api::validation::phone"))]
    pub phone: Option<String>,
    /// New password; also stamps the password change time
    pub password: Option<String>,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub role_id: Option<RoleId>,
    pub status: Option<UserStatus>,
    #[validate(length(max = 100, message = "Must be at most 100 characters"))]
    pub department: Option<String>,
    #[validate(length(max = 100, message = "Must be at most 100 characters"))]
    pub position: Option<String>,
    #[validate(length(max = 500, message = "Must be at most 500 characters"))]
    pub bio: Option<String>,
}

impl UserUpdate {
    pub fn profile(&self) -> ProfileFields {
        ProfileFields {
            department: self.department.clone(),
            position: self.position.clone(),
            bio: self.bio.clone(),
        }
    }

    /// Whether the update touches fields reserved to role managers
    pub fn changes_access(&self) -> bool {
        self.role_id.is_some() || self.status.is_some()
    }
}

impl PolicyRules for UserUpdate {
    fn check_policy(&self, config: &Config, errors: &mut ValidationErrors) {
        if let Some(password) = self.password.as_deref().filter(|p| !p.is_empty()) {
            check_password(errors, "password", password, config);
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserCounts {
    pub leads_assigned: i64,
    pub interactions: i64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: UserId,
    pub email: String,
    pub name: String,
    pub phone: Option<String>,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub role_id: Option<RoleId>,
    pub role: String,
    pub role_display_name: String,
    pub department: Option<String>,
    pub position: Option<String>,
    pub bio: Option<String>,
    pub status: UserStatus,
    pub email_verified: bool,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(rename = "_count")]
    pub count: UserCounts,
}

impl From<UserDBResponse> for UserResponse {
    fn from(db: UserDBResponse) -> Self {
        Self {
            id: db.id,
            email: db.email,
            name: db.name,
            phone: db.phone,
            role_id: db.role_id,
            role: db.role_name.unwrap_or_else(|| VIEWER.to_string()),
            role_display_name: db.role_display_name.unwrap_or_else(|| DEFAULT_ROLE_DISPLAY_NAME.to_string()),
            department: db.profile.department,
            position: db.profile.position,
            bio: db.profile.bio,
            status: db.status,
            email_verified: db.email_verified,
            last_login: db.last_login,
            created_at: db.created_at,
            updated_at: db.updated_at,
            count: UserCounts {
                leads_assigned: db.leads_assigned,
                interactions: db.interaction_count,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct UserList {
    pub users: Vec<UserResponse>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct UserEnvelope {
    pub user: UserResponse,
}

/// Effective permissions of a user, as decided by the server
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserPermissionsResponse {
    #[schema(value_type = String, format = "uuid")]
    pub user_id: UserId,
    pub role: String,
    pub permissions: Vec<PermissionResponse>,
}

impl UserPermissionsResponse {
    pub fn new(user: &UserDBResponse, permissions: Vec<PermissionDBResponse>) -> Self {
        Self {
            user_id: user.id,
            role: user.role_name.clone().unwrap_or_else(|| VIEWER.to_string()),
            permissions: permissions.into_iter().map(PermissionResponse::from).collect(),
        }
    }
}
