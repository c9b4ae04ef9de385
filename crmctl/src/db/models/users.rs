//! Database models for users and their profiles.

use crate::types::{RoleId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Account status stored as TEXT in database. Only ACTIVE users can log in.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, ToSchema)]
#[sqlx(type_name = "text", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserStatus {
    #[default]
    Active,
    Inactive,
    Suspended,
}

/// Optional profile fields kept in `user_profiles`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileFields {
    pub department: Option<String>,
    pub position: Option<String>,
    pub bio: Option<String>,
}

impl ProfileFields {
    pub fn is_empty(&self) -> bool {
        self.department.is_none() && self.position.is_none() && self.bio.is_none()
    }
}

/// Database request for creating a new user
#[derive(Debug, Clone)]
pub struct UserCreateDBRequest {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub password_hash: Option<String>,
    pub role_id: Option<RoleId>,
    pub status: UserStatus,
    pub email_verified: bool,
    pub profile: ProfileFields,
}

/// Database request for updating a user. `None` leaves the column unchanged.
#[derive(Debug, Clone, Default)]
pub struct UserUpdateDBRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    /// Also stamps `password_changed_at`
    pub password_hash: Option<String>,
    pub role_id: Option<RoleId>,
    pub status: Option<UserStatus>,
    pub profile: ProfileFields,
}

/// Database response for a user, joined with role and profile
#[derive(Debug, Clone)]
pub struct UserDBResponse {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub password_hash: Option<String>,
    pub role_id: Option<RoleId>,
    pub role_name: Option<String>,
    pub role_display_name: Option<String>,
    pub status: UserStatus,
    pub email_verified: bool,
    pub last_login: Option<DateTime<Utc>>,
    pub password_changed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub profile: ProfileFields,
    pub leads_assigned: i64,
    pub interaction_count: i64,
}

/// Identity, role and permission union of an ACTIVE user.
#[derive(Debug, Clone)]
pub struct UserAuthContext {
    pub id: UserId,
    pub email: String,
    pub name: String,
    pub role_name: Option<String>,
    pub role_display_name: Option<String>,
    pub permissions: Vec<String>,
}
