//! API request/response models for roles.

use crate::api::validation::PolicyRules;
use crate::db::models::roles::{RoleDBResponse, RolePermissionSummary};
use crate::types::RoleId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

#[derive(Debug, Clone, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RoleCreate {
    #[validate(
        length(min = 2, max = 50, message = "Must be between 2 and 50 characters"),
        custom(function = "crate::api::validation::role_name")
    )]
    pub name: String,
    #[validate(
        length(min = 2, max = 100, message = "Must be between 2 and 100 characters"),
        custom(function = "crate::api::validation::not_blank")
    )]
    pub display_name: String,
    #[validate(length(max = 500, message = "Must be at most 500 characters"))]
    pub description: Option<String>,
    /// Permission names, all of which must exist
    #[serde(default)]
    pub permissions: Vec<String>,
}

impl PolicyRules for RoleCreate {}

/// Absent fields keep their current value. `permissions`, when present, replaces the whole set.
#[derive(Debug, Clone, Default, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RoleUpdate {
    #[validate(
        length(min = 2, max = 50, message = "Must be between 2 and 50 characters"),
        custom(function = "crate::api::validation::role_name")
    )]
    pub name: Option<String>,
    #[validate(
        length(min = 2, max = 100, message = "Must be between 2 and 100 characters"),
        custom(function = "crate::api::validation::not_blank")
    )]
    pub display_name: Option<String>,
    #[validate(length(max = 500, message = "Must be at most 500 characters"))]
    pub description: Option<String>,
    pub is_active: Option<bool>,
    pub permissions: Option<Vec<String>>,
}

impl PolicyRules for RoleUpdate {}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RolePermission {
    pub name: String,
    pub display_name: String,
    pub module: String,
    pub action: String,
}

impl From<RolePermissionSummary> for RolePermission {
    fn from(p: RolePermissionSummary) -> Self {
        Self {
            name: p.name,
            display_name: p.display_name,
            module: p.module,
            action: p.action,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RoleResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: RoleId,
    pub name: String,
    pub display_name: String,
    pub description: Option<String>,
    pub is_active: bool,
    pub user_count: i64,
    pub permissions: Vec<RolePermission>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<RoleDBResponse> for RoleResponse {
    fn from(db: RoleDBResponse) -> Self {
        Self {
            id: db.id,
            name: db.name,
            display_name: db.display_name,
            description: db.description,
            is_active: db.is_active,
            user_count: db.user_count,
            permissions: db.permissions.into_iter().map(RolePermission::from).collect(),
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RoleList {
    pub roles: Vec<RoleResponse>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RoleEnvelope {
    pub role: RoleResponse,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::validation::collect_errors;
    use crate::config::Config;
    use crate::errors::ValidationErrors;

    fn errors_for<T: Validate + PolicyRules>(request: &T) -> ValidationErrors {
        collect_errors(request, &Config::default())
    }

    #[test]
    fn test_role_create_rules() {
        let ok: RoleCreate = serde_json::from_value(serde_json::json!({
            "name": "support",
            "displayName": "Support",
        }))
        .unwrap();
        assert!(errors_for(&ok).is_empty());
        assert!(ok.permissions.is_empty());

        let bad = RoleCreate {
            name: "Support-Team".to_string(),
            display_name: "S".to_string(),
            description: Some("x".repeat(501)),
            permissions: vec![],
        };
        let errors = errors_for(&bad);
        assert!(errors.has("name"));
        assert!(errors.has("displayName"));
        assert!(errors.has("description"));
    }

    #[test]
    fn test_role_update_only_checks_present_fields() {
        assert!(errors_for(&RoleUpdate::default()).is_empty());

        let update = RoleUpdate {
            name: Some("x".to_string()),
            ..Default::default()
        };
        assert!(errors_for(&update).has("name"));
    }
}
