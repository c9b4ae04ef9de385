//! API response models for the permission catalogue.

use std::collections::BTreeMap;

use crate::db::models::permissions::PermissionDBResponse;
use crate::types::PermissionId;
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PermissionResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: PermissionId,
    pub name: String,
    pub module: String,
    pub action: String,
    pub display_name: String,
    pub description: Option<String>,
}

impl From<PermissionDBResponse> for PermissionResponse {
    fn from(db: PermissionDBResponse) -> Self {
        Self {
            id: db.id,
            name: db.name,
            module: db.module,
            action: db.action,
            display_name: db.display_name,
            description: db.description,
        }
    }
}

/// Every permission, flat and grouped by module
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PermissionsResponse {
    pub permissions: Vec<PermissionResponse>,
    pub permissions_by_module: BTreeMap<String, Vec<PermissionResponse>>,
}

impl From<Vec<PermissionDBResponse>> for PermissionsResponse {
    fn from(rows: Vec<PermissionDBResponse>) -> Self {
        let permissions: Vec<PermissionResponse> = rows.into_iter().map(PermissionResponse::from).collect();
        let mut permissions_by_module: BTreeMap<String, Vec<PermissionResponse>> = BTreeMap::new();
        for permission in &permissions {
            permissions_by_module
                .entry(permission.module.clone())
                .or_default()
                .push(permission.clone());
        }
        Self {
            permissions,
            permissions_by_module,
        }
    }
}
