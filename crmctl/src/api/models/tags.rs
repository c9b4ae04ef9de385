//! API response models for tags and client settings.

use crate::db::models::tags::TagDBResponse;
use crate::types::TagId;
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TagResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: TagId,
    pub name: String,
    /// Hex colour, e.g. `#6B7280`
    pub color: String,
}

impl From<TagDBResponse> for TagResponse {
    fn from(db: TagDBResponse) -> Self {
        Self {
            id: db.id,
            name: db.name,
            color: db.color,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TagList {
    pub tags: Vec<TagResponse>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub available_tags: Vec<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SettingsResponse {
    pub settings: Settings,
}
