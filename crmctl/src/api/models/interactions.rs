//! API request/response models for interactions.

use super::pagination::{PageMeta, Pagination};
use crate::api::validation::PolicyRules;
use crate::db::models::interactions::{
    InteractionChannel, InteractionCreateDBRequest, InteractionDBResponse, InteractionResult, InteractionType,
    InteractionUpdateDBRequest,
};
use crate::types::{InteractionId, LeadId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

/// Default page size for interaction listings
pub const DEFAULT_INTERACTIONS_LIMIT: i64 = 50;

/// Query parameters for listing interactions
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ListInteractionsQuery {
    /// Pagination parameters (default limit: 50)
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,

    #[param(value_type = Option<String>, format = "uuid")]
    #[schema(value_type = Option<String>, format = "uuid")]
    pub lead_id: Option<LeadId>,

    #[param(value_type = Option<String>, format = "uuid")]
    #[schema(value_type = Option<String>, format = "uuid")]
    pub user_id: Option<UserId>,
}

#[derive(Debug, Clone, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct InteractionCreate {
    #[schema(value_type = String, format = "uuid")]
    pub lead_id: LeadId,
    #[serde(rename = "type")]
    pub interaction_type: InteractionType,
    pub channel: InteractionChannel,
    #[validate(custom(function = "crate::api::validation::optional_phone"))]
    pub phone_used: Option<String>,
    pub result: InteractionResult,
    /// Minutes, 0..=480
    #[validate(range(min = 0, max = 480, message = "Must be between 0 and 480"))]
    pub duration: Option<i32>,
    #[validate(length(max = 2000, message = "Must be at most 2000 characters"))]
    pub notes: Option<String>,
    pub scheduled_at: Option<DateTime<Utc>>,
    /// Defaults to the time of the request
    pub completed_at: Option<DateTime<Utc>>,
}

impl InteractionCreate {
    /// The acting user always becomes the interaction's author.
    pub fn into_db_request(self, user_id: UserId) -> InteractionCreateDBRequest {
        InteractionCreateDBRequest {
            lead_id: self.lead_id,
            user_id,
            interaction_type: self.interaction_type,
            channel: self.channel,
            phone_used: self.phone_used.filter(|p| !p.is_empty()),
            result: self.result,
            duration: self.duration,
            notes: self.notes,
            scheduled_at: self.scheduled_at,
            completed_at: self.completed_at,
        }
    }
}

impl PolicyRules for InteractionCreate {}

/// Absent fields keep their current value
#[derive(Debug, Clone, Default, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct InteractionUpdate {
    #[serde(rename = "type")]
    pub interaction_type: Option<InteractionType>,
    pub channel: Option<InteractionChannel>,
    #[validate(custom(function = "crate::api::validation::phone"))]
    pub phone_used: Option<String>,
    pub result: Option<InteractionResult>,
    #[validate(range(min = 0, max = 480, message = "Must be between 0 and 480"))]
    pub duration: Option<i32>,
    #[validate(length(max = 2000, message = "Must be at most 2000 characters"))]
    pub notes: Option<String>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<InteractionUpdate> for InteractionUpdateDBRequest {
    fn from(update: InteractionUpdate) -> Self {
        Self {
            interaction_type: update.interaction_type,
            channel: update.channel,
            phone_used: update.phone_used,
            result: update.result,
            duration: update.duration,
            notes: update.notes,
            scheduled_at: update.scheduled_at,
            completed_at: update.completed_at,
        }
    }
}

impl PolicyRules for InteractionUpdate {}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct InteractionUser {
    #[schema(value_type = String, format = "uuid")]
    pub id: UserId,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InteractionLead {
    #[schema(value_type = String, format = "uuid")]
    pub id: LeadId,
    pub name: String,
    pub company: Option<String>,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub responsible_id: Option<UserId>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InteractionResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: InteractionId,
    #[schema(value_type = String, format = "uuid")]
    pub lead_id: LeadId,
    #[schema(value_type = String, format = "uuid")]
    pub user_id: UserId,
    #[serde(rename = "type")]
    pub interaction_type: InteractionType,
    pub channel: InteractionChannel,
    pub phone_used: Option<String>,
    pub result: InteractionResult,
    pub duration: Option<i32>,
    pub notes: Option<String>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub user: InteractionUser,
    pub lead: InteractionLead,
}

impl From<InteractionDBResponse> for InteractionResponse {
    fn from(db: InteractionDBResponse) -> Self {
        Self {
            id: db.id,
            lead_id: db.lead_id,
            user_id: db.user_id,
            interaction_type: db.interaction_type,
            channel: db.channel,
            phone_used: db.phone_used,
            result: db.result,
            duration: db.duration,
            notes: db.notes,
            scheduled_at: db.scheduled_at,
            completed_at: db.completed_at,
            created_at: db.created_at,
            updated_at: db.updated_at,
            user: InteractionUser {
                id: db.user_id,
                name: db.user_name,
            },
            lead: InteractionLead {
                id: db.lead_id,
                name: db.lead_name,
                company: db.lead_company,
                responsible_id: db.lead_responsible_id,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct InteractionList {
    pub interactions: Vec<InteractionResponse>,
    pub pagination: PageMeta,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct InteractionEnvelope {
    pub interaction: InteractionResponse,
}
