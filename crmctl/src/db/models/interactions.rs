//! Database models for interactions.

use crate::types::{InteractionId, LeadId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, Hash, ToSchema)]
#[sqlx(type_name = "text", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InteractionType {
    Call,
    Email,
    Meeting,
    Demo,
    FollowUp,
    Other,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, ToSchema)]
#[sqlx(type_name = "text", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InteractionChannel {
    Phone,
    Mobile,
    Email,
    VideoCall,
    InPerson,
    Chat,
    Other,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, ToSchema)]
#[sqlx(type_name = "text", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InteractionResult {
    Successful,
    NoAnswer,
    Busy,
    Voicemail,
    CallbackRequested,
    NotInterested,
    FollowUpNeeded,
    Closed,
}

/// Database request for creating a new interaction
#[derive(Debug, Clone)]
pub struct InteractionCreateDBRequest {
    pub lead_id: LeadId,
    pub user_id: UserId,
    pub interaction_type: InteractionType,
    pub channel: InteractionChannel,
    pub phone_used: Option<String>,
    pub result: InteractionResult,
    /// Minutes
    pub duration: Option<i32>,
    pub notes: Option<String>,
    pub scheduled_at: Option<DateTime<Utc>>,
    /// Defaults to now
    pub completed_at: Option<DateTime<Utc>>,
}

/// Database request for updating an interaction. `None` leaves the column unchanged.
#[derive(Debug, Clone, Default)]
pub struct InteractionUpdateDBRequest {
    pub interaction_type: Option<InteractionType>,
    pub channel: Option<InteractionChannel>,
    pub phone_used: Option<String>,
    pub result: Option<InteractionResult>,
    pub duration: Option<i32>,
    pub notes: Option<String>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Database response for an interaction joined with its lead and user
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct InteractionDBResponse {
    pub id: InteractionId,
    pub lead_id: LeadId,
    pub lead_name: String,
    pub lead_company: Option<String>,
    pub lead_responsible_id: Option<UserId>,
    pub user_id: UserId,
    pub user_name: String,
    #[sqlx(rename = "type")]
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
}
