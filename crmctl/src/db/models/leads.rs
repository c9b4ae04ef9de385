//! Database models for leads.

use crate::types::{LeadId, UserId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Pipeline stage of a lead, stored as TEXT in database
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, Hash, ToSchema)]
#[sqlx(type_name = "text", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LeadStatus {
    #[default]
    New,
    Contacted,
    Qualified,
    Proposal,
    Negotiation,
    ClosedWon,
    ClosedLost,
    OnHold,
}

/// Where a lead came from, stored as TEXT in database
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, Hash, ToSchema)]
#[sqlx(type_name = "text", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LeadSource {
    Website,
    Referral,
    SocialMedia,
    EmailCampaign,
    PhoneCall,
    TradeShow,
    #[default]
    Other,
}

/// Database request for creating a new lead
#[derive(Debug, Clone)]
pub struct LeadCreateDBRequest {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub position: Option<String>,
    pub status: LeadStatus,
    pub source: LeadSource,
    pub segment: Option<String>,
    pub potential_value: Option<Decimal>,
    pub notes: Option<String>,
    pub responsible_id: Option<UserId>,
    /// Tag names, upserted into `tags`
    pub tags: Vec<String>,
}

/// Database request for replacing a lead's fields.
///
/// Scalar fields are written as given, so `None` clears them. `status` and `source` keep their
/// current value when `None`. `tags` replaces the tag set when `Some`.
#[derive(Debug, Clone)]
pub struct LeadUpdateDBRequest {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub position: Option<String>,
    pub status: Option<LeadStatus>,
    pub source: Option<LeadSource>,
    pub segment: Option<String>,
    pub potential_value: Option<Decimal>,
    pub notes: Option<String>,
    pub responsible_id: Option<UserId>,
    pub tags: Option<Vec<String>>,
}

/// Database response for a lead with its responsible user, tag names and interaction count
#[derive(Debug, Clone)]
pub struct LeadDBResponse {
    pub id: LeadId,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub position: Option<String>,
    pub status: LeadStatus,
    pub source: LeadSource,
    pub segment: Option<String>,
    pub potential_value: Option<Decimal>,
    pub notes: Option<String>,
    pub responsible_id: Option<UserId>,
    pub responsible_name: Option<String>,
    pub responsible_email: Option<String>,
    pub last_interaction_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub interaction_count: i64,
    pub tags: Vec<String>,
    /// Only set by the priority listing
    pub priority_score: Option<i64>,
}
