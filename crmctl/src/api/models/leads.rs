//! API request/response models for leads.

use super::{
    interactions::InteractionResponse,
    pagination::{PageMeta, Pagination},
    tags::TagResponse,
};
use crate::api::validation::PolicyRules;
use crate::db::models::leads::{LeadCreateDBRequest, LeadDBResponse, LeadSource, LeadStatus, LeadUpdateDBRequest};
use crate::types::{LeadId, UserId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

/// Default page size for lead listings
pub const DEFAULT_LEADS_LIMIT: i64 = 20;

/// Query parameters for listing leads
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ListLeadsQuery {
    /// Pagination parameters (default limit: 20)
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,

    /// Only leads in this status
    pub status: Option<LeadStatus>,

    /// Case-insensitive match against name, email or company
    pub search: Option<String>,

    /// Only leads assigned to this user
    #[param(value_type = Option<String>, format = "uuid")]
    #[schema(value_type = Option<String>, format = "uuid")]
    pub responsible_id: Option<UserId>,
}

/// Body for creating a lead, and for replacing one with `PUT`.
///
/// On update every scalar field is written as sent, so omitted fields are cleared. `status` and
/// `source` keep their current value when omitted, and `tags` are only replaced when present.
#[derive(Debug, Clone, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct LeadCreate {
    #[validate(
        length(min = 2, max = 255, message = "Must be between 2 and 255 characters"),
        custom(function = "crate::api::validation::not_blank")
    )]
    pub name: String,
    #[validate(custom(function = "crate::api::validation::optional_email"))]
    pub email: Option<String>,
    #[validate(custom(function = "crate::api::validation::optional_phone"))]
    pub phone: Option<String>,
    #[validate(length(max = 255, message = "Must be at most 255 characters"))]
    pub company: Option<String>,
    #[validate(length(max = 255, message = "Must be at most 255 characters"))]
    pub position: Option<String>,
    pub status: Option<LeadStatus>,
    pub source: Option<LeadSource>,
    #[validate(length(max = 100, message = "Must be at most 100 characters"))]
    pub segment: Option<String>,
    #[schema(value_type = Option<f64>)]
    #[validate(custom(function = "crate::api::validation::potential_value"))]
    pub potential_value: Option<Decimal>,
    #[validate(length(max = 2000, message = "Must be at most 2000 characters"))]
    pub notes: Option<String>,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub responsible_id: Option<UserId>,
    /// At most 10, each at most 50 characters
    #[validate(
        length(max = 10, message = "At most 10 tags are allowed"),
        custom(function = "crate::api::validation::tag_names")
    )]
    pub tags: Option<Vec<String>>,
}

impl PolicyRules for LeadCreate {}

pub type LeadUpdate = LeadCreate;

fn blank_to_none(value: &Option<String>) -> Option<String> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
}

fn clean_tags(tags: &[String]) -> Vec<String> {
    let mut cleaned: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags.iter().map(|t| t.trim()).filter(|t| !t.is_empty()) {
        if !cleaned.iter().any(|c| c == tag) {
            cleaned.push(tag.to_string());
        }
    }
    cleaned
}

impl LeadCreate {
    pub fn into_create_request(self) -> LeadCreateDBRequest {
        LeadCreateDBRequest {
            name: self.name.trim().to_string(),
            email: blank_to_none(&self.email).map(|e| e.to_lowercase()),
            phone: blank_to_none(&self.phone),
            company: blank_to_none(&self.company),
            position: blank_to_none(&self.position),
            status: self.status.unwrap_or_default(),
            source: self.source.unwrap_or_default(),
            segment: blank_to_none(&self.segment),
            potential_value: self.potential_value,
            notes: blank_to_none(&self.notes),
            responsible_id: self.responsible_id,
            tags: self.tags.as_deref().map(clean_tags).unwrap_or_default(),
        }
    }

    pub fn into_update_request(self) -> LeadUpdateDBRequest {
        LeadUpdateDBRequest {
            name: self.name.trim().to_string(),
            email: blank_to_none(&self.email).map(|e| e.to_lowercase()),
            phone: blank_to_none(&self.phone),
            company: blank_to_none(&self.company),
            position: blank_to_none(&self.position),
            status: self.status,
            source: self.source,
            segment: blank_to_none(&self.segment),
            potential_value: self.potential_value,
            notes: blank_to_none(&self.notes),
            responsible_id: self.responsible_id,
            tags: self.tags.as_deref().map(clean_tags),
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ResponsibleUser {
    #[schema(value_type = String, format = "uuid")]
    pub id: UserId,
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, Copy, Serialize, ToSchema)]
pub struct LeadCounts {
    pub interactions: i64,
}

/// Lead fields shared by the list and detail shapes
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LeadFields {
    #[schema(value_type = String, format = "uuid")]
    pub id: LeadId,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub position: Option<String>,
    pub status: LeadStatus,
    pub source: LeadSource,
    pub segment: Option<String>,
    #[schema(value_type = Option<f64>)]
    pub potential_value: Option<Decimal>,
    pub notes: Option<String>,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub responsible_id: Option<UserId>,
    pub responsible: Option<ResponsibleUser>,
    pub last_interaction_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(rename = "_count")]
    pub count: LeadCounts,
}

impl LeadFields {
    fn from_db(db: &LeadDBResponse) -> Self {
        let responsible = match (db.responsible_id, &db.responsible_name, &db.responsible_email) {
            (Some(id), Some(name), Some(email)) => Some(ResponsibleUser {
                id,
                name: name.clone(),
                email: email.clone(),
            }),
            _ => None,
        };
        Self {
            id: db.id,
            name: db.name.clone(),
            email: db.email.clone(),
            phone: db.phone.clone(),
            company: db.company.clone(),
            position: db.position.clone(),
            status: db.status,
            source: db.source,
            segment: db.segment.clone(),
            potential_value: db.potential_value,
            notes: db.notes.clone(),
            responsible_id: db.responsible_id,
            responsible,
            last_interaction_date: db.last_interaction_date,
            created_at: db.created_at,
            updated_at: db.updated_at,
            count: LeadCounts {
                interactions: db.interaction_count,
            },
        }
    }
}

/// Lead as returned by listings, with tag names
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LeadResponse {
    #[serde(flatten)]
    pub lead: LeadFields,
    pub tags: Vec<String>,
    /// Only present in the priority listing
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority_score: Option<i64>,
}

impl From<LeadDBResponse> for LeadResponse {
    fn from(db: LeadDBResponse) -> Self {
        Self {
            lead: LeadFields::from_db(&db),
            tags: db.tags,
            priority_score: db.priority_score,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LeadTag {
    pub tag: TagResponse,
}

/// Lead with full tag objects and its interaction history
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LeadDetail {
    #[serde(flatten)]
    pub lead: LeadFields,
    pub tags: Vec<LeadTag>,
    pub interactions: Vec<InteractionResponse>,
}

impl LeadDetail {
    pub fn new(db: LeadDBResponse, tags: Vec<TagResponse>, interactions: Vec<InteractionResponse>) -> Self {
        Self {
            lead: LeadFields::from_db(&db),
            tags: tags.into_iter().map(|tag| LeadTag { tag }).collect(),
            interactions,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LeadList {
    pub leads: Vec<LeadResponse>,
    pub pagination: PageMeta,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PriorityLeadList {
    pub leads: Vec<LeadResponse>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LeadEnvelope {
    pub lead: LeadResponse,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LeadDetailEnvelope {
    pub lead: LeadDetail,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::validation::collect_errors;
    use crate::config::Config;
    use crate::errors::ValidationErrors;

    fn parse(value: serde_json::Value) -> LeadCreate {
        serde_json::from_value(value).unwrap()
    }

    fn errors_for(request: &LeadCreate) -> ValidationErrors {
        collect_errors(request, &Config::default())
    }

    #[test]
    fn test_minimal_lead_defaults() {
        let request = parse(serde_json::json!({"name": "Jane Doe"}));
        assert!(errors_for(&request).is_empty());

        let db = request.into_create_request();
        assert_eq!(db.status, LeadStatus::New);
        assert_eq!(db.source, LeadSource::Other);
        assert!(db.tags.is_empty());
    }

    #[test]
    fn test_lead_rules() {
        let request = parse(serde_json::json!({
            "name": "J",
            "email": "nope",
            "phone": "12-34",
            "potentialValue": 1_000_000_000,
            "tags": ["a", "b", "c", "d", "e", "f", "g", "h", "i", "j", "k"],
        }));
        let errors = errors_for(&request);
        for field in ["name", "email", "phone", "potentialValue", "tags"] {
            assert!(errors.has(field), "expected an error for {field}");
        }
    }

    #[test]
    fn test_update_keeps_status_when_absent_and_dedupes_tags() {
        let request = parse(serde_json::json!({
            "name": " Jane ",
            "email": "JANE@Example.com",
            "tags": ["vip", " vip ", ""],
        }));
        let db = request.into_update_request();
        assert_eq!(db.name, "Jane");
        assert_eq!(db.email.as_deref(), Some("jane@example.com"));
        assert!(db.status.is_none());
        assert_eq!(db.tags, Some(vec!["vip".to_string()]));
    }

    #[test]
    fn test_unknown_status_fails_to_parse() {
        let result: Result<LeadCreate, _> = serde_json::from_value(serde_json::json!({"name": "Jane", "status": "MAYBE"}));
        assert!(result.is_err());
    }
}
