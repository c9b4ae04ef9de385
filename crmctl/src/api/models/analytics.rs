//! API request/response models for the analytics dashboard.

use crate::db::models::{
    analytics::{DashboardDBResponse, InteractionTypeCount, LeadStatusCount, RecentActivity, TopPerformer},
    interactions::InteractionType,
    leads::LeadStatus,
};
use crate::errors::{Error, ValidationErrors};
use crate::types::{InteractionId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, serde_as};
use utoipa::{IntoParams, ToSchema};

pub const DEFAULT_PERIOD_DAYS: i32 = 30;
pub const MAX_PERIOD_DAYS: i32 = 365;

#[serde_as]
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct DashboardQuery {
    /// Trailing window in days (default: 30, 1..=365)
    #[param(default = 30, minimum = 1, maximum = 365)]
    #[serde_as(as = "Option<DisplayFromStr>")]
    #[serde(default)]
    pub period: Option<i32>,
}

impl DashboardQuery {
    /// The requested period, rejected outside 1..=365.
    pub fn period_days(&self) -> Result<i32, Error> {
        let period = self.period.unwrap_or(DEFAULT_PERIOD_DAYS);
        if (1..=MAX_PERIOD_DAYS).contains(&period) {
            Ok(period)
        } else {
            let mut errors = ValidationErrors::new();
            errors.add("period", format!("Must be between 1 and {MAX_PERIOD_DAYS} days"));
            Err(Error::Validation { errors })
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    pub total_leads: i64,
    pub new_leads: i64,
    pub total_interactions: i64,
    pub leads_converted: i64,
    /// Percentage of leads in CLOSED_WON, rounded
    pub conversion_rate: i64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct StatusCount {
    pub status: LeadStatus,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TypeCount {
    #[serde(rename = "type")]
    pub interaction_type: InteractionType,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Performer {
    #[schema(value_type = String, format = "uuid")]
    pub id: UserId,
    pub name: String,
    pub interaction_count: i64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    #[schema(value_type = String, format = "uuid")]
    pub id: InteractionId,
    pub action: String,
    pub entity_type: String,
    pub user_name: String,
    pub lead_name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DashboardResponse {
    pub period: i32,
    pub summary: DashboardSummary,
    pub leads_by_status: Vec<StatusCount>,
    pub interactions_by_type: Vec<TypeCount>,
    pub top_performers: Vec<Performer>,
    pub recent_activity: Vec<Activity>,
}

/// Rounded percentage, 0 when there is nothing to divide by
pub fn conversion_rate(converted: i64, total: i64) -> i64 {
    if total <= 0 {
        return 0;
    }
    ((converted as f64 / total as f64) * 100.0).round() as i64
}

impl From<DashboardDBResponse> for DashboardResponse {
    fn from(db: DashboardDBResponse) -> Self {
        let counts = db.counts;
        Self {
            period: db.period_days,
            summary: DashboardSummary {
                total_leads: counts.total_leads,
                new_leads: counts.new_leads,
                total_interactions: counts.total_interactions,
                leads_converted: counts.leads_converted,
                conversion_rate: conversion_rate(counts.leads_converted, counts.total_leads),
            },
            leads_by_status: db
                .leads_by_status
                .into_iter()
                .map(|LeadStatusCount { status, count }| StatusCount { status, count })
                .collect(),
            interactions_by_type: db
                .interactions_by_type
                .into_iter()
                .map(|InteractionTypeCount { interaction_type, count }| TypeCount { interaction_type, count })
                .collect(),
            top_performers: db
                .top_performers
                .into_iter()
                .map(|TopPerformer { id, name, interaction_count }| Performer {
                    id,
                    name,
                    interaction_count,
                })
                .collect(),
            recent_activity: db
                .recent_activity
                .into_iter()
                .map(|RecentActivity { id, user_name, lead_name, created_at }| Activity {
                    id,
                    action: "INTERACTION_CREATED".to_string(),
                    entity_type: "Interaction".to_string(),
                    user_name,
                    lead_name,
                    created_at,
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversion_rate_rounds() {
        assert_eq!(conversion_rate(0, 0), 0);
        assert_eq!(conversion_rate(1, 3), 33);
        assert_eq!(conversion_rate(2, 3), 67);
        assert_eq!(conversion_rate(5, 5), 100);
    }

    #[test]
    fn test_period_bounds() {
        assert_eq!(DashboardQuery::default().period_days().unwrap(), 30);
        assert_eq!(DashboardQuery { period: Some(365) }.period_days().unwrap(), 365);
        assert!(DashboardQuery { period: Some(0) }.period_days().is_err());
        assert!(DashboardQuery { period: Some(366) }.period_days().is_err());
    }
}
