//! Database models for dashboard analytics queries.

use crate::db::models::{interactions::InteractionType, leads::LeadStatus};
use crate::types::{InteractionId, UserId};
use chrono::{DateTime, Utc};

/// Headline counters. `new_leads` and `total_interactions` are within the period.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DashboardCounts {
    pub total_leads: i64,
    pub new_leads: i64,
    pub total_interactions: i64,
    pub leads_converted: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct LeadStatusCount {
    pub status: LeadStatus,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct InteractionTypeCount {
    #[sqlx(rename = "type")]
    pub interaction_type: InteractionType,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct TopPerformer {
    pub id: UserId,
    pub name: String,
    pub interaction_count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct RecentActivity {
    pub id: InteractionId,
    pub user_name: String,
    pub lead_name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct DashboardDBResponse {
    pub period_days: i32,
    pub counts: DashboardCounts,
    pub leads_by_status: Vec<LeadStatusCount>,
    pub interactions_by_type: Vec<InteractionTypeCount>,
    pub top_performers: Vec<TopPerformer>,
    pub recent_activity: Vec<RecentActivity>,
}
