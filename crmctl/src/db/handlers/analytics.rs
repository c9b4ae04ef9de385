//! Database queries for the analytics dashboard.

use sqlx::{FromRow, PgPool};
use tracing::instrument;

use crate::db::{
    errors::Result,
    models::analytics::{DashboardCounts, DashboardDBResponse, InteractionTypeCount, LeadStatusCount, RecentActivity, TopPerformer},
};

/// Number of users returned in `top_performers`
pub const TOP_PERFORMERS_LIMIT: i64 = 5;
/// Number of interactions returned in `recent_activity`
pub const RECENT_ACTIVITY_LIMIT: i64 = 10;

#[derive(Debug, FromRow)]
struct CountsRow {
    total_leads: i64,
    new_leads: i64,
    total_interactions: i64,
    leads_converted: i64,
}

/// Dashboard summary over the trailing `period_days` days. Callers validate the range.
#[instrument(skip(db), err)]
pub async fn get_dashboard(db: &PgPool, period_days: i32) -> Result<DashboardDBResponse> {
    let counts = sqlx::query_as::<_, CountsRow>(
        r#"
        SELECT
            (SELECT COUNT(*) FROM leads) AS total_leads,
            (SELECT COUNT(*) FROM leads WHERE created_at >= NOW() - make_interval(days => $1)) AS new_leads,
            (SELECT COUNT(*) FROM interactions WHERE created_at >= NOW() - make_interval(days => $1)) AS total_interactions,
            (SELECT COUNT(*) FROM leads WHERE status = 'CLOSED_WON') AS leads_converted
        "#,
    )
    .bind(period_days)
    .fetch_one(db)
    .await?;

    let leads_by_status = sqlx::query_as::<_, LeadStatusCount>(
        "SELECT status, COUNT(*) AS count FROM leads GROUP BY status ORDER BY count DESC, status",
    )
    .fetch_all(db)
    .await?;

    let interactions_by_type = sqlx::query_as::<_, InteractionTypeCount>(
        r#"
        SELECT type, COUNT(*) AS count
        FROM interactions
        WHERE created_at >= NOW() - make_interval(days => $1)
        GROUP BY type
        ORDER BY count DESC, type
        "#,
    )
    .bind(period_days)
    .fetch_all(db)
    .await?;

    let top_performers = sqlx::query_as::<_, TopPerformer>(
        r#"
        SELECT u.id, u.name, COUNT(i.id) AS interaction_count
        FROM users u
        LEFT JOIN interactions i ON u.id = i.user_id AND i.created_at >= NOW() - make_interval(days => $1)
        GROUP BY u.id, u.name
        ORDER BY interaction_count DESC, u.name
        LIMIT $2
        "#,
    )
    .bind(period_days)
    .bind(TOP_PERFORMERS_LIMIT)
    .fetch_all(db)
    .await?;

    let recent_activity = sqlx::query_as::<_, RecentActivity>(
        r#"
        SELECT i.id, u.name AS user_name, l.name AS lead_name, i.created_at
        FROM interactions i
        JOIN users u ON i.user_id = u.id
        JOIN leads l ON i.lead_id = l.id
        ORDER BY i.created_at DESC
        LIMIT $1
        "#,
    )
    .bind(RECENT_ACTIVITY_LIMIT)
    .fetch_all(db)
    .await?;

    Ok(DashboardDBResponse {
        period_days,
        counts: DashboardCounts {
            total_leads: counts.total_leads,
            new_leads: counts.new_leads,
            total_interactions: counts.total_interactions,
            leads_converted: counts.leads_converted,
        },
        leads_by_status,
        interactions_by_type,
        top_performers,
        recent_activity,
    })
}
