use crate::api::models::analytics::{DashboardQuery, DashboardResponse};
use crate::auth::permissions::{RequiresPermission, permission};
use crate::db::handlers::analytics::get_dashboard;
use crate::errors::Result;
use crate::AppState;
use axum::{
    Json,
    extract::{Query, State},
};

#[utoipa::path(
    get,
    path = "/analytics/dashboard",
    tag = "analytics",
    summary = "Dashboard",
    description = "Lead and interaction summary over a trailing window of `period` days.",
    params(DashboardQuery),
    responses(
        (status = 200, description = "Dashboard data", body = DashboardResponse),
        (status = 400, description = "Period outside 1..=365"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Missing analytics.read"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_dashboard_analytics(
    State(state): State<AppState>,
    Query(query): Query<DashboardQuery>,
    _: RequiresPermission<permission::AnalyticsRead>,
) -> Result<Json<DashboardResponse>> {
    let period_days = query.period_days()?;
    let dashboard = get_dashboard(&state.db, period_days).await?;

    Ok(Json(dashboard.into()))
}
