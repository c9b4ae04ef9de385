use crate::api::models::health::{DatabaseHealth, HealthResponse, RecordCounts};
use crate::AppState;
use axum::{Json, extract::State, http::StatusCode};
use chrono::Utc;
use sqlx::{FromRow, PgPool};
use tracing::error;

#[derive(FromRow)]
struct DatabaseInfo {
    name: String,
    version: String,
    users: i64,
    leads: i64,
}

async fn database_info(db: &PgPool) -> Result<DatabaseInfo, sqlx::Error> {
    sqlx::query_as::<_, DatabaseInfo>(
        r#"
        SELECT
            current_database()::text AS name,
            split_part(version(), ' ', 2) AS version,
            (SELECT COUNT(*) FROM users) AS users,
            (SELECT COUNT(*) FROM leads) AS leads
        "#,
    )
    .fetch_one(db)
    .await
}

#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    summary = "Health check",
    description = "Database connectivity and record counts. Does not require authentication.",
    responses(
        (status = 200, description = "Service and database are up", body = HealthResponse),
        (status = 503, description = "Database unreachable", body = HealthResponse),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    match database_info(&state.db).await {
        Ok(info) => (
            StatusCode::OK,
            Json(HealthResponse {
                status: "OK".to_string(),
                timestamp: Utc::now(),
                database: DatabaseHealth {
                    status: "Connected".to_string(),
                    name: Some(info.name),
                    version: Some(info.version),
                    records: Some(RecordCounts {
                        users: info.users,
                        leads: info.leads,
                    }),
                },
            }),
        ),
        Err(e) => {
            error!("Health check failed: {e}");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse {
                    status: "ERROR".to_string(),
                    timestamp: Utc::now(),
                    database: DatabaseHealth {
                        status: "Disconnected".to_string(),
                        name: None,
                        version: None,
                        records: None,
                    },
                }),
            )
        }
    }
}
