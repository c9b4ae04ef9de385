use crate::api::models::{
    tags::{Settings, SettingsResponse, TagList, TagResponse},
    users::CurrentUser,
};
use crate::db::handlers::Tags;
use crate::errors::{Error, Result};
use crate::AppState;
use axum::{Json, extract::State};

#[utoipa::path(
    get,
    path = "/tags",
    tag = "tags",
    summary = "List tags",
    responses(
        (status = 200, description = "All tags, by name", body = TagList),
        (status = 401, description = "Unauthorized"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_tags(State(state): State<AppState>, _: CurrentUser) -> Result<Json<TagList>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let tags = Tags::new(&mut conn).list().await?;

    Ok(Json(TagList {
        tags: tags.into_iter().map(TagResponse::from).collect(),
    }))
}

#[utoipa::path(
    get,
    path = "/settings",
    tag = "tags",
    summary = "Client settings",
    description = "Values the client offers in pickers, such as the tag names in use.",
    responses(
        (status = 200, description = "Settings", body = SettingsResponse),
        (status = 401, description = "Unauthorized"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_settings(State(state): State<AppState>, _: CurrentUser) -> Result<Json<SettingsResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let tags = Tags::new(&mut conn).list().await?;

    Ok(Json(SettingsResponse {
        settings: Settings {
            available_tags: tags.into_iter().map(|t| t.name).collect(),
        },
    }))
}
