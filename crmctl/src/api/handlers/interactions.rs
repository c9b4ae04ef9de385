use crate::api::handlers::leads::ensure_lead_access;
use crate::api::models::{
    auth::MessageResponse,
    interactions::{
        DEFAULT_INTERACTIONS_LIMIT, InteractionCreate, InteractionEnvelope, InteractionList, InteractionResponse, InteractionUpdate,
        ListInteractionsQuery,
    },
    users::CurrentUser,
};
use crate::api::validation::ValidatedJson;
use crate::auth::permissions::{RequiresPermission, can_access_lead, permission, restricts_to_owned_leads};
use crate::db::handlers::{Interactions, Repository, interactions::InteractionFilter};
use crate::db::models::interactions::{InteractionDBResponse, InteractionUpdateDBRequest};
use crate::errors::{Error, Result};
use crate::types::InteractionId;
use crate::AppState;
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use sqlx::PgConnection;

/// Fetch an interaction the user may act on, judged by the owner of its lead.
async fn accessible_interaction(conn: &mut PgConnection, user: &CurrentUser, id: InteractionId) -> Result<InteractionDBResponse> {
    let interaction = Interactions::new(conn)
        .get_by_id(id)
        .await?
        .ok_or_else(|| Error::not_found("Interaction", id))?;

    if !can_access_lead(user, interaction.lead_responsible_id) {
        return Err(Error::AccessDenied {
            resource: "lead".to_string(),
        });
    }
    Ok(interaction)
}

#[utoipa::path(
    get,
    path = "/interactions",
    tag = "interactions",
    summary = "List interactions",
    description = "Paginated interactions, newest first. Sales reps only see interactions on leads visible to them.",
    params(ListInteractionsQuery),
    responses(
        (status = 200, description = "Page of interactions", body = InteractionList),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Missing interactions.read"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_interactions(
    State(state): State<AppState>,
    Query(query): Query<ListInteractionsQuery>,
    current_user: RequiresPermission<permission::InteractionsRead>,
) -> Result<Json<InteractionList>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Interactions::new(&mut conn);

    let filter = InteractionFilter {
        lead_id: query.lead_id,
        user_id: query.user_id,
        visible_to: restricts_to_owned_leads(&current_user).then_some(current_user.id),
        ..InteractionFilter::new(
            query.pagination.skip(DEFAULT_INTERACTIONS_LIMIT),
            query.pagination.limit(DEFAULT_INTERACTIONS_LIMIT),
        )
    };

    let total = repo.count(&filter).await?;
    let interactions = repo.list(&filter).await?;

    Ok(Json(InteractionList {
        interactions: interactions.into_iter().map(InteractionResponse::from).collect(),
        pagination: query.pagination.meta(DEFAULT_INTERACTIONS_LIMIT, total),
    }))
}

#[utoipa::path(
    post,
    path = "/interactions",
    tag = "interactions",
    summary = "Record interaction",
    description = "Records an interaction by the acting user and stamps the lead's last interaction date.",
    request_body = InteractionCreate,
    responses(
        (status = 201, description = "Interaction recorded", body = InteractionEnvelope),
        (status = 400, description = "Invalid input"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Missing interactions.create or lead not visible to the user"),
        (status = 404, description = "Lead not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_interaction(
    State(state): State<AppState>,
    current_user: RequiresPermission<permission::InteractionsCreate>,
    ValidatedJson(request): ValidatedJson<InteractionCreate>,
) -> Result<(StatusCode, Json<InteractionEnvelope>)> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    ensure_lead_access(&mut conn, &current_user, request.lead_id).await?;

    let interaction = Interactions::new(&mut conn).create(&request.into_db_request(current_user.id)).await?;

    Ok((
        StatusCode::CREATED,
        Json(InteractionEnvelope {
            interaction: interaction.into(),
        }),
    ))
}

#[utoipa::path(
    put,
    path = "/interactions/{id}",
    tag = "interactions",
    summary = "Update interaction",
    description = "Fields left out of the body keep their current value.",
    request_body = InteractionUpdate,
    params(("id" = uuid::Uuid, Path, description = "Interaction ID")),
    responses(
        (status = 200, description = "Interaction updated", body = InteractionEnvelope),
        (status = 400, description = "Invalid input"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Missing interactions.update or lead not visible to the user"),
        (status = 404, description = "Interaction not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_interaction(
    State(state): State<AppState>,
    Path(id): Path<InteractionId>,
    current_user: RequiresPermission<permission::InteractionsUpdate>,
    ValidatedJson(request): ValidatedJson<InteractionUpdate>,
) -> Result<Json<InteractionEnvelope>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    accessible_interaction(&mut conn, &current_user, id).await?;

    let interaction = Interactions::new(&mut conn)
        .update(id, &InteractionUpdateDBRequest::from(request))
        .await
        .map_err(|e| Error::for_resource(e, "Interaction", id))?;
    Ok(Json(InteractionEnvelope {
        interaction: interaction.into(),
    }))
}

#[utoipa::path(
    delete,
    path = "/interactions/{id}",
    tag = "interactions",
    summary = "Delete interaction",
    params(("id" = uuid::Uuid, Path, description = "Interaction ID")),
    responses(
        (status = 200, description = "Interaction deleted", body = MessageResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Missing interactions.delete or lead not visible to the user"),
        (status = 404, description = "Interaction not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn delete_interaction(
    State(state): State<AppState>,
    Path(id): Path<InteractionId>,
    current_user: RequiresPermission<permission::InteractionsDelete>,
) -> Result<Json<MessageResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    accessible_interaction(&mut conn, &current_user, id).await?;

    if !Interactions::new(&mut conn).delete(id).await? {
        return Err(Error::not_found("Interaction", id));
    }
    Ok(Json(MessageResponse::new("Interaction deleted successfully")))
}
