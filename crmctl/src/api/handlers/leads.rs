use crate::api::models::{
    auth::MessageResponse,
    interactions::InteractionResponse,
    leads::{
        DEFAULT_LEADS_LIMIT, LeadCreate, LeadDetail, LeadDetailEnvelope, LeadEnvelope, LeadList, LeadResponse, LeadUpdate, ListLeadsQuery,
        PriorityLeadList,
    },
    tags::TagResponse,
    users::CurrentUser,
};
use crate::api::validation::ValidatedJson;
use crate::auth::permissions::{RequiresPermission, can_access_lead, permission, restricts_to_owned_leads};
use crate::db::handlers::{Interactions, Leads, Repository, Tags, interactions::InteractionFilter, leads::LeadFilter};
use crate::errors::{Error, Result};
use crate::types::{LeadId, abbrev_uuid};
use crate::AppState;
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use sqlx::PgConnection;
use tracing::debug;

/// Look up the lead's owner and apply the visibility rule for `user`.
///
/// Unknown leads are `LEAD_NOT_FOUND`; leads the user may not see are `LEAD_ACCESS_DENIED`.
pub(crate) async fn ensure_lead_access(conn: &mut PgConnection, user: &CurrentUser, id: LeadId) -> Result<()> {
    let owner = Leads::new(conn).owner_of(id).await?.ok_or_else(|| Error::not_found("Lead", id))?;
    if can_access_lead(user, owner) {
        Ok(())
    } else {
        debug!("User {} denied access to lead {}", abbrev_uuid(&user.id), abbrev_uuid(&id));
        Err(Error::AccessDenied {
            resource: "lead".to_string(),
        })
    }
}

#[utoipa::path(
    get,
    path = "/leads",
    tag = "leads",
    summary = "List leads",
    description = "Paginated leads, newest first. Sales reps only see leads assigned to them or unassigned.",
    params(ListLeadsQuery),
    responses(
        (status = 200, description = "Page of leads", body = LeadList),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Missing leads.read"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_leads(
    State(state): State<AppState>,
    Query(query): Query<ListLeadsQuery>,
    current_user: RequiresPermission<permission::LeadsRead>,
) -> Result<Json<LeadList>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Leads::new(&mut conn);

    let filter = LeadFilter {
        status: query.status,
        search: query.search.clone(),
        responsible_id: query.responsible_id,
        visible_to: restricts_to_owned_leads(&current_user).then_some(current_user.id),
        ..LeadFilter::new(query.pagination.skip(DEFAULT_LEADS_LIMIT), query.pagination.limit(DEFAULT_LEADS_LIMIT))
    };

    let total = repo.count(&filter).await?;
    let leads = repo.list(&filter).await?;

    Ok(Json(LeadList {
        leads: leads.into_iter().map(LeadResponse::from).collect(),
        pagination: query.pagination.meta(DEFAULT_LEADS_LIMIT, total),
    }))
}

#[utoipa::path(
    get,
    path = "/leads/priority/list",
    tag = "leads",
    summary = "List leads by priority",
    description = "Every visible lead, highest priority score first.",
    responses(
        (status = 200, description = "Leads with their priority score", body = PriorityLeadList),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Missing leads.read"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_priority_leads(
    State(state): State<AppState>,
    current_user: RequiresPermission<permission::LeadsRead>,
) -> Result<Json<PriorityLeadList>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let visible_to = restricts_to_owned_leads(&current_user).then_some(current_user.id);
    let leads = Leads::new(&mut conn).priority_list(visible_to).await?;

    Ok(Json(PriorityLeadList {
        leads: leads.into_iter().map(LeadResponse::from).collect(),
    }))
}

#[utoipa::path(
    get,
    path = "/leads/{id}",
    tag = "leads",
    summary = "Get lead",
    description = "A lead with its tags and full interaction history.",
    params(("id" = uuid::Uuid, Path, description = "Lead ID")),
    responses(
        (status = 200, description = "Lead details", body = LeadDetailEnvelope),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Missing leads.read or not visible to the user"),
        (status = 404, description = "Lead not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_lead(
    State(state): State<AppState>,
    Path(id): Path<LeadId>,
    current_user: RequiresPermission<permission::LeadsRead>,
) -> Result<Json<LeadDetailEnvelope>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    ensure_lead_access(&mut conn, &current_user, id).await?;

    let lead = Leads::new(&mut conn).get_by_id(id).await?.ok_or_else(|| Error::not_found("Lead", id))?;
    let tags = Tags::new(&mut conn).for_lead(id).await?;

    // the detail view carries the whole history
    let history = InteractionFilter {
        lead_id: Some(id),
        ..InteractionFilter::new(0, i64::MAX)
    };
    let interactions = Interactions::new(&mut conn).list(&history).await?;

    Ok(Json(LeadDetailEnvelope {
        lead: LeadDetail::new(
            lead,
            tags.into_iter().map(TagResponse::from).collect(),
            interactions.into_iter().map(InteractionResponse::from).collect(),
        ),
    }))
}

#[utoipa::path(
    post,
    path = "/leads",
    tag = "leads",
    summary = "Create lead",
    request_body = LeadCreate,
    responses(
        (status = 201, description = "Lead created", body = LeadEnvelope),
        (status = 400, description = "Invalid input"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Missing leads.create"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_lead(
    State(state): State<AppState>,
    _: RequiresPermission<permission::LeadsCreate>,
    ValidatedJson(request): ValidatedJson<LeadCreate>,
) -> Result<(StatusCode, Json<LeadEnvelope>)> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let lead = Leads::new(&mut conn).create(&request.into_create_request()).await?;

    Ok((StatusCode::CREATED, Json(LeadEnvelope { lead: lead.into() })))
}

#[utoipa::path(
    put,
    path = "/leads/{id}",
    tag = "leads",
    summary = "Replace lead",
    description = "Writes every field as sent. Tags are replaced only when the body includes them.",
    request_body = LeadCreate,
    params(("id" = uuid::Uuid, Path, description = "Lead ID")),
    responses(
        (status = 200, description = "Lead updated", body = LeadEnvelope),
        (status = 400, description = "Invalid input"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Missing leads.update or not visible to the user"),
        (status = 404, description = "Lead not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_lead(
    State(state): State<AppState>,
    Path(id): Path<LeadId>,
    current_user: RequiresPermission<permission::LeadsUpdate>,
    ValidatedJson(request): ValidatedJson<LeadUpdate>,
) -> Result<Json<LeadEnvelope>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    ensure_lead_access(&mut conn, &current_user, id).await?;

    let lead = Leads::new(&mut conn)
        .update(id, &request.into_update_request())
        .await
        .map_err(|e| Error::for_resource(e, "Lead", id))?;
    Ok(Json(LeadEnvelope { lead: lead.into() }))
}

#[utoipa::path(
    delete,
    path = "/leads/{id}",
    tag = "leads",
    summary = "Delete lead",
    description = "Removes the lead together with its tags and interactions.",
    params(("id" = uuid::Uuid, Path, description = "Lead ID")),
    responses(
        (status = 200, description = "Lead deleted", body = MessageResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Missing leads.delete or not visible to the user"),
        (status = 404, description = "Lead not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn delete_lead(
    State(state): State<AppState>,
    Path(id): Path<LeadId>,
    current_user: RequiresPermission<permission::LeadsDelete>,
) -> Result<Json<MessageResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    ensure_lead_access(&mut conn, &current_user, id).await?;

    if !Leads::new(&mut conn).delete(id).await? {
        return Err(Error::not_found("Lead", id));
    }
    Ok(Json(MessageResponse::new("Lead deleted successfully")))
}
