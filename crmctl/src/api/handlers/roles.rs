use crate::api::models::{
    auth::MessageResponse,
    roles::{RoleCreate, RoleEnvelope, RoleList, RoleResponse, RoleUpdate},
    users::CurrentUser,
};
use crate::api::validation::ValidatedJson;
use crate::auth::permissions::{RequiresPermission, check_role_deactivation, check_role_deletion, check_role_rename, permission};
use crate::db::handlers::{Permissions, Repository, Roles, roles::RoleFilter};
use crate::db::models::roles::{RoleCreateDBRequest, RoleUpdateDBRequest};
use crate::errors::{Error, Result, ValidationErrors};
use crate::types::{RoleId, abbrev_uuid};
use crate::AppState;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use sqlx::PgConnection;
use tracing::info;

/// Every requested permission name must exist in the store.
async fn check_permissions_exist(conn: &mut PgConnection, names: &[String]) -> Result<()> {
    if names.is_empty() {
        return Ok(());
    }

    let known = Permissions::new(conn).get_by_names(names).await?;
    let mut errors = ValidationErrors::new();
    for name in names {
        if !known.iter().any(|p| &p.name == name) {
            errors.add("permissions", format!("Unknown permission: {name}"));
        }
    }
    errors.into_result()
}

#[utoipa::path(
    get,
    path = "/roles",
    tag = "roles",
    summary = "List roles",
    description = "Active roles with their user counts and permissions.",
    responses(
        (status = 200, description = "Roles", body = RoleList),
        (status = 401, description = "Unauthorized"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_roles(State(state): State<AppState>, _: CurrentUser) -> Result<Json<RoleList>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let roles = Roles::new(&mut conn).list(&RoleFilter::active()).await?;

    Ok(Json(RoleList {
        roles: roles.into_iter().map(RoleResponse::from).collect(),
    }))
}

#[utoipa::path(
    post,
    path = "/roles",
    tag = "roles",
    summary = "Create role",
    request_body = RoleCreate,
    responses(
        (status = 201, description = "Role created", body = RoleEnvelope),
        (status = 400, description = "Invalid input or unknown permission"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Missing users.manage_roles"),
        (status = 409, description = "Role name taken"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_role(
    State(state): State<AppState>,
    _: RequiresPermission<permission::UsersManageRoles>,
    ValidatedJson(request): ValidatedJson<RoleCreate>,
) -> Result<(StatusCode, Json<RoleEnvelope>)> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    check_permissions_exist(&mut conn, &request.permissions).await?;

    let role = Roles::new(&mut conn)
        .create(&RoleCreateDBRequest {
            name: request.name,
            display_name: request.display_name.trim().to_string(),
            description: request.description,
            permissions: request.permissions,
        })
        .await?;

    info!("Created role {} with {} permissions", role.name, role.permissions.len());
    Ok((StatusCode::CREATED, Json(RoleEnvelope { role: role.into() })))
}

#[utoipa::path(
    put,
    path = "/roles/{id}",
    tag = "roles",
    summary = "Update role",
    description = "Absent fields keep their value. A `permissions` list replaces the whole grant set. A deactivated role grants nothing. Reserved roles cannot be renamed or deactivated.",
    request_body = RoleUpdate,
    params(("id" = uuid::Uuid, Path, description = "Role ID")),
    responses(
        (status = 200, description = "Role updated", body = RoleEnvelope),
        (status = 400, description = "Invalid input or unknown permission"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Missing users.manage_roles or reserved role"),
        (status = 404, description = "Role not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_role(
    State(state): State<AppState>,
    Path(id): Path<RoleId>,
    _: RequiresPermission<permission::UsersManageRoles>,
    ValidatedJson(request): ValidatedJson<RoleUpdate>,
) -> Result<Json<RoleEnvelope>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let existing = Roles::new(&mut conn).get_by_id(id).await?.ok_or_else(|| Error::not_found("Role", id))?;

    check_role_rename(&existing.name, request.name.as_deref())?;
    check_role_deactivation(&existing.name, request.is_active)?;
    if let Some(permissions) = &request.permissions {
        check_permissions_exist(&mut conn, permissions).await?;
    }

    let role = Roles::new(&mut conn)
        .update(
            id,
            &RoleUpdateDBRequest {
                name: request.name,
                display_name: request.display_name.map(|d| d.trim().to_string()),
                description: request.description,
                is_active: request.is_active,
                permissions: request.permissions,
            },
        )
        .await
        .map_err(|e| Error::for_resource(e, "Role", id))?;

    Ok(Json(RoleEnvelope { role: role.into() }))
}

#[utoipa::path(
    delete,
    path = "/roles/{id}",
    tag = "roles",
    summary = "Delete role",
    description = "Reserved roles and roles still assigned to users cannot be deleted.",
    params(("id" = uuid::Uuid, Path, description = "Role ID")),
    responses(
        (status = 200, description = "Role deleted", body = MessageResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Missing users.manage_roles or reserved role"),
        (status = 404, description = "Role not found"),
        (status = 409, description = "Role still assigned to users"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn delete_role(
    State(state): State<AppState>,
    Path(id): Path<RoleId>,
    _: RequiresPermission<permission::UsersManageRoles>,
) -> Result<Json<MessageResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Roles::new(&mut conn);

    let role = repo.get_by_id(id).await?.ok_or_else(|| Error::not_found("Role", id))?;
    let user_count = repo.user_count(id).await?;
    check_role_deletion(&role.name, user_count)?;

    if !repo.delete(id).await? {
        return Err(Error::not_found("Role", id));
    }

    info!("Deleted role {} ({})", role.name, abbrev_uuid(&id));
    Ok(Json(MessageResponse::new("Role deleted successfully")))
}
