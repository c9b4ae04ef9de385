use crate::api::models::{
    auth::MessageResponse,
    pagination::MAX_LIMIT,
    users::{CurrentUser, ListUsersQuery, UserCreate, UserEnvelope, UserList, UserPermissionsResponse, UserResponse, UserUpdate},
};
use crate::api::validation::ValidatedJson;
use crate::auth::{
    password,
    permissions::{PermissionRequirement, RequiresPermission, can_access_user, check_user_deletion, permission, require_permission},
};
use crate::db::handlers::{Repository, Users, users::UserFilter};
use crate::db::models::users::{UserCreateDBRequest, UserDBResponse, UserUpdateDBRequest};
use crate::errors::{Error, Result};
use crate::types::{UserId, abbrev_uuid};
use crate::AppState;
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use sqlx::PgConnection;
use tracing::info;

const DUPLICATE_EMAIL: &str = "An account with this email address already exists";

/// Fetch a user the acting user may see: themselves, or anyone for administrators.
async fn accessible_user(conn: &mut PgConnection, current_user: &CurrentUser, id: UserId) -> Result<UserDBResponse> {
    let user = Users::new(conn).get_by_id(id).await?.ok_or_else(|| Error::not_found("User", id))?;
    if !can_access_user(current_user, id) {
        return Err(Error::AccessDenied {
            resource: "user".to_string(),
        });
    }
    Ok(user)
}

#[utoipa::path(
    get,
    path = "/users",
    tag = "users",
    summary = "List users",
    description = "Users with their role, profile and lead/interaction counts, newest first.",
    params(ListUsersQuery),
    responses(
        (status = 200, description = "Users", body = UserList),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Missing users.read"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_users(
    State(state): State<AppState>,
    Query(query): Query<ListUsersQuery>,
    _: RequiresPermission<permission::UsersRead>,
) -> Result<Json<UserList>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let filter = UserFilter::new(query.pagination.skip(MAX_LIMIT), query.pagination.limit(MAX_LIMIT));
    let users = Users::new(&mut conn).list(&filter).await?;

    Ok(Json(UserList {
        users: users.into_iter().map(UserResponse::from).collect(),
    }))
}

#[utoipa::path(
    get,
    path = "/users/{id}",
    tag = "users",
    summary = "Get user",
    params(("id" = uuid::Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "User", body = UserEnvelope),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Not allowed to see this user"),
        (status = 404, description = "User not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_user(State(state): State<AppState>, Path(id): Path<UserId>, current_user: CurrentUser) -> Result<Json<UserEnvelope>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let user = accessible_user(&mut conn, &current_user, id).await?;

    Ok(Json(UserEnvelope { user: user.into() }))
}

#[utoipa::path(
    post,
    path = "/users",
    tag = "users",
    summary = "Create user",
    request_body = UserCreate,
    responses(
        (status = 201, description = "User created", body = UserEnvelope),
        (status = 400, description = "Invalid input"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Missing users.create"),
        (status = 409, description = "Email already registered"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_user(
    State(state): State<AppState>,
    _: RequiresPermission<permission::UsersCreate>,
    ValidatedJson(request): ValidatedJson<UserCreate>,
) -> Result<(StatusCode, Json<UserEnvelope>)> {
    let email = request.email.trim().to_lowercase();

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    if Users::new(&mut conn).email_taken(&email, None).await? {
        return Err(Error::Conflict {
            message: DUPLICATE_EMAIL.to_string(),
        });
    }

    let profile = request.profile();
    let password_hash = password::hash_password(request.password, state.config.auth.password.argon2_params()).await?;

    let user = Users::new(&mut conn)
        .create(&UserCreateDBRequest {
            name: request.name.trim().to_string(),
            email,
            phone: request.phone.filter(|p| !p.is_empty()),
            password_hash: Some(password_hash),
            role_id: request.role_id,
            status: request.status.unwrap_or_default(),
            email_verified: false,
            profile,
        })
        .await?;

    info!("Created user {}", abbrev_uuid(&user.id));
    Ok((StatusCode::CREATED, Json(UserEnvelope { user: user.into() })))
}

#[utoipa::path(
    put,
    path = "/users/{id}",
    tag = "users",
    summary = "Update user",
    description = "Absent fields keep their value. Changing role or status also requires users.manage_roles.",
    request_body = UserUpdate,
    params(("id" = uuid::Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "User updated", body = UserEnvelope),
        (status = 400, description = "Invalid input"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Missing permission or not allowed to modify this user"),
        (status = 404, description = "User not found"),
        (status = 409, description = "Email already registered"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<UserId>,
    current_user: RequiresPermission<permission::UsersUpdate>,
    ValidatedJson(request): ValidatedJson<UserUpdate>,
) -> Result<Json<UserEnvelope>> {
    if request.changes_access() {
        require_permission(&current_user, permission::UsersManageRoles::NAME)?;
    }

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    accessible_user(&mut conn, &current_user, id).await?;

    let email = request.email.as_deref().map(|e| e.trim().to_lowercase());
    if let Some(email) = &email
        && Users::new(&mut conn).email_taken(email, Some(id)).await?
    {
        return Err(Error::Conflict {
            message: DUPLICATE_EMAIL.to_string(),
        });
    }

    let password_hash = match request.password.clone().filter(|p| !p.is_empty()) {
        Some(new_password) => Some(password::hash_password(new_password, state.config.auth.password.argon2_params()).await?),
        None => None,
    };

    let update = UserUpdateDBRequest {
        name: request.name.as_deref().map(|n| n.trim().to_string()),
        email,
        phone: request.phone.clone(),
        password_hash,
        role_id: request.role_id,
        status: request.status,
        profile: request.profile(),
    };
    let user = Users::new(&mut conn)
        .update(id, &update)
        .await
        .map_err(|e| Error::for_resource(e, "User", id))?;

    Ok(Json(UserEnvelope { user: user.into() }))
}

#[utoipa::path(
    delete,
    path = "/users/{id}",
    tag = "users",
    summary = "Delete user",
    description = "Users cannot delete themselves, the bootstrap administrator, or (unless super_admin) a super_admin.",
    params(("id" = uuid::Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "User deleted", body = MessageResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Missing users.delete or protected account"),
        (status = 404, description = "User not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<UserId>,
    current_user: RequiresPermission<permission::UsersDelete>,
) -> Result<Json<MessageResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let target = accessible_user(&mut conn, &current_user, id).await?;

    check_user_deletion(
        &current_user,
        target.id,
        &target.email,
        target.role_name.as_deref(),
        &state.config.admin_email,
    )?;

    if !Users::new(&mut conn).delete(id).await? {
        return Err(Error::not_found("User", id));
    }

    info!("User {} deleted user {}", abbrev_uuid(&current_user.id), abbrev_uuid(&id));
    Ok(Json(MessageResponse::new("User deleted successfully")))
}

#[utoipa::path(
    get,
    path = "/users/{id}/permissions",
    tag = "users",
    summary = "Get user permissions",
    description = "The permissions granted by the user's active role, as the server evaluates them.",
    params(("id" = uuid::Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "Effective permissions", body = UserPermissionsResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Not allowed to see this user"),
        (status = 404, description = "User not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_user_permissions(
    State(state): State<AppState>,
    Path(id): Path<UserId>,
    current_user: CurrentUser,
) -> Result<Json<UserPermissionsResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let user = accessible_user(&mut conn, &current_user, id).await?;
    let permissions = Users::new(&mut conn).permissions_for(id).await?;

    Ok(Json(UserPermissionsResponse::new(&user, permissions)))
}

#[cfg(test)]
mod tests {
    use crate::db::handlers::Roles;
    use crate::test_utils::*;
    use axum::http::StatusCode;
    use serde_json::{Value, json};
    use sqlx::PgPool;

    async fn role_id(pool: &PgPool, name: &str) -> uuid::Uuid {
        let mut conn = pool.acquire().await.unwrap();
        Roles::new(&mut conn).get_by_name(name).await.unwrap().unwrap().id
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_admin_deletes_sales_rep_but_not_super_admin(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let admin = create_test_user(&pool, "admin").await;
        let rep = create_test_user(&pool, "sales_rep").await;
        let super_admin = create_test_user(&pool, "super_admin").await;

        let response = app
            .delete(&format!("/api/users/{}", rep.id))
            .add_header("authorization", bearer_header(&admin))
            .await;
        response.assert_status_ok();
        assert_eq!(response.json::<Value>()["message"], "User deleted successfully");

        let response = app
            .delete(&format!("/api/users/{}", super_admin.id))
            .add_header("authorization", bearer_header(&admin))
            .await;
        response.assert_status_forbidden();
        assert_eq!(response.json::<Value>()["code"], "PROTECTED_ACCOUNT");

        // A super admin may remove another super admin
        let other_super_admin = create_test_user(&pool, "super_admin").await;
        let response = app
            .delete(&format!("/api/users/{}", other_super_admin.id))
            .add_header("authorization", bearer_header(&super_admin))
            .await;
        response.assert_status_ok();
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_delete_guards(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let super_admin = create_test_user(&pool, "super_admin").await;

        let response = app
            .delete(&format!("/api/users/{}", super_admin.id))
            .add_header("authorization", bearer_header(&super_admin))
            .await;
        response.assert_status_forbidden();
        assert_eq!(response.json::<Value>()["code"], "CANNOT_DELETE_SELF");

        // The configured bootstrap account is never deletable
        let params = create_test_config().auth.password.argon2_params();
        let bootstrap_id = crate::create_initial_admin_user("ADMIN@test.com", TEST_PASSWORD, params, &pool)
            .await
            .unwrap();
        let response = app
            .delete(&format!("/api/users/{bootstrap_id}"))
            .add_header("authorization", bearer_header(&super_admin))
            .await;
        response.assert_status_forbidden();
        assert_eq!(response.json::<Value>()["code"], "PROTECTED_ACCOUNT");

        let response = app
            .delete(&format!("/api/users/{}", uuid::Uuid::new_v4()))
            .add_header("authorization", bearer_header(&super_admin))
            .await;
        response.assert_status_not_found();
        assert_eq!(response.json::<Value>()["code"], "USER_NOT_FOUND");
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_create_user_and_reject_duplicate_email(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let admin = create_test_user(&pool, "admin").await;
        let viewer_role = role_id(&pool, "viewer").await;

        let body = json!({
            "name": "New Colleague",
            "email": "New.Colleague@Example.com",
            "password": "Str0ng-Password",
            "roleId": viewer_role,
            "department": "Sales"
        });

        let response = app
            .post("/api/users")
            .add_header("authorization", bearer_header(&admin))
            .json(&body)
            .await;
        response.assert_status(StatusCode::CREATED);
        let created: Value = response.json();
        assert_eq!(created["user"]["email"], "new.colleague@example.com");
        assert_eq!(created["user"]["role"], "viewer");
        assert_eq!(created["user"]["status"], "ACTIVE");
        assert_eq!(created["user"]["department"], "Sales");
        assert!(created["user"].get("passwordHash").is_none());

        let response = app
            .post("/api/users")
            .add_header("authorization", bearer_header(&admin))
            .json(&body)
            .await;
        response.assert_status(StatusCode::CONFLICT);
        assert_eq!(response.json::<Value>()["code"], "DUPLICATE_ENTRY");

        // The new account can log in straight away
        let login = app
            .post("/api/auth/login")
            .json(&json!({ "email": "new.colleague@example.com", "password": "Str0ng-Password" }))
            .await;
        login.assert_status_ok();
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_create_user_rejects_weak_password(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let admin = create_test_user(&pool, "admin").await;

        let response = app
            .post("/api/users")
            .add_header("authorization", bearer_header(&admin))
            .json(&json!({ "name": "Weak", "email": "weak@example.com", "password": "password" }))
            .await;

        response.assert_status_bad_request();
        let body: Value = response.json();
        assert_eq!(body["code"], "VALIDATION_ERROR");
        assert_eq!(body["details"][0]["field"], "password");
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_users_only_read_themselves_unless_admin(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let manager = create_test_user(&pool, "manager").await;
        let rep = create_test_user(&pool, "sales_rep").await;
        let admin = create_test_user(&pool, "admin").await;

        let own = app
            .get(&format!("/api/users/{}", rep.id))
            .add_header("authorization", bearer_header(&rep))
            .await;
        own.assert_status_ok();
        assert_eq!(own.json::<Value>()["user"]["email"], json!(rep.email));

        let other = app
            .get(&format!("/api/users/{}", rep.id))
            .add_header("authorization", bearer_header(&manager))
            .await;
        other.assert_status_forbidden();
        assert_eq!(other.json::<Value>()["code"], "USER_ACCESS_DENIED");

        let as_admin = app
            .get(&format!("/api/users/{}", rep.id))
            .add_header("authorization", bearer_header(&admin))
            .await;
        as_admin.assert_status_ok();

        // Listing needs users.read, which sales reps lack
        let list = app.get("/api/users").add_header("authorization", bearer_header(&rep)).await;
        list.assert_status_forbidden();
        let list = app.get("/api/users").add_header("authorization", bearer_header(&manager)).await;
        list.assert_status_ok();
        assert!(list.json::<Value>()["users"].as_array().unwrap().len() >= 3);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_update_user_role_change_and_deactivation(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let admin = create_test_user(&pool, "admin").await;
        let rep = create_test_user(&pool, "sales_rep").await;
        let manager_role = role_id(&pool, "manager").await;

        let response = app
            .put(&format!("/api/users/{}", rep.id))
            .add_header("authorization", bearer_header(&admin))
            .json(&json!({ "roleId": manager_role, "position": "Team lead" }))
            .await;
        response.assert_status_ok();
        let updated: Value = response.json();
        assert_eq!(updated["user"]["role"], "manager");
        assert_eq!(updated["user"]["position"], "Team lead");
        assert_eq!(updated["user"]["name"], json!(rep.name));

        // The old token now resolves to the new role
        let permissions = app
            .get(&format!("/api/users/{}/permissions", rep.id))
            .add_header("authorization", bearer_header(&rep))
            .await;
        permissions.assert_status_ok();
        assert_eq!(permissions.json::<Value>()["role"], "manager");

        let response = app
            .put(&format!("/api/users/{}", rep.id))
            .add_header("authorization", bearer_header(&admin))
            .json(&json!({ "status": "INACTIVE" }))
            .await;
        response.assert_status_ok();

        let me = app.get("/api/auth/me").add_header("authorization", bearer_header(&rep)).await;
        me.assert_status_unauthorized();
        assert_eq!(me.json::<Value>()["code"], "INVALID_USER");
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_user_permissions_lists_role_grants(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let viewer = create_test_user(&pool, "viewer").await;

        let response = app
            .get(&format!("/api/users/{}/permissions", viewer.id))
            .add_header("authorization", bearer_header(&viewer))
            .await;

        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["userId"], json!(viewer.id));
        let mut names: Vec<&str> = body["permissions"]
            .as_array()
            .unwrap()
            .iter()
            .map(|p| p["name"].as_str().unwrap())
            .collect();
        names.sort();
        assert_eq!(names, vec!["analytics.read", "interactions.read", "leads.read"]);
    }
}
