use crate::api::models::permissions::PermissionsResponse;
use crate::auth::permissions::{RequiresPermission, permission};
use crate::db::handlers::Permissions;
use crate::errors::{Error, Result};
use crate::AppState;
use axum::{Json, extract::State};

#[utoipa::path(
    get,
    path = "/permissions",
    tag = "roles",
    summary = "List permissions",
    description = "Every permission, flat and grouped by module.",
    responses(
        (status = 200, description = "Permissions", body = PermissionsResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Missing users.manage_roles"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_permissions(
    State(state): State<AppState>,
    _: RequiresPermission<permission::UsersManageRoles>,
) -> Result<Json<PermissionsResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let permissions = Permissions::new(&mut conn).list().await?;

    Ok(Json(permissions.into()))
}

#[cfg(test)]
mod tests {
    use crate::test_utils::*;
    use serde_json::Value;
    use sqlx::PgPool;

    #[sqlx::test]
    #[test_log::test]
    async fn test_list_permissions_grouped_by_module(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let admin = create_test_user(&pool, "admin").await;
        let manager = create_test_user(&pool, "manager").await;

        let response = app.get("/api/permissions").add_header("authorization", bearer_header(&admin)).await;
        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["permissions"].as_array().unwrap().len(), 15);
        assert_eq!(body["permissionsByModule"]["leads"].as_array().unwrap().len(), 4);
        assert_eq!(body["permissionsByModule"]["users"].as_array().unwrap().len(), 5);

        app.get("/api/permissions")
            .add_header("authorization", bearer_header(&manager))
            .await
            .assert_status_forbidden();
    }
}
