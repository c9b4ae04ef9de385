use crate::api::models::{
    auth::{LoginRequest, LoginResponse, MeResponse},
    users::CurrentUser,
};
use crate::api::validation::ValidatedJson;
use crate::auth::{password, session};
use crate::db::handlers::Users;
use crate::db::models::users::UserStatus;
use crate::errors::{AuthFailure, Error, Result};
use crate::types::abbrev_uuid;
use crate::AppState;
use axum::{Json, extract::State};
use tracing::{debug, info};

/// The same answer for an unknown email, a wrong password and an inactive account.
fn invalid_credentials() -> Error {
    Error::Unauthenticated {
        reason: AuthFailure::InvalidCredentials,
        message: None,
    }
}

#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "auth",
    summary = "Log in",
    description = "Exchanges email and password for a bearer token and the resolved user.",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = LoginResponse),
        (status = 400, description = "Invalid input"),
        (status = 401, description = "Invalid credentials"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn login(State(state): State<AppState>, ValidatedJson(request): ValidatedJson<LoginRequest>) -> Result<Json<LoginResponse>> {
    let email = request.email.trim().to_lowercase();

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut users = Users::new(&mut conn);

    let found = users.get_user_by_email(&email).await?;
    let Some((user, password_hash)) = found.and_then(|u| u.password_hash.clone().map(|hash| (u, hash))) else {
        password::simulate_verification(request.password, state.config.auth.password.argon2_params()).await?;
        return Err(invalid_credentials());
    };

    if !password::verify_password(request.password, password_hash).await? {
        debug!("Wrong password for user {}", abbrev_uuid(&user.id));
        return Err(invalid_credentials());
    }
    if user.status != UserStatus::Active {
        debug!("Login refused for {:?} user {}", user.status, abbrev_uuid(&user.id));
        return Err(invalid_credentials());
    }

    users.record_login(user.id).await?;
    let current_user = CurrentUser::from(users.get_auth_context(user.id).await?.ok_or_else(invalid_credentials)?);
    let token = session::create_session_token(&current_user, &state.config)?;

    info!("User {} logged in", abbrev_uuid(&current_user.id));
    Ok(Json(LoginResponse { user: current_user, token }))
}

#[utoipa::path(
    get,
    path = "/auth/me",
    tag = "auth",
    summary = "Current user",
    description = "The acting user with the role and permissions the server will enforce.",
    responses(
        (status = 200, description = "Current user", body = MeResponse),
        (status = 401, description = "Unauthorized"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn me(current_user: CurrentUser) -> Result<Json<MeResponse>> {
    Ok(Json(MeResponse { user: current_user }))
}

#[cfg(test)]
mod tests {
    use crate::db::handlers::{Repository, Users};
    use crate::db::models::users::{UserCreateDBRequest, UserStatus};
    use crate::test_utils::*;
    use serde_json::{Value, json};
    use sqlx::PgPool;

    #[sqlx::test]
    #[test_log::test]
    async fn test_login_returns_token_and_permissions(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let rep = create_test_user(&pool, "sales_rep").await;

        let response = app
            .post("/api/auth/login")
            .json(&json!({ "email": rep.email.to_uppercase(), "password": TEST_PASSWORD }))
            .await;

        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["user"]["id"], json!(rep.id));
        assert_eq!(body["user"]["role"], "sales_rep");
        assert_eq!(body["user"]["roleDisplayName"], "Sales Representative");
        let permissions: Vec<String> = serde_json::from_value(body["user"]["permissions"].clone()).unwrap();
        assert!(permissions.contains(&"leads.read".to_string()));
        assert!(!permissions.contains(&"leads.delete".to_string()));

        // The token works against a protected route
        let token = body["token"].as_str().unwrap();
        let me = app.get("/api/auth/me").add_header("authorization", format!("Bearer {token}")).await;
        me.assert_status_ok();
        assert_eq!(me.json::<Value>()["user"]["email"], json!(rep.email));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_login_failures_are_indistinguishable(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let rep = create_test_user(&pool, "sales_rep").await;
        let suspended = create_test_user_with_status(&pool, "manager", UserStatus::Suspended).await;

        let mut conn = pool.acquire().await.unwrap();
        let no_password = Users::new(&mut conn)
            .create(&UserCreateDBRequest {
                name: "No Password".to_string(),
                email: "nopassword@example.com".to_string(),
                phone: None,
                password_hash: None,
                role_id: None,
                status: UserStatus::Active,
                email_verified: false,
                profile: Default::default(),
            })
            .await
            .unwrap();
        drop(conn);

        let attempts = [
            json!({ "email": rep.email, "password": "Wrong-Passw0rd" }),
            json!({ "email": "nobody@example.com", "password": TEST_PASSWORD }),
            json!({ "email": suspended.email, "password": TEST_PASSWORD }),
            json!({ "email": no_password.email, "password": TEST_PASSWORD }),
        ];

        for attempt in attempts {
            let response = app.post("/api/auth/login").json(&attempt).await;
            response.assert_status_unauthorized();
            let body: Value = response.json();
            assert_eq!(body["code"], "INVALID_CREDENTIALS");
            assert_eq!(body["error"], "Invalid credentials");
        }
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_login_rejects_malformed_input(pool: PgPool) {
        let app = create_test_app(pool).await;

        let response = app
            .post("/api/auth/login")
            .json(&json!({ "email": "not-an-email", "password": "" }))
            .await;

        response.assert_status_bad_request();
        assert_eq!(response.json::<Value>()["code"], "VALIDATION_ERROR");
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_protected_routes_require_a_valid_token(pool: PgPool) {
        let app = create_test_app(pool).await;

        let missing = app.get("/api/auth/me").await;
        missing.assert_status_unauthorized();
        assert_eq!(missing.json::<Value>()["code"], "MISSING_TOKEN");

        let garbage = app.get("/api/auth/me").add_header("authorization", "Bearer not-a-jwt").await;
        garbage.assert_status_unauthorized();
        assert_eq!(garbage.json::<Value>()["code"], "INVALID_TOKEN");
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_token_of_deactivated_user_is_refused(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let inactive = create_test_user_with_status(&pool, "viewer", UserStatus::Inactive).await;

        let response = app.get("/api/auth/me").add_header("authorization", bearer_header(&inactive)).await;

        response.assert_status_unauthorized();
        assert_eq!(response.json::<Value>()["code"], "INVALID_USER");
    }
}
