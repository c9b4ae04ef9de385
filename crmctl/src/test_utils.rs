//! Test utilities for integration testing (available with `test-utils` feature).

use crate::{
    AppState,
    api::models::users::CurrentUser,
    auth::{password, session},
    config::{Config, PasswordConfig, PoolSettings},
    db::{
        handlers::{Leads, Repository, Roles, Users},
        models::{
            leads::{LeadCreateDBRequest, LeadDBResponse, LeadSource, LeadStatus},
            users::{ProfileFields, UserCreateDBRequest, UserStatus},
        },
    },
    types::UserId,
};
use axum_test::TestServer;
use sqlx::PgPool;
use uuid::Uuid;

/// Password every user made by [`create_test_user`] logs in with.
pub const TEST_PASSWORD: &str = "Test-Passw0rd";

pub async fn create_test_app(pool: PgPool) -> TestServer {
    let config = create_test_config();

    let app = crate::Application::new_with_pool(config, Some(pool))
        .await
        .expect("Failed to create application");

    app.into_test_server()
}

pub fn create_test_config() -> Config {
    Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        // Tests bring their own pool
        database_url: "Something".to_string(),
        database: crate::config::DatabaseConfig {
            pool: PoolSettings {
                max_connections: 1,
                min_connections: 1,
                ..Default::default()
            },
        },
        admin_email: "admin@test.com".to_string(),
        admin_password: None,
        secret_key: Some("test-secret-key-for-testing-only".to_string()),
        auth: crate::config::AuthConfig {
            password: PasswordConfig {
                // Cheap hashing keeps the suite fast
                argon2_memory_kib: 128,
                argon2_iterations: 1,
                argon2_parallelism: 1,
                ..Default::default()
            },
            ..Default::default()
        },
        enable_otel_export: false,
    }
}

pub fn create_test_state(pool: PgPool) -> AppState {
    AppState::builder().db(pool).config(create_test_config()).build()
}

/// Create an ACTIVE user holding the named role and return the identity the server would resolve.
pub async fn create_test_user(pool: &PgPool, role_name: &str) -> CurrentUser {
    create_test_user_with_status(pool, role_name, UserStatus::Active).await
}

pub async fn create_test_user_with_status(pool: &PgPool, role_name: &str, status: UserStatus) -> CurrentUser {
    let mut conn = pool.acquire().await.expect("Failed to acquire connection");

    let role = Roles::new(&mut conn)
        .get_by_name(role_name)
        .await
        .expect("Failed to look up role")
        .unwrap_or_else(|| panic!("Role {role_name} should exist"));

    let params = create_test_config().auth.password.argon2_params();
    let password_hash = password::hash_string_with_params(TEST_PASSWORD, Some(params)).expect("Failed to hash password");

    let email = format!("{role_name}_{}@example.com", Uuid::new_v4().simple());
    let request = UserCreateDBRequest {
        name: format!("Test {role_name}"),
        email,
        phone: None,
        password_hash: Some(password_hash),
        role_id: Some(role.id),
        status,
        email_verified: true,
        profile: ProfileFields::default(),
    };

    let mut users = Users::new(&mut conn);
    let user = users.create(&request).await.expect("Failed to create test user");

    // Inactive users have no auth context, so build the identity from the row
    CurrentUser {
        id: user.id,
        email: user.email,
        name: user.name,
        role: role.name,
        role_display_name: role.display_name,
        permissions: role.permissions.into_iter().map(|p| p.name).collect(),
    }
}

/// `Authorization` header value carrying a freshly issued token for `user`.
pub fn bearer_header(user: &CurrentUser) -> String {
    let token = session::create_session_token(user, &create_test_config()).expect("Failed to create session token");
    format!("Bearer {token}")
}

pub async fn create_test_lead(pool: &PgPool, name: &str, responsible_id: Option<UserId>) -> LeadDBResponse {
    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    let request = LeadCreateDBRequest {
        name: name.to_string(),
        email: None,
        phone: None,
        company: Some("Test Co".to_string()),
        position: None,
        status: LeadStatus::New,
        source: LeadSource::Other,
        segment: None,
        potential_value: None,
        notes: None,
        responsible_id,
        tags: vec![],
    };

    Leads::new(&mut conn).create(&request).await.expect("Failed to create test lead")
}
