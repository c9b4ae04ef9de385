//! # crmctl: CRM backend
//!
//! `crmctl` is the server side of a customer relationship management system. It stores leads
//! (prospective customers), the interactions sales staff have with them, and the users, roles and
//! permissions that decide who may see and change what. A dashboard endpoint summarises the
//! pipeline over a trailing window.
//!
//! ## Architecture
//!
//! The HTTP layer is [Axum](https://github.com/tokio-rs/axum); all state lives in PostgreSQL and
//! is reached through one [`sqlx::PgPool`] held in [`AppState`].
//!
//! ### Request Flow
//!
//! Every route is mounted under `/api`. Apart from `POST /api/auth/login` and `GET /api/health`,
//! each request passes through [`auth::middleware::require_authentication`], which verifies the
//! bearer JWT and loads the acting user's role and permission names from the database. Handlers
//! then declare their guard as an extractor (`RequiresPermission<permission::LeadsRead>`), apply
//! record-level rules (a sales rep only sees leads assigned to them or unassigned) and call the
//! repositories in [`db::handlers`].
//!
//! ### Core Components
//!
//! - [`api`]: handlers, request/response models and body validation
//! - [`auth`]: tokens, password hashing, permission predicates and route guards
//! - [`db`]: repositories over `&mut PgConnection` and their models
//! - [`config`]: YAML + environment configuration
//! - [`errors`]: the error type every handler returns, rendered as a JSON body with a stable code
//!
//! ## Quick Start
//!
//! ```no_run
//! use clap::Parser;
//! use crmctl::{Application, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = crmctl::config::Args::parse();
//!     let config = Config::load(&args)?;
//!     crmctl::telemetry::init_telemetry(config.enable_otel_export)?;
//!
//!     let app = Application::new(config).await?;
//!     app.serve(async {
//!         tokio::signal::ctrl_c().await.expect("Failed to listen for Ctrl+C");
//!     })
//!     .await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Database Setup
//!
//! Migrations are embedded and run on startup:
//!
//! ```no_run
//! # use sqlx::PgPool;
//! # async fn example(pool: PgPool) -> Result<(), sqlx::migrate::MigrateError> {
//! crmctl::migrator().run(&pool).await?;
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod errors;
mod openapi;
pub mod telemetry;
mod types;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

use crate::{
    auth::{
        middleware::require_authentication,
        password::{self, Argon2Params},
        permissions::SUPER_ADMIN,
    },
    config::{CorsOrigin, PoolSettings},
    db::handlers::{Roles, Users},
    errors::ErrorBody,
    openapi::ApiDoc,
};
use axum::{
    Json, Router,
    http::{self, HeaderValue, StatusCode, Uri},
    middleware::from_fn_with_state,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use bon::Builder;
pub use config::Config;
use sqlx::{PgPool, postgres::PgPoolOptions};
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{Level, debug, info, instrument};
pub use types::UserId;
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

/// Shared state handed to every handler.
///
/// - `db`: the PostgreSQL pool; repositories borrow connections from it per request
/// - `config`: application configuration
///
/// # Example
///
/// ```ignore
/// let state = AppState::builder().db(pool).config(config).build();
/// ```
#[derive(Clone, Builder)]
pub struct AppState {
    pub db: PgPool,
    pub config: Config,
}

/// Get the crmctl database migrator
pub fn migrator() -> sqlx::migrate::Migrator {
    sqlx::migrate!("./migrations")
}

/// Create the bootstrap administrator, or rotate its password if it already exists.
///
/// The account is a `super_admin` named "Administrator" and is always left ACTIVE. Running this
/// repeatedly with the same email always yields the same user ID.
#[instrument(skip_all)]
pub async fn create_initial_admin_user(email: &str, password: &str, params: Argon2Params, db: &PgPool) -> anyhow::Result<UserId> {
    let password_hash = password::hash_password(password.to_string(), params).await?;

    let mut tx = db.begin().await?;
    let role = Roles::new(&mut tx)
        .get_by_name(SUPER_ADMIN)
        .await?
        .ok_or_else(|| anyhow::anyhow!("role '{SUPER_ADMIN}' is missing; migrations have not run"))?;
    let user_id = Users::new(&mut tx)
        .upsert_bootstrap_admin(&email.to_lowercase(), &password_hash, role.id)
        .await?;
    tx.commit().await?;

    Ok(user_id)
}

fn pool_options(settings: &PoolSettings) -> PgPoolOptions {
    let seconds = |secs: u64| (secs > 0).then(|| Duration::from_secs(secs));

    PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .min_connections(settings.min_connections)
        .acquire_timeout(Duration::from_secs(settings.acquire_timeout_secs))
        .idle_timeout(seconds(settings.idle_timeout_secs))
        .max_lifetime(seconds(settings.max_lifetime_secs))
}

/// Connect (unless a pool is supplied), migrate and make sure the bootstrap admin exists.
async fn setup_database(config: &Config, pool: Option<PgPool>) -> anyhow::Result<PgPool> {
    let pool = match pool {
        Some(pool) => pool,
        None => {
            info!("Connecting to database");
            pool_options(&config.database.pool).connect(&config.database_url).await?
        }
    };
    migrator().run(&pool).await?;

    match config.admin_password.as_deref() {
        Some(admin_password) => {
            create_initial_admin_user(&config.admin_email, admin_password, config.auth.password.argon2_params(), &pool)
                .await
                .map_err(|e| anyhow::anyhow!("Failed to create initial admin user: {e}"))?;
            info!("Bootstrap administrator {} is ready", config.admin_email);
        }
        None => info!("No admin_password configured; leaving the bootstrap administrator untouched"),
    }

    Ok(pool)
}

/// Create CORS layer from configuration
fn create_cors_layer(config: &Config) -> anyhow::Result<CorsLayer> {
    let mut origins = Vec::new();
    for origin in &config.auth.security.cors.allowed_origins {
        let header_value = match origin {
            CorsOrigin::Wildcard => "*".parse::<HeaderValue>()?,
            CorsOrigin::Url(url) => url.as_str().trim_end_matches('/').parse::<HeaderValue>()?,
        };
        origins.push(header_value);
    }

    let mut cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([http::Method::GET, http::Method::POST, http::Method::PUT, http::Method::DELETE])
        .allow_headers([http::header::AUTHORIZATION, http::header::CONTENT_TYPE])
        .allow_credentials(config.auth.security.cors.allow_credentials);

    if let Some(max_age) = config.auth.security.cors.max_age {
        cors = cors.max_age(Duration::from_secs(max_age));
    }

    Ok(cors)
}

/// JSON 404 for paths no route matches.
async fn route_not_found(uri: Uri) -> Response {
    let body = ErrorBody {
        error: format!("Route {} not found", uri.path()),
        code: "ROUTE_NOT_FOUND".to_string(),
        required: None,
        current: None,
        details: None,
    };
    (StatusCode::NOT_FOUND, Json(body)).into_response()
}

/// Build the application router.
///
/// - `/api/auth/login` and `/api/health` are public
/// - every other `/api` route sits behind [`require_authentication`]
/// - `/api-docs/openapi.json` and `/docs` serve the API description
/// - unmatched paths get a JSON `ROUTE_NOT_FOUND`
#[instrument(skip_all)]
pub fn build_router(state: &AppState) -> anyhow::Result<Router> {
    use api::handlers::{analytics, auth, health, interactions, leads, permissions, roles, tags, users};

    let public_routes = Router::new()
        .route("/auth/login", post(auth::login))
        .route("/health", get(health::health));

    let protected_routes = Router::new()
        .route("/auth/me", get(auth::me))
        // Leads
        .route("/leads", get(leads::list_leads).post(leads::create_lead))
        .route("/leads/priority/list", get(leads::list_priority_leads))
        .route("/leads/{id}", get(leads::get_lead).put(leads::update_lead).delete(leads::delete_lead))
        // Interactions
        .route(
            "/interactions",
            get(interactions::list_interactions).post(interactions::create_interaction),
        )
        .route(
            "/interactions/{id}",
            axum::routing::put(interactions::update_interaction).delete(interactions::delete_interaction),
        )
        // Users
        .route("/users", get(users::list_users).post(users::create_user))
        .route("/users/{id}", get(users::get_user).put(users::update_user).delete(users::delete_user))
        .route("/users/{id}/permissions", get(users::get_user_permissions))
        // Roles and permissions
        .route("/roles", get(roles::list_roles).post(roles::create_role))
        .route("/roles/{id}", axum::routing::put(roles::update_role).delete(roles::delete_role))
        .route("/permissions", get(permissions::list_permissions))
        // Analytics and client settings
        .route("/analytics/dashboard", get(analytics::get_dashboard_analytics))
        .route("/settings", get(tags::get_settings))
        .route("/tags", get(tags::list_tags))
        .route_layer(from_fn_with_state(state.clone(), require_authentication));

    let api_routes = public_routes.merge(protected_routes).with_state(state.clone());

    let router = Router::new()
        .nest("/api", api_routes)
        .route("/api-docs/openapi.json", get(|| async { Json(ApiDoc::openapi()) }))
        .merge(Scalar::with_url("/docs", ApiDoc::openapi()))
        .fallback(route_not_found)
        .layer(create_cors_layer(&state.config)?)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        );

    Ok(router)
}

pub struct Application {
    router: Router,
    config: Config,
    pool: PgPool,
}

impl Application {
    /// Create a new application instance with all resources initialized
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        Self::new_with_pool(config, None).await
    }

    /// Like [`Application::new`], but reuse an existing pool instead of connecting.
    pub async fn new_with_pool(config: Config, pool: Option<PgPool>) -> anyhow::Result<Self> {
        debug!("Starting crmctl on {}", config.bind_address());

        let pool = setup_database(&config, pool).await?;
        let state = AppState::builder().db(pool.clone()).config(config.clone()).build();
        let router = build_router(&state)?;

        Ok(Self { router, config, pool })
    }

    /// Convert application into a test server (for tests)
    #[cfg(any(test, feature = "test-utils"))]
    pub fn into_test_server(self) -> axum_test::TestServer {
        axum_test::TestServer::new(self.router).expect("Failed to create test server")
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!("crmctl listening on http://{}, API at http://localhost:{}/api", bind_addr, self.config.port);

        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("Closing database connections...");
        self.pool.close().await;

        info!("Shutting down telemetry...");
        telemetry::shutdown_telemetry();

        Ok(())
    }
}
