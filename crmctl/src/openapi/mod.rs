//! OpenAPI documentation for the CRM API at `/api/*`.
//!
//! Served as JSON at `/api-docs/openapi.json` and rendered at `/docs`.

use utoipa::{
    Modify, OpenApi,
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
};

use crate::{api, errors};

/// Bearer JWT issued by `POST /api/auth/login`.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.security_schemes.insert(
                "BearerAuth".to_string(),
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .description(Some(
                            "Session token from `POST /api/auth/login`. Include it in the `Authorization` header:\n\n\
                            ```\nAuthorization: Bearer YOUR_TOKEN\n```",
                        ))
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    modifiers(&SecurityAddon),
    servers((url = "/api")),
    paths(
        api::handlers::auth::login,
        api::handlers::auth::me,
        api::handlers::leads::list_leads,
        api::handlers::leads::list_priority_leads,
        api::handlers::leads::get_lead,
        api::handlers::leads::create_lead,
        api::handlers::leads::update_lead,
        api::handlers::leads::delete_lead,
        api::handlers::interactions::list_interactions,
        api::handlers::interactions::create_interaction,
        api::handlers::interactions::update_interaction,
        api::handlers::interactions::delete_interaction,
        api::handlers::users::list_users,
        api::handlers::users::get_user,
        api::handlers::users::create_user,
        api::handlers::users::update_user,
        api::handlers::users::delete_user,
        api::handlers::users::get_user_permissions,
        api::handlers::roles::list_roles,
        api::handlers::roles::create_role,
        api::handlers::roles::update_role,
        api::handlers::roles::delete_role,
        api::handlers::permissions::list_permissions,
        api::handlers::analytics::get_dashboard_analytics,
        api::handlers::tags::list_tags,
        api::handlers::tags::get_settings,
        api::handlers::health::health,
    ),
    components(
        schemas(
            errors::ErrorBody,
            errors::FieldError,
            api::models::pagination::PageMeta,
        )
    ),
    tags(
        (name = "auth", description = "Login and the current session."),
        (name = "leads", description = "Prospective customers. Sales reps only see leads assigned to them or unassigned."),
        (name = "interactions", description = "Calls, emails, meetings and other contact with leads."),
        (name = "users", description = "User accounts, profiles and their effective permissions."),
        (name = "roles", description = "Roles and the permissions they grant."),
        (name = "analytics", description = "Dashboard summaries."),
        (name = "tags", description = "Lead tags and client settings."),
        (name = "health", description = "Service health."),
    ),
    info(
        title = "CRM API",
        version = "0.4.0",
        description = "Leads, interactions, users, roles and analytics.

## Authentication

Log in with `POST /api/auth/login` and send the returned token on every other request:

```
Authorization: Bearer YOUR_TOKEN
```

## Errors

Errors share one shape. `required`, `current` and `details` appear only when relevant:

```json
{\"error\": \"Insufficient permissions\", \"code\": \"INSUFFICIENT_PERMISSIONS\", \"required\": \"leads.delete\"}
```",
    ),
)]
pub struct ApiDoc;
