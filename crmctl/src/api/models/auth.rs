//! API request/response models for authentication.

use crate::api::models::users::CurrentUser;
use crate::api::validation::PolicyRules;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

/// Creation rules for passwords are stricter than the six characters accepted at login.
#[derive(Debug, Clone, Deserialize, ToSchema, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Must be a valid email address"))]
    pub email: String,
    #[validate(length(min = 6, message = "Must be at least 6 characters"))]
    pub password: String,
}

impl PolicyRules for LoginRequest {}

/// Successful login: the resolved user and a bearer token for later requests
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LoginResponse {
    pub user: CurrentUser,
    pub token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MeResponse {
    pub user: CurrentUser,
}

/// Plain confirmation body, used by deletions
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::validation::collect_errors;
    use crate::config::Config;

    #[test]
    fn test_login_rules() {
        let ok = LoginRequest {
            email: "admin@crm.com".to_string(),
            password: "123456".to_string(),
        };
        assert!(collect_errors(&ok, &Config::default()).is_empty());

        let bad = LoginRequest {
            email: "admin".to_string(),
            password: "12345".to_string(),
        };
        let errors = collect_errors(&bad, &Config::default());
        assert!(errors.has("email"));
        assert!(errors.has("password"));
    }
}
