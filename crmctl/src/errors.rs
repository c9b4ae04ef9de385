use crate::auth::permissions::GuardViolation;
use crate::db::errors::DbError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error as ThisError;
use utoipa::ToSchema;

/// Why a request could not be authenticated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFailure {
    /// No `Authorization: Bearer` header
    MissingToken,
    /// Token failed signature, format, issuer or audience checks
    InvalidToken,
    /// Token signature is fine but `exp` has passed
    ExpiredToken,
    /// Token is valid but the user no longer exists or is not ACTIVE
    InvalidUser,
    /// No resolved user on a route that needs one
    NotAuthenticated,
    /// Login rejected; deliberately says nothing about which part was wrong
    InvalidCredentials,
}

impl AuthFailure {
    pub fn code(&self) -> &'static str {
        match self {
            AuthFailure::MissingToken => "MISSING_TOKEN",
            AuthFailure::InvalidToken => "INVALID_TOKEN",
            AuthFailure::ExpiredToken => "EXPIRED_TOKEN",
            AuthFailure::InvalidUser => "INVALID_USER",
            AuthFailure::NotAuthenticated => "NOT_AUTHENTICATED",
            AuthFailure::InvalidCredentials => "INVALID_CREDENTIALS",
        }
    }

    fn default_message(&self) -> &'static str {
        match self {
            AuthFailure::MissingToken => "Access token required",
            AuthFailure::InvalidToken => "Invalid access token",
            AuthFailure::ExpiredToken => "Access token expired",
            AuthFailure::InvalidUser => "User not found or inactive",
            AuthFailure::NotAuthenticated => "Authentication required",
            AuthFailure::InvalidCredentials => "Invalid credentials",
        }
    }
}

/// A single field validation error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// Collection of field-level validation errors.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ValidationErrors {
    pub fields: Vec<FieldError>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.fields.push(FieldError {
            field: field.into(),
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn has(&self, field: &str) -> bool {
        self.fields.iter().any(|f| f.field == field)
    }

    /// `Ok(())` when nothing was collected, otherwise a [`Error::Validation`].
    pub fn into_result(self) -> Result<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(Error::Validation { errors: self })
        }
    }
}

/// Rust field names become the camelCase names clients sent. Fields are reported in name order.
impl From<validator::ValidationErrors> for ValidationErrors {
    fn from(report: validator::ValidationErrors) -> Self {
        let mut fields: Vec<(String, &Vec<validator::ValidationError>)> = report
            .field_errors()
            .into_iter()
            .map(|(field, errors)| (camel_case(field.as_ref()), errors))
            .collect();
        fields.sort_by(|a, b| a.0.cmp(&b.0));

        let mut collected = ValidationErrors::new();
        for (field, errors) in fields {
            for error in errors {
                let message = error.message.as_deref().unwrap_or(error.code.as_ref());
                collected.add(field.clone(), message);
            }
        }
        collected
    }
}

fn camel_case(field: &str) -> String {
    let mut out = String::with_capacity(field.len());
    let mut upper = false;
    for c in field.chars() {
        if c == '_' {
            upper = true;
        } else if upper {
            out.extend(c.to_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}

impl std::fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} validation errors", self.fields.len())
    }
}

#[derive(ThisError, Debug)]
pub enum Error {
    /// Authentication required but missing, invalid, or rejected
    #[error("Not authenticated: {}", reason.code())]
    Unauthenticated { reason: AuthFailure, message: Option<String> },

    /// User lacks the named permission
    #[error("Insufficient permissions: {required} required")]
    InsufficientPermissions { required: String },

    /// User's role is not in the allowed set
    #[error("Insufficient role: one of {required:?} required, has {current}")]
    InsufficientRole { required: Vec<String>, current: String },

    /// User may not touch this particular resource instance
    #[error("Access denied to {resource}")]
    AccessDenied { resource: String },

    /// Route-level business rule refused the operation
    #[error(transparent)]
    Guard(#[from] GuardViolation),

    /// Request body failed field validation
    #[error("{errors}")]
    Validation { errors: ValidationErrors },

    /// Request body could not be parsed at all
    #[error("Invalid JSON: {message}")]
    InvalidJson { message: String },

    /// Invalid request data or business rule violation
    #[error("{message}")]
    BadRequest { message: String },

    /// Requested resource not found
    #[error("{resource} with ID {id} not found")]
    NotFound { resource: String, id: String },

    /// Conflict error, e.g. a duplicate email checked before insert
    #[error("Conflict: {message}")]
    Conflict { message: String },

    /// Generic internal service error
    #[error("Failed to {operation}")]
    Internal { operation: String },

    /// Database operation error
    #[error(transparent)]
    Database(#[from] DbError),

    /// Unexpected error with full context chain
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// JSON body of every error response.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    pub error: String,
    pub code: String,
    /// Required permission name, or list of acceptable role names
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<serde_json::Value>,
    /// Acting role name, on role failures
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current: Option<String>,
    /// Field-level validation failures
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<FieldError>>,
}

impl Error {
    pub fn not_found(resource: &str, id: impl ToString) -> Self {
        Error::NotFound {
            resource: resource.to_string(),
            id: id.to_string(),
        }
    }

    /// Repository failure on a named resource. A row that vanished mid-request becomes the
    /// resource's own not-found error.
    pub fn for_resource(err: DbError, resource: &str, id: impl ToString) -> Self {
        match err {
            DbError::NotFound => Error::not_found(resource, id),
            other => Error::Database(other),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::Unauthenticated { .. } => StatusCode::UNAUTHORIZED,
            Error::InsufficientPermissions { .. } | Error::InsufficientRole { .. } | Error::AccessDenied { .. } => StatusCode::FORBIDDEN,
            Error::Guard(violation) => match violation {
                GuardViolation::RoleInUse { .. } => StatusCode::CONFLICT,
                _ => StatusCode::FORBIDDEN,
            },
            Error::Validation { .. } | Error::InvalidJson { .. } | Error::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Error::NotFound { .. } => StatusCode::NOT_FOUND,
            Error::Conflict { .. } => StatusCode::CONFLICT,
            Error::Internal { .. } | Error::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::Database(db_err) => match db_err {
                DbError::NotFound => StatusCode::NOT_FOUND,
                DbError::UniqueViolation { .. } => StatusCode::CONFLICT,
                DbError::ForeignKeyViolation { .. }
                | DbError::NotNullViolation { .. }
                | DbError::CheckViolation { .. }
                | DbError::InvalidTextRepresentation { .. } => StatusCode::BAD_REQUEST,
                DbError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    /// Stable machine-readable code for clients
    pub fn code(&self) -> String {
        match self {
            Error::Unauthenticated { reason, .. } => reason.code().to_string(),
            Error::InsufficientPermissions { .. } => "INSUFFICIENT_PERMISSIONS".to_string(),
            Error::InsufficientRole { .. } => "INSUFFICIENT_ROLE".to_string(),
            Error::AccessDenied { resource } => format!("{}_ACCESS_DENIED", resource.to_uppercase()),
            Error::Guard(violation) => violation.code().to_string(),
            Error::Validation { .. } => "VALIDATION_ERROR".to_string(),
            Error::InvalidJson { .. } => "INVALID_JSON".to_string(),
            Error::BadRequest { .. } => "BAD_REQUEST".to_string(),
            Error::NotFound { resource, .. } => format!("{}_NOT_FOUND", resource.to_uppercase()),
            Error::Conflict { .. } => "DUPLICATE_ENTRY".to_string(),
            Error::Internal { .. } | Error::Other(_) => "INTERNAL_ERROR".to_string(),
            Error::Database(db_err) => match db_err {
                DbError::NotFound => "NOT_FOUND",
                DbError::UniqueViolation { .. } => "DUPLICATE_ENTRY",
                DbError::ForeignKeyViolation { .. } => "INVALID_REFERENCE",
                DbError::NotNullViolation { .. } => "MISSING_REQUIRED_FIELD",
                DbError::CheckViolation { .. } | DbError::InvalidTextRepresentation { .. } => "INVALID_DATA_FORMAT",
                DbError::Other(_) => "DATABASE_ERROR",
            }
            .to_string(),
        }
    }

    /// Returns a user-safe error message, without leaking internal implementation details
    pub fn user_message(&self) -> String {
        match self {
            Error::Unauthenticated { reason, message } => message.clone().unwrap_or_else(|| reason.default_message().to_string()),
            Error::InsufficientPermissions { .. } => "Insufficient permissions".to_string(),
            Error::InsufficientRole { .. } => "Insufficient role".to_string(),
            Error::AccessDenied { resource } => format!("You do not have access to this {resource}"),
            Error::Guard(violation) => violation.to_string(),
            Error::Validation { .. } => "Invalid input data".to_string(),
            Error::InvalidJson { message } => format!("Invalid JSON: {message}"),
            Error::BadRequest { message } => message.clone(),
            Error::NotFound { resource, id } => format!("{resource} with ID {id} not found"),
            Error::Conflict { message } => message.clone(),
            Error::Internal { .. } | Error::Other(_) => "Internal server error".to_string(),
            Error::Database(db_err) => match db_err {
                DbError::NotFound => "Resource not found".to_string(),
                DbError::UniqueViolation { constraint, table, .. } => match (table.as_deref(), constraint.as_deref()) {
                    (Some("users"), Some(c)) if c.contains("email") => "An account with this email address already exists".to_string(),
                    (Some("roles"), Some(c)) if c.contains("name") => "A role with this name already exists".to_string(),
                    (Some("tags"), _) => "A tag with this name already exists".to_string(),
                    _ => "Resource already exists".to_string(),
                },
                DbError::ForeignKeyViolation { .. } => "Invalid reference to related resource".to_string(),
                DbError::NotNullViolation { .. } => "A required field is missing".to_string(),
                DbError::CheckViolation { .. } | DbError::InvalidTextRepresentation { .. } => "Invalid data format".to_string(),
                DbError::Other(_) => "Database error occurred".to_string(),
            },
        }
    }

    fn body(&self) -> ErrorBody {
        let mut body = ErrorBody {
            error: self.user_message(),
            code: self.code(),
            required: None,
            current: None,
            details: None,
        };
        match self {
            Error::InsufficientPermissions { required } => {
                body.required = Some(serde_json::Value::from(required.clone()));
            }
            Error::InsufficientRole { required, current } => {
                body.required = Some(serde_json::Value::from(required.clone()));
                body.current = Some(current.clone());
            }
            Error::Validation { errors } => {
                body.details = Some(errors.fields.clone());
            }
            _ => {}
        }
        body
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        // Log full error details for debugging - different log levels based on severity
        match &self {
            Error::Database(DbError::Other(_)) | Error::Internal { .. } | Error::Other(_) => {
                tracing::error!("Internal service error: {:#}", self);
            }
            Error::Database(_) | Error::Conflict { .. } => {
                tracing::warn!("Database constraint error: {}", self);
            }
            Error::Unauthenticated { .. }
            | Error::InsufficientPermissions { .. }
            | Error::InsufficientRole { .. }
            | Error::AccessDenied { .. }
            | Error::Guard(_) => {
                tracing::info!("Authorization error: {}", self);
            }
            Error::Validation { .. } | Error::InvalidJson { .. } | Error::BadRequest { .. } | Error::NotFound { .. } => {
                tracing::debug!("Client error: {}", self);
            }
        }

        (self.status_code(), Json(self.body())).into_response()
    }
}

/// Convert from String errors (e.g., from external functions)
impl From<String> for Error {
    fn from(msg: String) -> Self {
        Error::Internal { operation: msg }
    }
}

/// Type alias for service operation results
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_of(err: Error) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_missing_token_body() {
        let (status, body) = body_of(Error::Unauthenticated {
            reason: AuthFailure::MissingToken,
            message: None,
        })
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "MISSING_TOKEN");
        assert_eq!(body["error"], "Access token required");
        assert!(body.get("required").is_none());
    }

    #[tokio::test]
    async fn test_insufficient_permissions_includes_required() {
        let (status, body) = body_of(Error::InsufficientPermissions {
            required: "leads.delete".to_string(),
        })
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["code"], "INSUFFICIENT_PERMISSIONS");
        assert_eq!(body["required"], "leads.delete");
    }

    #[tokio::test]
    async fn test_insufficient_role_includes_required_and_current() {
        let (status, body) = body_of(Error::InsufficientRole {
            required: vec!["super_admin".to_string(), "admin".to_string()],
            current: "viewer".to_string(),
        })
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["code"], "INSUFFICIENT_ROLE");
        assert_eq!(body["required"], serde_json::json!(["super_admin", "admin"]));
        assert_eq!(body["current"], "viewer");
    }

    #[tokio::test]
    async fn test_validation_lists_details() {
        let mut errors = ValidationErrors::new();
        errors.add("email", "Invalid email format");
        errors.add("password", "Password must be at least 6 characters");

        let (status, body) = body_of(Error::Validation { errors }).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "VALIDATION_ERROR");
        assert_eq!(body["details"].as_array().unwrap().len(), 2);
        assert_eq!(body["details"][0]["field"], "email");
    }

    #[test]
    fn test_validator_report_uses_wire_field_names() {
        let mut report = validator::ValidationErrors::new();
        let mut too_long = validator::ValidationError::new("length");
        too_long.message = Some("Must be at most 500 characters".into());
        report.add("phone_used", validator::ValidationError::new("phone"));
        report.add("display_name", too_long);

        let errors = ValidationErrors::from(report);
        assert_eq!(
            errors.fields,
            vec![
                FieldError {
                    field: "displayName".to_string(),
                    message: "Must be at most 500 characters".to_string(),
                },
                FieldError {
                    field: "phoneUsed".to_string(),
                    message: "phone".to_string(),
                },
            ]
        );
        assert_eq!(camel_case("potential_value"), "potentialValue");
        assert_eq!(camel_case("name"), "name");
    }

    #[test]
    fn test_resource_scoped_codes() {
        assert_eq!(Error::not_found("Lead", "abc").code(), "LEAD_NOT_FOUND");

        let vanished = Error::for_resource(DbError::NotFound, "User", "abc");
        assert_eq!(vanished.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(vanished.code(), "USER_NOT_FOUND");
        assert!(matches!(
            Error::for_resource(DbError::Other(anyhow::anyhow!("boom")), "User", "abc"),
            Error::Database(DbError::Other(_))
        ));
        assert_eq!(
            Error::AccessDenied {
                resource: "lead".to_string()
            }
            .code(),
            "LEAD_ACCESS_DENIED"
        );
    }

    #[test]
    fn test_database_error_codes() {
        let unique = Error::Database(DbError::UniqueViolation {
            constraint: Some("users_email_unique".to_string()),
            table: Some("users".to_string()),
            message: "duplicate key".to_string(),
        });
        assert_eq!(unique.status_code(), StatusCode::CONFLICT);
        assert_eq!(unique.code(), "DUPLICATE_ENTRY");
        assert_eq!(unique.user_message(), "An account with this email address already exists");

        let fk = Error::Database(DbError::ForeignKeyViolation {
            constraint: None,
            table: None,
            message: String::new(),
        });
        assert_eq!(fk.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(fk.code(), "INVALID_REFERENCE");

        let other = Error::Database(DbError::Other(anyhow::anyhow!("connection reset")));
        assert_eq!(other.code(), "DATABASE_ERROR");
        assert_eq!(other.user_message(), "Database error occurred");
    }

    #[test]
    fn test_internal_errors_do_not_leak() {
        let err = Error::Internal {
            operation: "decrypt secret with key abc".to_string(),
        };
        assert_eq!(err.user_message(), "Internal server error");
        assert_eq!(err.code(), "INTERNAL_ERROR");
    }
}
