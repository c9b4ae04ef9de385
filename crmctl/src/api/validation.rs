//! Request body validation.
//!
//! Field rules are declared on the request models with `#[derive(validator::Validate)]`; the
//! custom rules they reference live here. Rules that depend on configuration, such as the
//! password policy, go in a [`PolicyRules`] impl. Handlers take bodies through [`ValidatedJson`],
//! which runs both and reports every failing field together.

use std::borrow::Cow;

use axum::{
    Json,
    extract::{FromRequest, Request, rejection::JsonRejection},
};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use validator::{Validate, ValidateEmail, ValidationError};

use crate::{
    AppState,
    config::Config,
    errors::{Error, ValidationErrors},
};

/// Checks that need the running configuration.
pub trait PolicyRules {
    fn check_policy(&self, _config: &Config, _errors: &mut ValidationErrors) {}
}

/// Run the declared field rules, then the policy rules.
pub fn collect_errors<T: Validate + PolicyRules>(value: &T, config: &Config) -> ValidationErrors {
    let mut errors = match value.validate() {
        Ok(()) => ValidationErrors::new(),
        Err(report) => ValidationErrors::from(report),
    };
    value.check_policy(config, &mut errors);
    errors
}

/// JSON body extractor that validates after deserializing.
///
/// - a body that is not JSON, or not the right shape, gives 400 `INVALID_JSON`
/// - a body that breaks a field rule gives 400 `VALIDATION_ERROR` with `details`
#[derive(Debug, Clone)]
pub struct ValidatedJson<T>(pub T);

impl<T> FromRequest<AppState> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate + PolicyRules,
{
    type Rejection = Error;

    async fn from_request(req: Request, state: &AppState) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await.map_err(json_rejection)?;
        collect_errors(&value, &state.config).into_result()?;
        Ok(ValidatedJson(value))
    }
}

fn json_rejection(rejection: JsonRejection) -> Error {
    match rejection {
        // Well-formed JSON that does not fit the model, e.g. an unknown enum value
        JsonRejection::JsonDataError(e) => {
            let mut errors = ValidationErrors::new();
            errors.add("body", e.body_text());
            Error::Validation { errors }
        }
        other => Error::InvalidJson { message: other.body_text() },
    }
}

fn invalid(code: &'static str, message: &'static str) -> ValidationError {
    ValidationError::new(code).with_message(Cow::Borrowed(message))
}

/// Required text must have something besides whitespace.
pub fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(invalid("blank", "Must not be blank"));
    }
    Ok(())
}

/// Email check for optional fields, where a blank value means "none".
pub fn optional_email(value: &str) -> Result<(), ValidationError> {
    match value.trim() {
        "" => Ok(()),
        trimmed if trimmed.validate_email() => Ok(()),
        _ => Err(invalid("email", "Must be a valid email address")),
    }
}

/// Optional `+`, then a non-zero digit followed by up to 15 more digits.
pub fn is_valid_phone(value: &str) -> bool {
    let digits = value.strip_prefix('+').unwrap_or(value);
    let mut chars = digits.chars();
    match chars.next() {
        Some(first) if ('1'..='9').contains(&first) => {}
        _ => return false,
    }
    digits.len() <= 16 && chars.all(|c| c.is_ascii_digit())
}

pub fn phone(value: &str) -> Result<(), ValidationError> {
    if !is_valid_phone(value) {
        return Err(invalid("phone", "Must be a valid phone number"));
    }
    Ok(())
}

/// Like [`phone`], but an empty string means "none".
pub fn optional_phone(value: &str) -> Result<(), ValidationError> {
    if value.is_empty() { Ok(()) } else { phone(value) }
}

/// Lowercase letters and underscores only.
pub fn role_name(value: &str) -> Result<(), ValidationError> {
    if value.is_empty() || !value.chars().all(|c| c.is_ascii_lowercase() || c == '_') {
        return Err(invalid("role_name", "Must contain only lowercase letters and underscores"));
    }
    Ok(())
}

/// Between 0 and 999,999,999.99.
pub fn potential_value(value: &Decimal) -> Result<(), ValidationError> {
    if *value < Decimal::ZERO || *value > Decimal::new(99_999_999_999, 2) {
        return Err(invalid("range", "Must be between 0 and 999999999.99"));
    }
    Ok(())
}

pub fn tag_names(tags: &[String]) -> Result<(), ValidationError> {
    if tags.iter().any(|t| t.chars().count() > 50) {
        return Err(invalid("tag_length", "Each tag must be at most 50 characters"));
    }
    Ok(())
}

/// Length within the configured bounds, with at least one lowercase letter, one uppercase letter
/// and one digit.
pub fn check_password(errors: &mut ValidationErrors, field: &str, value: &str, config: &Config) {
    let policy = &config.auth.password;
    let len = value.chars().count();
    if len < policy.min_length || len > policy.max_length {
        errors.add(
            field,
            format!("Must be between {} and {} characters", policy.min_length, policy.max_length),
        );
    }
    let has_lower = value.chars().any(|c| c.is_lowercase());
    let has_upper = value.chars().any(|c| c.is_uppercase());
    let has_digit = value.chars().any(|c| c.is_ascii_digit());
    if !(has_lower && has_upper && has_digit) {
        errors.add(field, "Must contain a lowercase letter, an uppercase letter and a digit");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Validate)]
    struct Contact {
        #[validate(length(min = 2, max = 10, message = "Must be between 2 and 10 characters"), custom(function = "not_blank"))]
        name: String,
        #[validate(custom(function = "optional_email"))]
        email: Option<String>,
        #[validate(custom(function = "phone"))]
        phone_number: Option<String>,
    }

    impl PolicyRules for Contact {}

    #[test]
    fn test_declared_rules_report_wire_names() {
        let ok = Contact {
            name: "Jane".to_string(),
            email: Some("".to_string()),
            phone_number: None,
        };
        assert!(collect_errors(&ok, &Config::default()).is_empty());

        let bad = Contact {
            name: "  ".to_string(),
            email: Some("jane@".to_string()),
            phone_number: Some("600-111-222".to_string()),
        };
        let errors = collect_errors(&bad, &Config::default());
        let fields: Vec<&str> = errors.fields.iter().map(|f| f.field.as_str()).collect();
        assert_eq!(fields, vec!["email", "name", "phoneNumber"]);
        assert_eq!(errors.fields[1].message, "Must not be blank");
    }

    #[test]
    fn test_email_rules() {
        assert!(optional_email("admin@crm.com").is_ok());
        assert!(optional_email(" first.last+tag@sub.example.org ").is_ok());
        assert!(optional_email("   ").is_ok());
        assert!(optional_email("admin").is_err());
        assert!(optional_email("@crm.com").is_err());
        assert!(optional_email("admin@@crm.com").is_err());
        assert!(optional_email("ad min@crm.com").is_err());
    }

    #[test]
    fn test_phone_rules() {
        assert!(is_valid_phone("+34600111222"));
        assert!(is_valid_phone("5551234"));
        assert!(is_valid_phone("1"));
        assert!(is_valid_phone("+1234567890123456"));
        assert!(!is_valid_phone("+12345678901234567"));
        assert!(!is_valid_phone("0600111222"));
        assert!(!is_valid_phone("+"));
        assert!(!is_valid_phone(""));
        assert!(!is_valid_phone("600-111-222"));
        assert!(optional_phone("").is_ok());
        assert!(phone("").is_err());
    }

    #[test]
    fn test_password_complexity() {
        let config = Config::default();

        let mut errors = ValidationErrors::new();
        check_password(&mut errors, "password", "Secret123", &config);
        assert!(errors.is_empty());

        let mut errors = ValidationErrors::new();
        check_password(&mut errors, "password", "secret123", &config);
        assert!(errors.has("password"));

        let mut errors = ValidationErrors::new();
        check_password(&mut errors, "password", "Ab1", &config);
        assert_eq!(errors.fields.len(), 1);

        let mut errors = ValidationErrors::new();
        let long = format!("Aa1{}", "x".repeat(config.auth.password.max_length));
        check_password(&mut errors, "password", &long, &config);
        assert!(errors.has("password"));
    }

    #[test]
    fn test_value_and_tag_rules() {
        assert!(potential_value(&Decimal::ZERO).is_ok());
        assert!(potential_value(&Decimal::new(99_999_999_999, 2)).is_ok());
        assert!(potential_value(&Decimal::new(-1, 0)).is_err());
        assert!(potential_value(&Decimal::new(1_000_000_000, 0)).is_err());

        assert!(tag_names(&["vip".to_string()]).is_ok());
        assert!(tag_names(&["x".repeat(51)]).is_err());
    }

    #[test]
    fn test_role_name_rule() {
        assert!(role_name("sales_rep").is_ok());
        assert!(role_name("Sales").is_err());
        assert!(role_name("rep-2").is_err());
        assert!(role_name("").is_err());
    }
}
