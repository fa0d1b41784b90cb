// ============================
// crates/backend-lib/src/validation/mod.rs
// ============================
//! Input validation for account requests.

use crate::auth::{validate_password_strength, PasswordRequirements};
use crate::config::UsernameRules;
use crate::error::AppError;
use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;
use volunteer_common::RegisterRequest;

const MIN_NAME_LENGTH: usize = 2;
const MAX_NAME_LENGTH: usize = 50;
const MAX_EMAIL_LENGTH: usize = 256;

static USERNAME_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9._@+-]+$").unwrap());
static EMAIL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").unwrap());

/// Possible validation errors
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid username: {0}")]
    InvalidUsername(String),

    #[error("Invalid password: {0}")]
    InvalidPassword(String),

    #[error("Invalid name: {0}")]
    InvalidName(String),

    #[error("Invalid email: {0}")]
    InvalidEmail(String),
}

/// Result type for validation operations
pub type ValidationResult<T> = Result<T, ValidationError>;

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        AppError::InvalidInput(err.to_string())
    }
}

/// Validate a username, returning it trimmed
pub fn validate_username<'a>(username: &'a str, rules: &UsernameRules) -> ValidationResult<&'a str> {
    let username = username.trim();
    let length = username.chars().count();

    if length < rules.min_length || length > rules.max_length {
        return Err(ValidationError::InvalidUsername(format!(
            "Username must be between {} and {} characters long",
            rules.min_length, rules.max_length
        )));
    }

    if !USERNAME_REGEX.is_match(username) {
        return Err(ValidationError::InvalidUsername(
            "Username may contain only letters, digits and . _ @ + -".to_string(),
        ));
    }

    Ok(username)
}

/// Validate a new password against the configured requirements
pub fn validate_password<'a>(
    password: &'a str,
    requirements: &PasswordRequirements,
) -> ValidationResult<&'a str> {
    if !validate_password_strength(password, requirements) {
        return Err(ValidationError::InvalidPassword(format!(
            "Password must be between {} and {} characters long and meet the complexity rules",
            requirements.min_length, requirements.max_length
        )));
    }
    Ok(password)
}

/// Validate a first or last name
pub fn validate_name<'a>(field: &str, name: &'a str) -> ValidationResult<&'a str> {
    let name = name.trim();
    let length = name.chars().count();

    if !(MIN_NAME_LENGTH..=MAX_NAME_LENGTH).contains(&length) {
        return Err(ValidationError::InvalidName(format!(
            "{field} must be between {MIN_NAME_LENGTH} and {MAX_NAME_LENGTH} characters long"
        )));
    }

    Ok(name)
}

/// Validate an email address
pub fn validate_email(email: &str) -> ValidationResult<&str> {
    let email = email.trim();

    if email.is_empty() {
        return Err(ValidationError::InvalidEmail(
            "Email must not be empty".to_string(),
        ));
    }

    if email.len() > MAX_EMAIL_LENGTH {
        return Err(ValidationError::InvalidEmail(format!(
            "Email cannot exceed {MAX_EMAIL_LENGTH} characters"
        )));
    }

    if !EMAIL_REGEX.is_match(email) {
        return Err(ValidationError::InvalidEmail(
            "Invalid email format".to_string(),
        ));
    }

    Ok(email)
}

/// Validate a registration and return it with surrounding whitespace removed
/// from every field except the password.
pub fn validate_registration(
    request: RegisterRequest,
    username_rules: &UsernameRules,
    password_requirements: &PasswordRequirements,
) -> ValidationResult<RegisterRequest> {
    let username = validate_username(&request.username, username_rules)?.to_string();
    validate_password(&request.password, password_requirements)?;
    let first_name = validate_name("First name", &request.first_name)?.to_string();
    let last_name = validate_name("Last name", &request.last_name)?.to_string();
    let email = validate_email(&request.email)?.to_string();

    Ok(RegisterRequest {
        username,
        first_name,
        last_name,
        email,
        ..request
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registration() -> RegisterRequest {
        RegisterRequest {
            username: "  alice ".to_string(),
            password: "correcthorse1".to_string(),
            first_name: "Alice".to_string(),
            last_name: "Liddell".to_string(),
            email: "alice@example.org".to_string(),
            is_admin: false,
        }
    }

    #[test]
    fn test_validate_username() {
        let rules = UsernameRules::default();
        assert_eq!(validate_username(" alice ", &rules), Ok("alice"));
        assert!(validate_username("al", &rules).is_err());
        assert!(validate_username(&"a".repeat(51), &rules).is_err());
        assert!(validate_username("alice smith", &rules).is_err());
        assert!(validate_username("<script>", &rules).is_err());
        assert!(validate_username("alice.smith@example", &rules).is_ok());
    }

    #[test]
    fn test_validate_password() {
        let requirements = PasswordRequirements::default();
        assert!(validate_password("correcthorse1", &requirements).is_ok());
        assert!(validate_password("short", &requirements).is_err());
        assert!(validate_password(&"p".repeat(256), &requirements).is_ok());
        assert!(validate_password(&"p".repeat(257), &requirements).is_err());
    }

    #[test]
    fn test_validate_name() {
        assert_eq!(validate_name("First name", " Al "), Ok("Al"));
        assert!(validate_name("First name", "A").is_err());
        assert!(validate_name("Last name", &"b".repeat(51)).is_err());
    }

    #[test]
    fn test_validate_email() {
        assert!(validate_email("user@example.com").is_ok());
        assert!(validate_email("user.name+tag@example.co.uk").is_ok());
        assert!(validate_email("").is_err());
        assert!(validate_email("invalid-email").is_err());
        assert!(validate_email("user@").is_err());
        assert!(validate_email(&format!("{}@example.com", "a".repeat(250))).is_err());
    }

    #[test]
    fn test_validate_registration_trims_fields() {
        let request = validate_registration(
            registration(),
            &UsernameRules::default(),
            &PasswordRequirements::default(),
        )
        .unwrap();

        assert_eq!(request.username, "alice");
        assert_eq!(request.password, "correcthorse1");
    }

    #[test]
    fn test_validation_error_maps_to_bad_request() {
        let err = validate_registration(
            RegisterRequest {
                password: "short".to_string(),
                ..registration()
            },
            &UsernameRules::default(),
            &PasswordRequirements::default(),
        )
        .unwrap_err();

        assert!(matches!(err, ValidationError::InvalidPassword(_)));
        let app_err: AppError = err.into();
        assert_eq!(app_err.status_code(), axum::http::StatusCode::BAD_REQUEST);
    }
}
