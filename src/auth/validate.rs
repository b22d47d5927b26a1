use lazy_static::lazy_static;
use regex::Regex;

use crate::auth::repo_types::Role;
use crate::error::ApiError;

pub fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Lowercased and trimmed form used everywhere emails are compared or stored.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Policy shared by registration, reset and password change: at least six
/// characters, at least one letter and one digit.
pub fn validate_password(password: &str) -> Result<(), ApiError> {
    if password.chars().count() < 6 {
        return Err(ApiError::validation(
            "password",
            "Password must be at least 6 characters",
        ));
    }
    let has_letter = password.chars().any(|c| c.is_alphabetic());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    if !has_letter || !has_digit {
        return Err(ApiError::validation(
            "password",
            "Password must contain at least one letter and one digit",
        ));
    }
    Ok(())
}

pub fn validate_full_name(full_name: &str) -> Result<(), ApiError> {
    let len = full_name.trim().chars().count();
    if !(2..=100).contains(&len) {
        return Err(ApiError::validation(
            "full_name",
            "Full name must be between 2 and 100 characters",
        ));
    }
    Ok(())
}

/// Registration may only create students and instructors; absent means
/// student. Anything else, admin included, is a field-tagged error.
pub fn parse_registration_role(role: Option<&str>) -> Result<Role, ApiError> {
    match role {
        None | Some("student") => Ok(Role::Student),
        Some("instructor") => Ok(Role::Instructor),
        Some(_) => Err(ApiError::validation(
            "role",
            "Role must be student or instructor",
        )),
    }
}
