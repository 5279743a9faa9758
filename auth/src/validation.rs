//! Form validation.
//!
//! The `validate_*` functions return the message to show, or `None` when the
//! value is acceptable. The `*_field` variants produce a [`FieldValidation`]
//! for real-time feedback, which stays quiet (`show_error = false`) while a
//! field is still empty.

use crate::state::{FieldValidation, FormField};
use regex::Regex;
use std::sync::LazyLock;

/// Minimum length of a new password.
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Minimum length of a display name, after trimming.
pub const MIN_NAME_LENGTH: usize = 2;

/// Maximum length of a display name, after trimming.
pub const MAX_NAME_LENGTH: usize = 50;

const EMAIL_PATTERN: &str = r"[A-Za-z0-9._%+\-]+@[A-Za-z0-9\-]+(?:\.[A-Za-z0-9\-]+)*\.[A-Za-z]{2,}";

#[allow(clippy::expect_used)] // literal pattern
static EMAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!("^{EMAIL_PATTERN}$")).expect("valid email pattern"));

#[allow(clippy::expect_used)] // literal pattern
static EMAIL_IN_TEXT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(EMAIL_PATTERN).expect("valid email pattern"));

/// Validate an email address.
#[must_use]
pub fn validate_email(email: &str) -> Option<String> {
    let email = email.trim();
    if email.is_empty() {
        return Some("Email is required".to_string());
    }
    if !EMAIL.is_match(email) {
        return Some("Please enter a valid email address".to_string());
    }
    None
}

/// Validate a new password (sign-up rules).
#[must_use]
pub fn validate_password(password: &str) -> Option<String> {
    if password.is_empty() {
        return Some("Password is required".to_string());
    }
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Some(format!(
            "Password must be at least {MIN_PASSWORD_LENGTH} characters"
        ));
    }
    let has_letter = password.chars().any(char::is_alphabetic);
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    if !has_letter || !has_digit {
        return Some("Password must contain at least one letter and one number".to_string());
    }
    None
}

/// Validate an existing password (sign-in rules: only presence).
#[must_use]
pub fn validate_sign_in_password(password: &str) -> Option<String> {
    password
        .is_empty()
        .then(|| "Password is required".to_string())
}

/// Validate a display name.
#[must_use]
pub fn validate_name(name: &str) -> Option<String> {
    let name = name.trim();
    let length = name.chars().count();
    if length == 0 {
        return Some("Name is required".to_string());
    }
    if length < MIN_NAME_LENGTH {
        return Some(format!("Name must be at least {MIN_NAME_LENGTH} characters"));
    }
    if length > MAX_NAME_LENGTH {
        return Some(format!("Name must be at most {MAX_NAME_LENGTH} characters"));
    }
    None
}

/// Validate a password confirmation against the password.
#[must_use]
pub fn validate_confirm_password(confirm: &str, password: &str) -> Option<String> {
    if confirm.is_empty() {
        return Some("Please confirm your password".to_string());
    }
    if confirm != password {
        return Some("Passwords do not match".to_string());
    }
    None
}

/// Real-time email validation.
#[must_use]
pub fn email_field(value: &str) -> FieldValidation {
    to_field(value, validate_email(value))
}

/// Real-time password validation (sign-up rules).
#[must_use]
pub fn password_field(value: &str) -> FieldValidation {
    to_field(value, validate_password(value))
}

/// Real-time name validation.
#[must_use]
pub fn name_field(value: &str) -> FieldValidation {
    to_field(value, validate_name(value))
}

/// Real-time confirmation validation.
#[must_use]
pub fn confirm_password_field(value: &str, password: &str) -> FieldValidation {
    to_field(value, validate_confirm_password(value, password))
}

/// Validate `value` as `field`, cross-checking the confirmation against `password`.
#[must_use]
pub fn validate_field(field: FormField, value: &str, password: &str) -> FieldValidation {
    match field {
        FormField::Email => email_field(value),
        FormField::Password => password_field(value),
        FormField::Name => name_field(value),
        FormField::ConfirmPassword => confirm_password_field(value, password),
    }
}

/// First email address found in `text`.
///
/// Used to recover the conflicting address from provider messages.
#[must_use]
pub fn extract_email(text: &str) -> Option<String> {
    EMAIL_IN_TEXT
        .find(text)
        .map(|found| found.as_str().trim_end_matches('.').to_string())
}

fn to_field(value: &str, message: Option<String>) -> FieldValidation {
    match message {
        None => FieldValidation::valid(),
        Some(message) => FieldValidation::invalid(message, !value.is_empty()),
    }
}
