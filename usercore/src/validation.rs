//! Business rules for users.
//!
//! Validation never fails fast: every rule runs and every violation is
//! reported, in rule order.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::user::User;

/// Message for a missing or blank username.
pub const USERNAME_REQUIRED: &str = "Username is required";
/// Message for a username outside the allowed length or alphabet.
pub const USERNAME_FORMAT: &str =
    "Username must be 3-20 characters, alphanumeric and underscore only";
/// Message for a missing or malformed email.
pub const EMAIL_REQUIRED: &str = "Valid email is required";

static USERNAME_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_]{3,20}$").expect("username pattern is valid"));

static EMAIL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@.+$").expect("email pattern is valid"));

/// Checks `user` against the business rules and returns every violation.
///
/// An empty vector means the user is valid.
pub fn validate_user(user: &User) -> Vec<String> {
    let mut errors = Vec::new();

    if user.username().trim().is_empty() {
        errors.push(USERNAME_REQUIRED.to_string());
    } else if !USERNAME_PATTERN.is_match(user.username()) {
        errors.push(USERNAME_FORMAT.to_string());
    }

    if !is_valid_email(user.email()) {
        errors.push(EMAIL_REQUIRED.to_string());
    }

    errors
}

/// True when `email` has a `local@domain` shape.
pub fn is_valid_email(email: &str) -> bool {
    EMAIL_PATTERN.is_match(email)
}

/// Cleans a batch of addresses: trims each, drops blanks and malformed
/// entries, and removes duplicates while keeping first-seen order.
pub fn normalize_emails<I, S>(emails: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    emails
        .into_iter()
        .filter_map(|email| {
            let trimmed = email.as_ref().trim();
            (!trimmed.is_empty() && is_valid_email(trimmed)).then(|| trimmed.to_string())
        })
        .filter(|email| seen.insert(email.clone()))
        .collect()
}
