/// Input validators applied at the HTTP boundary, before anything reaches
/// the token service, the pool or the cache.

use lazy_static::lazy_static;
use regex::Regex;

use crate::error::ValidationError;

const MAX_EMAIL_LENGTH: usize = 254; // RFC 5321
const MAX_TITLE_LENGTH: usize = 200;
const MAX_MODULE_LENGTH: usize = 64;

lazy_static! {
    // RFC 5322 simplified email regex (practical validation)
    static ref EMAIL_REGEX: Regex = Regex::new(
        r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$"
    ).expect("email regex is valid");
}

/// Validates an email address for registration.
///
/// Case is preserved: accounts are keyed by the exact string.
pub fn is_valid_email(email: &str) -> Result<String, ValidationError> {
    let trimmed = email.trim();

    if trimmed.is_empty() {
        return Err(ValidationError::EmptyField("email".to_string()));
    }

    if trimmed.len() > MAX_EMAIL_LENGTH {
        return Err(ValidationError::TooLong("email".to_string(), MAX_EMAIL_LENGTH));
    }

    if !EMAIL_REGEX.is_match(trimmed) {
        return Err(ValidationError::InvalidFormat("email".to_string()));
    }

    Ok(trimmed.to_string())
}

/// Validates a task title: required, bounded, no control characters
pub fn is_valid_title(title: &str) -> Result<String, ValidationError> {
    let trimmed = title.trim();

    if trimmed.is_empty() {
        return Err(ValidationError::EmptyField("title".to_string()));
    }

    if trimmed.chars().count() > MAX_TITLE_LENGTH {
        return Err(ValidationError::TooLong("title".to_string(), MAX_TITLE_LENGTH));
    }

    if trimmed.chars().any(|c| c.is_control()) {
        return Err(ValidationError::InvalidFormat("title".to_string()));
    }

    Ok(trimmed.to_string())
}

/// Validates an optional module label. Blank means "no module".
pub fn is_valid_module(module: Option<&str>) -> Result<Option<String>, ValidationError> {
    let module = match module.map(str::trim) {
        None | Some("") => return Ok(None),
        Some(module) => module,
    };

    if module.chars().count() > MAX_MODULE_LENGTH {
        return Err(ValidationError::TooLong("module".to_string(), MAX_MODULE_LENGTH));
    }

    if module.chars().any(|c| c.is_control()) {
        return Err(ValidationError::InvalidFormat("module".to_string()));
    }

    Ok(Some(module.to_string()))
}
