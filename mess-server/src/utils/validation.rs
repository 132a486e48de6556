//! Input validation helpers
//!
//! Centralized text length constants and validation functions. Limits are
//! chosen based on:
//! - ESC/POS 80mm printer line width: 48 chars
//! - Reasonable UX limits for names and descriptions

use shared::error::{AppError, AppResult};

// ── Text length limits ──────────────────────────────────────────────

/// Entity names: student, staff, plan, template
pub const MAX_NAME_LEN: usize = 200;

/// Notes, descriptions, fine reasons
pub const MAX_NOTE_LEN: usize = 500;

/// Short identifiers: cards, student IDs, template IDs
pub const MAX_SHORT_TEXT_LEN: usize = 100;

/// Email addresses (RFC 5321)
pub const MAX_EMAIL_LEN: usize = 254;

// ── Validation helpers ──────────────────────────────────────────────

/// Validate that a required string is non-empty and within the length limit.
pub fn validate_required_text(value: &str, field: &str, max_len: usize) -> AppResult<()> {
    if value.trim().is_empty() {
        return Err(AppError::validation(format!("{field} must not be empty")));
    }
    if value.len() > max_len {
        return Err(AppError::validation(format!(
            "{field} is too long ({} chars, max {max_len})",
            value.len()
        )));
    }
    Ok(())
}

/// Validate that an optional string, if present, is within the length limit.
pub fn validate_optional_text(value: &Option<String>, field: &str, max_len: usize) -> AppResult<()> {
    if let Some(v) = value
        && v.len() > max_len
    {
        return Err(AppError::validation(format!(
            "{field} is too long ({} chars, max {max_len})",
            v.len()
        )));
    }
    Ok(())
}

/// Validate an email address: local part, '@', dotted domain.
pub fn validate_email(value: &str) -> AppResult<()> {
    validate_required_text(value, "email", MAX_EMAIL_LEN)?;
    let Some((local, domain)) = value.split_once('@') else {
        return Err(AppError::validation(format!(
            "{value} is not a valid email"
        )));
    };
    let domain_ok = domain.split('.').count() >= 2
        && domain
            .split('.')
            .all(|part| !part.is_empty() && part.chars().all(|c| c.is_alphanumeric() || c == '-'));
    if local.is_empty() || !domain_ok {
        return Err(AppError::validation(format!(
            "{value} is not a valid email"
        )));
    }
    Ok(())
}

/// Validate a 10-digit phone number.
pub fn validate_phone(value: &str) -> AppResult<()> {
    if value.len() != 10 || !value.chars().all(|c| c.is_ascii_digit()) {
        return Err(AppError::validation(format!(
            "{value} is not a valid phone number"
        )));
    }
    Ok(())
}
