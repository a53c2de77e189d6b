//! Pure validation and sanitization rules shared by the service layer.

use lazy_static::lazy_static;
use regex::Regex;

use crate::error::ServiceError;
use crate::records::dto::{RecordDraft, RecordInput};

pub const MAX_PART_LEN: usize = 100;
pub const MAX_TYPE_LEN: usize = 50;
pub const MAX_NUMBER_LEN: usize = 50;
pub const MAX_HISTORY_NAME_LEN: usize = 100;
pub const MIN_PASSWORD_LEN: usize = 6;

pub const MAX_HEIGHT: f64 = 1000.0;
pub const MAX_THICK: f64 = 100.0;
pub const MAX_LENGTH: f64 = 10_000.0;
pub const MAX_COUNT: f64 = 10_000.0;

/// Characters that are rejected outright in record text fields. Stripping
/// them silently would mask an injection attempt, so validation fails instead.
const FORBIDDEN_CHARS: [char; 5] = ['<', '>', '"', '\'', '&'];

pub fn is_valid_username(username: &str) -> bool {
    lazy_static! {
        static ref USERNAME_RE: Regex = Regex::new(r"^[A-Za-z0-9_]{3,20}$").unwrap();
    }
    USERNAME_RE.is_match(username)
}

pub fn validate_username(username: &str) -> Result<(), ServiceError> {
    if is_valid_username(username) {
        Ok(())
    } else {
        Err(ServiceError::validation(
            "username must be 3-20 characters of letters, digits or underscore",
        ))
    }
}

pub fn validate_password(password: &str) -> Result<(), ServiceError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ServiceError::validation(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

/// Strip angle brackets and trim surrounding whitespace. This runs as an
/// independent pass even on fields the forbidden-character check already
/// cleared, and it is the only treatment applied to fields outside that
/// check (history entry names).
pub fn sanitize_text(raw: &str) -> String {
    let stripped: String = raw.chars().filter(|c| *c != '<' && *c != '>').collect();
    stripped.trim().to_string()
}

fn checked_text(field: &'static str, raw: &str, max_len: usize) -> Result<String, ServiceError> {
    if raw.chars().any(|c| FORBIDDEN_CHARS.contains(&c)) {
        return Err(ServiceError::validation(format!(
            "{field} contains forbidden characters"
        )));
    }
    let clean = sanitize_text(raw);
    if clean.is_empty() {
        return Err(ServiceError::validation(format!("{field} must not be empty")));
    }
    if clean.chars().count() > max_len {
        return Err(ServiceError::validation(format!(
            "{field} must be at most {max_len} characters"
        )));
    }
    Ok(clean)
}

fn checked_number(field: &'static str, value: f64, max: f64) -> Result<f64, ServiceError> {
    if !value.is_finite() {
        return Err(ServiceError::validation(format!("{field} must be a finite number")));
    }
    if value <= 0.0 {
        return Err(ServiceError::validation(format!("{field} must be positive")));
    }
    if value > max {
        return Err(ServiceError::validation(format!("{field} must be at most {max}")));
    }
    Ok(value)
}

/// Derived volume, rounded half-away-from-zero to three decimals. Never
/// trusted from client input.
pub fn volume_of(height: f64, thick: f64, length: f64, count: f64) -> f64 {
    (height * thick * length * count * 1000.0).round() / 1000.0
}

/// Full structural pass over a submitted record: shape, ranges, forbidden
/// characters, sanitization, derived volume. Returns the cleaned draft
/// without identity fields.
pub fn validate_record(input: &RecordInput) -> Result<RecordDraft, ServiceError> {
    let part = checked_text("part", &input.part, MAX_PART_LEN)?;
    let kind = checked_text("type", &input.kind, MAX_TYPE_LEN)?;
    let number = checked_text("number", &input.number, MAX_NUMBER_LEN)?;

    let height = checked_number("height", input.height, MAX_HEIGHT)?;
    let thick = checked_number("thick", input.thick, MAX_THICK)?;
    let length = checked_number("length", input.length, MAX_LENGTH)?;
    let count = checked_number("count", input.count, MAX_COUNT)?;

    Ok(RecordDraft {
        part,
        kind,
        number,
        height,
        thick,
        length,
        count,
        volume: volume_of(height, thick, length, count),
        created_at: input.created_at,
    })
}

pub fn validate_history_name(raw: &str) -> Result<String, ServiceError> {
    let clean = sanitize_text(raw);
    if clean.is_empty() {
        return Err(ServiceError::validation("name must not be empty"));
    }
    if clean.chars().count() > MAX_HISTORY_NAME_LEN {
        return Err(ServiceError::validation(format!(
            "name must be at most {MAX_HISTORY_NAME_LEN} characters"
        )));
    }
    Ok(clean)
}

/// Resolve a client-supplied position against a collection of `len`
/// elements. Anything outside `[0, len)` is a lookup miss, not a panic.
pub fn checked_index(index: i64, len: usize) -> Result<usize, ServiceError> {
    if index < 0 {
        return Err(ServiceError::NotFound);
    }
    let index = index as usize;
    if index >= len {
        return Err(ServiceError::NotFound);
    }
    Ok(index)
}
