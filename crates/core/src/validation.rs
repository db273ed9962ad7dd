//! Request-body validation helpers.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

use crate::error::{ApiError, ApiResult};

/// Check that every field in `fields` is present, non-null and not an empty string.
///
/// Fails fast on the first missing field, in the order given. A record that is
/// not a JSON object has no fields at all.
pub fn validate_required(record: &Value, fields: &[&str]) -> ApiResult<()> {
    for field in fields {
        let missing = match record.get(field) {
            None | Some(Value::Null) => true,
            Some(Value::String(s)) => s.is_empty(),
            Some(_) => false,
        };
        if missing {
            return Err(ApiError::validation(format!(
                "Missing required field: {field}"
            )));
        }
    }
    Ok(())
}

static EMAIL_RE: OnceLock<Regex> = OnceLock::new();

fn email_regex() -> &'static Regex {
    EMAIL_RE.get_or_init(|| {
        // local@domain.tld, no whitespace or extra '@' in any part.
        Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$")
            .unwrap_or_else(|error| panic!("email regex failed to compile: {error}"))
    })
}

/// Simple `local@domain.tld` shape check. Not an RFC 5322 validator.
pub fn is_valid_email(candidate: &str) -> bool {
    email_regex().is_match(candidate)
}
