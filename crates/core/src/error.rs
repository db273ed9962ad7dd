//! Handler error model.

use thiserror::Error;

/// Result type used by handler logic.
pub type ApiResult<T> = Result<T, ApiError>;

/// Failure of a single request/response transaction.
///
/// The `Display` output is the exact message placed in the error envelope, so
/// variants carry client-facing text. Transport concerns (status codes) are
/// mapped at the HTTP boundary.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// Missing or invalid input.
    #[error("{0}")]
    Validation(String),

    /// The addressed resource does not exist.
    #[error("{0}")]
    NotFound(String),

    /// The route exists but does not accept the request method.
    #[error("Method not allowed")]
    MethodNotAllowed,

    /// The request body could not be decoded. The detail is for logs only.
    #[error("Invalid request body")]
    InvalidBody { detail: String },
}

impl ApiError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn invalid_body(detail: impl Into<String>) -> Self {
        Self::InvalidBody {
            detail: detail.into(),
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        Self::invalid_body(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_body_hides_detail_from_message() {
        let err = ApiError::invalid_body("expected value at line 1 column 1");
        assert_eq!(err.to_string(), "Invalid request body");
    }

    #[test]
    fn validation_message_is_verbatim() {
        let err = ApiError::validation("Missing required field: name");
        assert_eq!(err.to_string(), "Missing required field: name");
    }
}
