//! Uniform `{success, data|error, timestamp}` response body.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize, Serializer};

/// Response body returned by every HTTP handler.
///
/// Exactly one of `data` / `error` is populated, selected by `success`. The
/// constructors are the only way to build one, which keeps that invariant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    timestamp: String,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self::success_at(data, Utc::now())
    }

    pub fn success_at(data: T, at: DateTime<Utc>) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            timestamp: iso_timestamp(at),
        }
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn data(&self) -> Option<&T> {
        self.data.as_ref()
    }

    pub fn into_data(self) -> Option<T> {
        self.data
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }
}

impl ApiResponse<()> {
    pub fn error(message: impl Into<String>) -> Self {
        Self::error_at(message, Utc::now())
    }

    pub fn error_at(message: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
            timestamp: iso_timestamp(at),
        }
    }
}

/// ISO-8601 UTC with millisecond precision (`2024-01-01T00:00:00.000Z`).
pub fn iso_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// `serialize_with` helper writing a timestamp through [`iso_timestamp`].
pub fn serialize_iso<S: Serializer>(at: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&iso_timestamp(*at))
}

pub fn serialize_opt_iso<S: Serializer>(
    at: &Option<DateTime<Utc>>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match at {
        Some(at) => serialize_iso(at, serializer),
        None => serializer.serialize_none(),
    }
}
